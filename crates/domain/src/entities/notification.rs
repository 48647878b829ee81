//! 通知实体定义

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::errors::DomainError;
use crate::value_objects::{ConversationId, NotificationId, Timestamp, UserId};

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Message,
    System,
    Booking,
    Payment,
    Rating,
    Task,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Message => "message",
            NotificationType::System => "system",
            NotificationType::Booking => "booking",
            NotificationType::Payment => "payment",
            NotificationType::Rating => "rating",
            NotificationType::Task => "task",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(NotificationType::Message),
            "system" => Ok(NotificationType::System),
            "booking" => Ok(NotificationType::Booking),
            "payment" => Ok(NotificationType::Payment),
            "rating" => Ok(NotificationType::Rating),
            "task" => Ok(NotificationType::Task),
            other => Err(DomainError::validation_error(
                "type",
                format!("unknown notification type '{other}'"),
            )),
        }
    }
}

/// 通知实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub data: Option<JsonValue>,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Notification {
    /// 为新消息构造通知
    #[allow(clippy::too_many_arguments)]
    pub fn for_message(
        id: NotificationId,
        recipient: UserId,
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_name: &str,
        content: &str,
        preview_chars: usize,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id: recipient,
            title: format!("New message from {sender_name}"),
            content: message_preview(content, preview_chars),
            notification_type: NotificationType::Message,
            data: Some(json!({
                "conversationId": conversation_id,
                "senderId": sender_id,
                "type": NotificationType::Message.as_str(),
            })),
            is_read: false,
            read_at: None,
            expires_at: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

const MAX_TITLE_CHARS: usize = 255;

/// 管理员创建通知的输入
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub title: String,
    pub content: String,
    pub notification_type: NotificationType,
    pub data: Option<JsonValue>,
    pub expires_at: Option<Timestamp>,
}

impl NotificationDraft {
    /// 校验输入并生成发给 `recipient` 的通知
    pub fn into_notification(
        &self,
        id: NotificationId,
        recipient: UserId,
        now: Timestamp,
    ) -> Result<Notification, DomainError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation_error("title", "title is required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::validation_error(
                "title",
                format!("title must be at most {MAX_TITLE_CHARS} characters"),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(DomainError::validation_error(
                "content",
                "content is required",
            ));
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(DomainError::validation_error(
                "expiresAt",
                "expiresAt must be in the future",
            ));
        }
        Ok(Notification {
            id,
            user_id: recipient,
            title: title.to_string(),
            content: self.content.clone(),
            notification_type: self.notification_type,
            data: self.data.clone(),
            is_read: false,
            read_at: None,
            expires_at: self.expires_at,
            created_at: now,
        })
    }
}

/// 通知列表过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub is_read: Option<bool>,
    /// 创建时间下限（含）
    pub date_from: Option<Timestamp>,
    /// 创建时间上限（含）
    pub date_to: Option<Timestamp>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.notification_type
            .map_or(true, |t| t == notification.notification_type)
            && self.is_read.map_or(true, |r| r == notification.is_read)
            && self.date_from.map_or(true, |from| notification.created_at >= from)
            && self.date_to.map_or(true, |to| notification.created_at <= to)
    }
}

/// 用户通知统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: u64,
    pub unread: u64,
    pub unread_by_type: BTreeMap<NotificationType, u64>,
}

impl NotificationStats {
    pub fn tally<'a>(notifications: impl IntoIterator<Item = &'a Notification>) -> Self {
        let mut stats = Self::default();
        for notification in notifications {
            stats.total += 1;
            if !notification.is_read {
                stats.unread += 1;
                *stats
                    .unread_by_type
                    .entry(notification.notification_type)
                    .or_default() += 1;
            }
        }
        stats
    }
}

/// 截取消息预览，超过 `max_chars` 个字符时截断并追加 `...`
pub fn message_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn preview_keeps_short_content() {
        assert_eq!(message_preview("hello", 100), "hello");
        let exact = "a".repeat(100);
        assert_eq!(message_preview(&exact, 100), exact);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(101);
        let preview = message_preview(&long, 100);
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn message_notification_references_sender() {
        let notification = Notification::for_message(
            NotificationId::generate(),
            UserId::generate(),
            ConversationId::generate(),
            UserId::generate(),
            "Alice",
            &"x".repeat(150),
            100,
            Utc::now(),
        );
        assert_eq!(notification.title, "New message from Alice");
        assert_eq!(notification.content.len(), 103);
        assert_eq!(notification.notification_type, NotificationType::Message);
        assert!(!notification.is_read);
    }

    #[test]
    fn filter_matches_type_and_read_state() {
        let notification = Notification::for_message(
            NotificationId::generate(),
            UserId::generate(),
            ConversationId::generate(),
            UserId::generate(),
            "Bob",
            "hi",
            100,
            Utc::now(),
        );
        assert!(NotificationFilter::default().matches(&notification));
        assert!(NotificationFilter {
            notification_type: Some(NotificationType::Message),
            is_read: Some(false),
            ..Default::default()
        }
        .matches(&notification));
        assert!(!NotificationFilter {
            notification_type: Some(NotificationType::System),
            ..Default::default()
        }
        .matches(&notification));
    }

    #[test]
    fn filter_date_bounds_are_inclusive() {
        let now = Utc::now();
        let notification = Notification::for_message(
            NotificationId::generate(),
            UserId::generate(),
            ConversationId::generate(),
            UserId::generate(),
            "Bob",
            "hi",
            100,
            now,
        );
        let exact = NotificationFilter {
            date_from: Some(now),
            date_to: Some(now),
            ..Default::default()
        };
        assert!(exact.matches(&notification));
        let later = NotificationFilter {
            date_from: Some(now + Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&notification));
        let earlier = NotificationFilter {
            date_to: Some(now - Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!earlier.matches(&notification));
    }

    fn draft() -> NotificationDraft {
        NotificationDraft {
            title: "  Maintenance  ".to_string(),
            content: "Service restarts at 02:00".to_string(),
            notification_type: NotificationType::System,
            data: None,
            expires_at: None,
        }
    }

    #[test]
    fn draft_builds_unread_notification() {
        let now = Utc::now();
        let recipient = UserId::generate();
        let notification = draft()
            .into_notification(NotificationId::generate(), recipient, now)
            .unwrap();
        assert_eq!(notification.title, "Maintenance");
        assert_eq!(notification.user_id, recipient);
        assert_eq!(notification.notification_type, NotificationType::System);
        assert_eq!(notification.created_at, now);
        assert!(!notification.is_read);
    }

    #[test]
    fn draft_rejects_blank_fields_and_past_expiry() {
        let now = Utc::now();
        let mut blank = draft();
        blank.title = "   ".to_string();
        assert!(matches!(
            blank.into_notification(NotificationId::generate(), UserId::generate(), now),
            Err(DomainError::ValidationError { .. })
        ));

        let mut empty = draft();
        empty.content = String::new();
        assert!(empty
            .into_notification(NotificationId::generate(), UserId::generate(), now)
            .is_err());

        let mut stale = draft();
        stale.expires_at = Some(now);
        assert!(stale
            .into_notification(NotificationId::generate(), UserId::generate(), now)
            .is_err());
    }

    #[test]
    fn stats_count_unread_per_type() {
        let now = Utc::now();
        let owner = UserId::generate();
        let mut read = draft()
            .into_notification(NotificationId::generate(), owner, now)
            .unwrap();
        read.is_read = true;
        let system = draft()
            .into_notification(NotificationId::generate(), owner, now)
            .unwrap();
        let mut task = system.clone();
        task.id = NotificationId::generate();
        task.notification_type = NotificationType::Task;

        let stats = NotificationStats::tally([&read, &system, &task]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.unread, 2);
        assert_eq!(stats.unread_by_type.get(&NotificationType::System), Some(&1));
        assert_eq!(stats.unread_by_type.get(&NotificationType::Task), Some(&1));
        assert_eq!(stats.unread_by_type.get(&NotificationType::Message), None);
    }
}
