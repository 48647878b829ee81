//! 请求/响应数据结构

use domain::{
    Conversation, ConversationId, FileAttachment, Message, NotificationDraft, NotificationFilter,
    NotificationType, PaginatedResult, Pagination, ParticipantRole, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// 统一的列表响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<PaginatedResult<T>> for ListResponse<T> {
    fn from(result: PaginatedResult<T>) -> Self {
        Self {
            items: result.items,
            total: result.total_count,
            page: result.page,
            limit: result.page_size,
            total_pages: result.total_pages,
            has_next: result.has_next,
            has_prev: result.has_prev,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.limit.unwrap_or(20))
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub before: Option<Uuid>,
}

impl MessageListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.limit.unwrap_or(50))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub is_read: Option<bool>,
    pub date_from: Option<Timestamp>,
    pub date_to: Option<Timestamp>,
}

impl NotificationQuery {
    pub fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            notification_type: self.notification_type,
            is_read: self.is_read,
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UnreadNotificationsQuery {
    pub limit: Option<u32>,
}

/// 管理员创建通知的公共字段，未给出类型时按系统通知处理
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContentPayload {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default = "system_notification")]
    pub notification_type: NotificationType,
    pub data: Option<JsonValue>,
    pub expires_at: Option<Timestamp>,
}

fn system_notification() -> NotificationType {
    NotificationType::System
}

impl NotificationContentPayload {
    pub fn draft(self) -> NotificationDraft {
        NotificationDraft {
            title: self.title,
            content: self.content,
            notification_type: self.notification_type,
            data: self.data,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationPayload {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub notification: NotificationContentPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationsPayload {
    pub user_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub notification: NotificationContentPayload,
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationPayload {
    #[serde(rename = "type")]
    pub conversation_type: String,
    pub title: Option<String>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationPayload {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantPayload {
    pub participant_id: Uuid,
    #[serde(default)]
    pub role: ParticipantRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(default)]
    pub content: String,
    pub message_type: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
    pub attachment: Option<FileAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessagePayload {
    pub content: String,
}

/// 会话列表项：会话本身附带最新消息与未读数
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryDto {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptDto {
    pub conversation_id: ConversationId,
    pub read_at: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct CountDto {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_response_uses_page_metadata() {
        let result = PaginatedResult::new(vec![1, 2], 5, Pagination::new(2, 2));
        let json = serde_json::to_value(ListResponse::from(result)).unwrap();
        assert_eq!(json["total"], 5);
        assert_eq!(json["page"], 2);
        assert_eq!(json["limit"], 2);
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["hasNext"], true);
        assert_eq!(json["hasPrev"], true);
    }

    #[test]
    fn notification_payload_defaults_to_system_type() {
        let payload: CreateNotificationsPayload = serde_json::from_value(serde_json::json!({
            "userIds": [Uuid::new_v4()],
            "title": "Maintenance",
            "content": "Tonight",
            "expiresAt": "2030-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(payload.user_ids.len(), 1);
        let draft = payload.notification.draft();
        assert_eq!(draft.notification_type, NotificationType::System);
        assert!(draft.expires_at.is_some());

        let rejected = serde_json::from_value::<CreateNotificationPayload>(serde_json::json!({
            "userId": Uuid::new_v4(),
            "title": "x",
            "content": "y",
            "type": "spam"
        }));
        assert!(rejected.is_err());
    }

    #[test]
    fn message_page_limit_is_capped() {
        let query = MessageListQuery {
            page: None,
            limit: Some(500),
            before: None,
        };
        assert_eq!(query.pagination().page_size, Pagination::MAX_PAGE_SIZE);
    }
}
