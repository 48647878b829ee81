//! 会话实体定义
//!
//! 会话分为私聊、群聊与客服三种类型。私聊会话始终恰好有两名有效参与者，
//! 且同一对用户之间最多只有一个有效的私聊会话。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ConversationId, Timestamp, UserId};

/// 会话类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Direct,
    Group,
    Support,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "direct",
            ConversationType::Group => "group",
            ConversationType::Support => "support",
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ConversationType::Direct),
            "group" => Ok(ConversationType::Group),
            "support" => Ok(ConversationType::Support),
            other => Err(DomainError::validation_error(
                "type",
                format!("conversation type must be direct, group or support, got '{other}'"),
            )),
        }
    }
}

/// 参与者角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    #[default]
    Member,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Admin => "admin",
            ParticipantRole::Member => "member",
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(ParticipantRole::Admin),
            "member" => Ok(ParticipantRole::Member),
            other => Err(DomainError::validation_error(
                "role",
                format!("participant role must be admin or member, got '{other}'"),
            )),
        }
    }
}

/// 会话参与者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub joined_at: Timestamp,
    pub left_at: Option<Timestamp>,
    pub is_active: bool,
    pub last_read_at: Option<Timestamp>,
}

impl Participant {
    pub fn new(
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
        now: Timestamp,
    ) -> Self {
        Self {
            conversation_id,
            user_id,
            role,
            joined_at: now,
            left_at: None,
            is_active: true,
            last_read_at: None,
        }
    }
}

/// 会话实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub title: Option<String>,
    pub created_by: UserId,
    pub is_active: bool,
    pub last_message_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub participants: Vec<Participant>,
}

impl Conversation {
    /// 创建新会话
    ///
    /// 创建者以管理员身份加入，其他用户以普通成员身份加入。
    /// `others` 不得包含创建者本人，私聊会话必须恰好指定一名对方用户。
    pub fn create(
        id: ConversationId,
        creator: UserId,
        conversation_type: ConversationType,
        title: Option<String>,
        others: &[UserId],
        now: Timestamp,
    ) -> DomainResult<Self> {
        if others.is_empty() {
            return Err(DomainError::validation_error(
                "participants",
                "at least one other participant is required",
            ));
        }
        if others.contains(&creator) {
            return Err(DomainError::validation_error(
                "participants",
                "the creator must not be listed as a participant",
            ));
        }

        let mut unique: Vec<UserId> = Vec::with_capacity(others.len());
        for user_id in others {
            if !unique.contains(user_id) {
                unique.push(*user_id);
            }
        }

        let title = match conversation_type {
            ConversationType::Direct => {
                if unique.len() != 1 {
                    return Err(DomainError::validation_error(
                        "participants",
                        "a direct conversation needs exactly one other participant",
                    ));
                }
                None
            }
            _ => title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        };

        let mut participants = Vec::with_capacity(unique.len() + 1);
        participants.push(Participant::new(id, creator, ParticipantRole::Admin, now));
        participants.extend(
            unique
                .into_iter()
                .map(|user_id| Participant::new(id, user_id, ParticipantRole::Member, now)),
        );

        Ok(Self {
            id,
            conversation_type,
            title,
            created_by: creator,
            is_active: true,
            last_message_at: None,
            created_at: now,
            updated_at: now,
            participants,
        })
    }

    pub fn is_direct(&self) -> bool {
        self.conversation_type == ConversationType::Direct
    }

    pub fn active_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_active)
    }

    pub fn participant(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_active_participant(&self, user_id: UserId) -> bool {
        self.participant(user_id).is_some_and(|p| p.is_active)
    }

    /// 私聊会话中与 `user_id` 相对的另一方
    pub fn counterpart(&self, user_id: UserId) -> Option<UserId> {
        if !self.is_direct() {
            return None;
        }
        self.active_participants()
            .map(|p| p.user_id)
            .find(|id| *id != user_id)
    }

    /// 校验可以修改参与者列表
    pub fn ensure_membership_mutable(&self) -> DomainResult<()> {
        if self.is_direct() {
            return Err(DomainError::business_rule_violation(
                "participants of a direct conversation cannot be changed",
            ));
        }
        Ok(())
    }

    /// 校验并规范化新标题
    pub fn validate_title(&self, title: Option<String>) -> DomainResult<Option<String>> {
        if self.is_direct() {
            return Err(DomainError::business_rule_violation(
                "a direct conversation has no title",
            ));
        }
        let title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        if title.as_ref().is_some_and(|t| t.chars().count() > 255) {
            return Err(DomainError::validation_error(
                "title",
                "title must be at most 255 characters",
            ));
        }
        Ok(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn direct_conversation_has_two_participants_and_no_title() {
        let a = UserId::generate();
        let b = UserId::generate();
        let conversation = Conversation::create(
            ConversationId::generate(),
            a,
            ConversationType::Direct,
            Some("ignored".into()),
            &[b],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(conversation.active_participants().count(), 2);
        assert_eq!(conversation.title, None);
        assert_eq!(conversation.participant(a).unwrap().role, ParticipantRole::Admin);
        assert_eq!(conversation.participant(b).unwrap().role, ParticipantRole::Member);
        assert_eq!(conversation.counterpart(a), Some(b));
    }

    #[test]
    fn direct_conversation_rejects_extra_participants() {
        let result = Conversation::create(
            ConversationId::generate(),
            UserId::generate(),
            ConversationType::Direct,
            None,
            &[UserId::generate(), UserId::generate()],
            Utc::now(),
        );
        assert!(matches!(result, Err(DomainError::ValidationError { .. })));
    }

    #[test]
    fn creator_cannot_list_themself() {
        let a = UserId::generate();
        let result = Conversation::create(
            ConversationId::generate(),
            a,
            ConversationType::Group,
            None,
            &[a],
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn group_deduplicates_participants() {
        let b = UserId::generate();
        let conversation = Conversation::create(
            ConversationId::generate(),
            UserId::generate(),
            ConversationType::Group,
            Some("  crew  ".into()),
            &[b, b],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(conversation.participants.len(), 2);
        assert_eq!(conversation.title.as_deref(), Some("crew"));
        assert!(conversation.ensure_membership_mutable().is_ok());
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        assert!("channel".parse::<ConversationType>().is_err());
        assert_eq!("support".parse::<ConversationType>().unwrap(), ConversationType::Support);
    }
}
