//! 领域实体定义
//!
//! 包含实时会话系统的核心实体：用户身份、会话、参与者、消息、通知。

pub mod conversation;
pub mod message;
pub mod notification;
pub mod user;

// 重新导出核心实体
pub use conversation::{Conversation, ConversationType, Participant, ParticipantRole};
pub use message::{FileAttachment, Message, MessageDraft, MessageType};
pub use notification::{
    message_preview, Notification, NotificationDraft, NotificationFilter, NotificationStats,
    NotificationType,
};
pub use user::{UserIdentity, UserRole};
