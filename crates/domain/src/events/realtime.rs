//! 客户端命令与服务端事件

use serde::{Deserialize, Serialize};

use crate::entities::{FileAttachment, Message, MessageType, Notification, NotificationType};
use crate::value_objects::{ConversationId, MessageId, NotificationId, Timestamp, UserId};

/// 客户端发往服务端的命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientCommand {
    JoinConversation {
        conversation_id: ConversationId,
    },
    LeaveConversation {
        conversation_id: ConversationId,
    },
    SendMessage {
        conversation_id: ConversationId,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: Option<MessageType>,
        #[serde(default)]
        reply_to_message_id: Option<MessageId>,
        #[serde(default)]
        attachment: Option<FileAttachment>,
    },
    TypingStart {
        conversation_id: ConversationId,
    },
    TypingStop {
        conversation_id: ConversationId,
    },
    MessageRead {
        conversation_id: ConversationId,
    },
    NotificationRead {
        notification_id: NotificationId,
    },
}

impl ClientCommand {
    /// 命令名称，用于日志
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::JoinConversation { .. } => "join_conversation",
            ClientCommand::LeaveConversation { .. } => "leave_conversation",
            ClientCommand::SendMessage { .. } => "send_message",
            ClientCommand::TypingStart { .. } => "typing_start",
            ClientCommand::TypingStop { .. } => "typing_stop",
            ClientCommand::MessageRead { .. } => "message_read",
            ClientCommand::NotificationRead { .. } => "notification_read",
        }
    }
}

/// 在线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// 服务端推送给客户端的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    OnlineUsers(Vec<UserId>),
    UserStatusChanged {
        user_id: UserId,
        status: PresenceStatus,
        timestamp: Timestamp,
    },
    UserJoined {
        user_id: UserId,
        user_name: String,
        conversation_id: ConversationId,
    },
    UserLeft {
        user_id: UserId,
        user_name: String,
        conversation_id: ConversationId,
    },
    NewMessage {
        message: Message,
        conversation_id: ConversationId,
    },
    UserTyping {
        user_id: UserId,
        user_name: String,
        conversation_id: ConversationId,
        is_typing: bool,
    },
    MessageRead {
        user_id: UserId,
        user_name: String,
        conversation_id: ConversationId,
        read_at: Timestamp,
    },
    NewNotification {
        #[serde(rename = "type")]
        notification_type: NotificationType,
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_name: String,
        content: String,
    },
    /// 管理员创建的通知，载荷为完整通知对象
    #[serde(rename = "new_notification")]
    NotificationCreated(Notification),
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
