//! 消息实体定义
//!
//! 消息创建后内容只能被编辑（置编辑标记）或软删除（置删除标记），
//! 软删除的消息保留在存储中但不出现在常规读取结果里。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ConversationId, MessageId, Timestamp, UserId};

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "file" => Ok(MessageType::File),
            other => Err(DomainError::validation_error(
                "messageType",
                format!("unsupported message type '{other}'"),
            )),
        }
    }
}

/// 附件元数据，文件本身由外部存储保存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub url: String,
    pub name: String,
    pub size: i64,
}

/// 消息实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub attachment: Option<FileAttachment>,
    pub reply_to_message_id: Option<MessageId>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Message {
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.sender_id == user_id
    }

    /// 排序键：按创建时间升序，时间相同按标识升序
    pub fn order_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id)
    }

    /// 规范化编辑后的内容
    pub fn normalize_edit(content: &str) -> DomainResult<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation_error(
                "content",
                "message content must not be empty",
            ));
        }
        Ok(content.to_string())
    }
}

/// 待发送的消息
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: Option<MessageType>,
    pub reply_to_message_id: Option<MessageId>,
    pub attachment: Option<FileAttachment>,
}

impl MessageDraft {
    pub fn text(conversation_id: ConversationId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            sender_id,
            content: content.into(),
            message_type: None,
            reply_to_message_id: None,
            attachment: None,
        }
    }

    /// 校验草稿并生成消息
    ///
    /// 内容会去除首尾空白；没有附件时内容不能为空，有附件且内容为空时生成一段描述。
    pub fn into_message(self, id: MessageId, now: Timestamp) -> DomainResult<Message> {
        let trimmed = self.content.trim();

        let (content, message_type) = match &self.attachment {
            None => {
                if trimmed.is_empty() {
                    return Err(DomainError::validation_error(
                        "content",
                        "message content must not be empty",
                    ));
                }
                (trimmed.to_string(), self.message_type.unwrap_or_default())
            }
            Some(attachment) => {
                if attachment.url.trim().is_empty() || attachment.name.trim().is_empty() {
                    return Err(DomainError::validation_error(
                        "attachment",
                        "attachment url and name are required",
                    ));
                }
                if attachment.size < 0 {
                    return Err(DomainError::validation_error(
                        "attachment",
                        "attachment size must not be negative",
                    ));
                }
                let message_type = match self.message_type {
                    Some(MessageType::Image) => MessageType::Image,
                    _ => MessageType::File,
                };
                let content = if trimmed.is_empty() {
                    format!("Sent {}: {}", message_type.as_str(), attachment.name)
                } else {
                    trimmed.to_string()
                };
                (content, message_type)
            }
        };

        Ok(Message {
            id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content,
            message_type,
            attachment: self.attachment,
            reply_to_message_id: self.reply_to_message_id,
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn draft(content: &str) -> MessageDraft {
        MessageDraft::text(ConversationId::generate(), UserId::generate(), content)
    }

    #[test]
    fn content_is_trimmed() {
        let message = draft("  hello  ")
            .into_message(MessageId::generate(), Utc::now())
            .unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.message_type, MessageType::Text);
        assert!(!message.is_edited && !message.is_deleted);
    }

    #[test]
    fn blank_content_without_attachment_is_rejected() {
        let result = draft("   \n").into_message(MessageId::generate(), Utc::now());
        assert!(matches!(result, Err(DomainError::ValidationError { .. })));
    }

    #[test]
    fn attachment_without_content_gets_description() {
        let mut draft = draft("");
        draft.message_type = Some(MessageType::Image);
        draft.attachment = Some(FileAttachment {
            url: "/uploads/cat.png".into(),
            name: "cat.png".into(),
            size: 1024,
        });
        let message = draft.into_message(MessageId::generate(), Utc::now()).unwrap();
        assert_eq!(message.content, "Sent image: cat.png");
        assert_eq!(message.message_type, MessageType::Image);
    }

    #[test]
    fn serializes_camel_case() {
        let message = draft("hi").into_message(MessageId::generate(), Utc::now()).unwrap();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["messageType"], "text");
        assert!(value.get("conversationId").is_some());
    }
}
