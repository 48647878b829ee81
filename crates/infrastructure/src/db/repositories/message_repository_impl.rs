//! 消息Repository实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ConversationId, DomainError, DomainResult, FileAttachment, Message, MessageCursor, MessageId,
    MessageRepository, MessageType, PaginatedResult, Pagination, Timestamp, UserId,
};
use sqlx::{query, query_as, query_scalar, FromRow};
use uuid::Uuid;

use crate::db::{db_error, map_db_error, DbPool};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, message_type, \
     file_url, file_name, file_size, reply_to_message_id, is_edited, is_deleted, created_at, updated_at";

/// 数据库消息模型
#[derive(Debug, Clone, FromRow)]
struct DbMessage {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: String,
    file_url: Option<String>,
    file_name: Option<String>,
    file_size: Option<i64>,
    reply_to_message_id: Option<Uuid>,
    is_edited: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbMessage> for Message {
    type Error = DomainError;

    fn try_from(row: DbMessage) -> Result<Self, Self::Error> {
        let attachment = match (row.file_url, row.file_name) {
            (Some(url), Some(name)) => Some(FileAttachment {
                url,
                name,
                size: row.file_size.unwrap_or(0),
            }),
            _ => None,
        };

        Ok(Message {
            id: MessageId::new(row.id),
            conversation_id: ConversationId::new(row.conversation_id),
            sender_id: UserId::new(row.sender_id),
            content: row.content,
            message_type: row.message_type.parse::<MessageType>()?,
            attachment,
            reply_to_message_id: row.reply_to_message_id.map(MessageId::new),
            is_edited: row.is_edited,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_messages(rows: Vec<DbMessage>) -> DomainResult<Vec<Message>> {
    rows.into_iter().map(Message::try_from).collect()
}

/// 转义 LIKE 模式中的通配符
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub struct PgMessageRepository {
    pool: Arc<DbPool>,
}

impl PgMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> DomainResult<Message> {
        let attachment = message.attachment.as_ref();
        let row = query_as::<_, DbMessage>(&format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message.id.as_uuid())
        .bind(message.conversation_id.as_uuid())
        .bind(message.sender_id.as_uuid())
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(attachment.map(|a| a.url.clone()))
        .bind(attachment.map(|a| a.name.clone()))
        .bind(attachment.map(|a| a.size))
        .bind(message.reply_to_message_id.map(|id| id.as_uuid()))
        .bind(message.is_edited)
        .bind(message.is_deleted)
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_db_error("message", e))?;

        row.try_into()
    }

    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<Message>> {
        let row = query_as::<_, DbMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.map(Message::try_from).transpose()
    }

    async fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        pagination: Pagination,
        before: Option<MessageCursor>,
    ) -> DomainResult<PaginatedResult<Message>> {
        let cursor_at = before.map(|c| c.created_at);
        let cursor_id = before.map(|c| c.id.as_uuid());

        let total: i64 = query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND is_deleted = FALSE
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(cursor_at)
        .bind(cursor_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        let rows = query_as::<_, DbMessage>(&format!(
            "SELECT * FROM ( \
                SELECT {MESSAGE_COLUMNS} FROM messages \
                WHERE conversation_id = $1 AND is_deleted = FALSE \
                  AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3)) \
                ORDER BY created_at DESC, id DESC \
                LIMIT $4 OFFSET $5 \
             ) page ORDER BY created_at ASC, id ASC"
        ))
        .bind(conversation_id.as_uuid())
        .bind(cursor_at)
        .bind(cursor_id)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(PaginatedResult::new(
            into_messages(rows)?,
            total as u64,
            pagination,
        ))
    }

    async fn search(
        &self,
        conversation_id: ConversationId,
        query_text: &str,
        pagination: Pagination,
    ) -> DomainResult<PaginatedResult<Message>> {
        let pattern = format!("%{}%", escape_like(query_text));

        let total: i64 = query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND is_deleted = FALSE AND content ILIKE $2
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(&pattern)
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        let rows = query_as::<_, DbMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 AND is_deleted = FALSE AND content ILIKE $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(conversation_id.as_uuid())
        .bind(&pattern)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(PaginatedResult::new(
            into_messages(rows)?,
            total as u64,
            pagination,
        ))
    }

    async fn latest(&self, conversation_id: ConversationId) -> DomainResult<Option<Message>> {
        let row = query_as::<_, DbMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(conversation_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.map(Message::try_from).transpose()
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        now: Timestamp,
    ) -> DomainResult<Option<Message>> {
        let row = query_as::<_, DbMessage>(&format!(
            "UPDATE messages SET content = $2, is_edited = TRUE, updated_at = $3 \
             WHERE id = $1 AND is_deleted = FALSE \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(content)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.map(Message::try_from).transpose()
    }

    async fn soft_delete(&self, id: MessageId, now: Timestamp) -> DomainResult<bool> {
        let result = query(
            "UPDATE messages SET is_deleted = TRUE, updated_at = $2 \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn hard_delete(&self, id: MessageId) -> DomainResult<bool> {
        let result = query("DELETE FROM messages WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> DomainResult<u64> {
        let count: i64 = query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_deleted = FALSE
              AND ($3::timestamptz IS NULL OR created_at > $3)
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(reader.as_uuid())
        .bind(after)
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(count as u64)
    }

    async fn list_unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> DomainResult<Vec<Message>> {
        let rows = query_as::<_, DbMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 AND sender_id <> $2 AND is_deleted = FALSE \
               AND ($3::timestamptz IS NULL OR created_at > $3) \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(conversation_id.as_uuid())
        .bind(reader.as_uuid())
        .bind(after)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        into_messages(rows)
    }
}
