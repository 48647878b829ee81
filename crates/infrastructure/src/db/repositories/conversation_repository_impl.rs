//! 会话Repository实现

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Conversation, ConversationId, ConversationRepository, ConversationType, DomainError,
    DomainResult, PaginatedResult, Pagination, Participant, ParticipantRole, Timestamp, UserId,
};
use sqlx::{query, query_as, query_scalar, FromRow};
use uuid::Uuid;

use crate::db::{db_error, map_db_error, DbPool};

const CONVERSATION_COLUMNS: &str = "id, type AS conversation_type, title, created_by, is_active, \
     last_message_at, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str =
    "conversation_id, user_id, role, joined_at, left_at, is_active, last_read_at";

/// 数据库会话模型
#[derive(Debug, Clone, FromRow)]
struct DbConversation {
    id: Uuid,
    conversation_type: String,
    title: Option<String>,
    created_by: Uuid,
    is_active: bool,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 数据库参与者模型
#[derive(Debug, Clone, FromRow)]
struct DbParticipant {
    conversation_id: Uuid,
    user_id: Uuid,
    role: String,
    joined_at: DateTime<Utc>,
    left_at: Option<DateTime<Utc>>,
    is_active: bool,
    last_read_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbParticipant> for Participant {
    type Error = DomainError;

    fn try_from(row: DbParticipant) -> Result<Self, Self::Error> {
        Ok(Participant {
            conversation_id: ConversationId::new(row.conversation_id),
            user_id: UserId::new(row.user_id),
            role: row.role.parse::<ParticipantRole>()?,
            joined_at: row.joined_at,
            left_at: row.left_at,
            is_active: row.is_active,
            last_read_at: row.last_read_at,
        })
    }
}

impl DbConversation {
    fn into_conversation(self, participants: Vec<Participant>) -> DomainResult<Conversation> {
        Ok(Conversation {
            id: ConversationId::new(self.id),
            conversation_type: self.conversation_type.parse::<ConversationType>()?,
            title: self.title,
            created_by: UserId::new(self.created_by),
            is_active: self.is_active,
            last_message_at: self.last_message_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            participants,
        })
    }
}

/// 私聊会话的去重键：双方ID排序后拼接
fn direct_key(a: UserId, b: UserId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}:{high}")
}

fn direct_key_of(conversation: &Conversation) -> Option<String> {
    if !conversation.is_direct() {
        return None;
    }
    match conversation.participants.as_slice() {
        [first, second] => Some(direct_key(first.user_id, second.user_id)),
        _ => None,
    }
}

pub struct PgConversationRepository {
    pool: Arc<DbPool>,
}

impl PgConversationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn load_participants(
        &self,
        conversation_ids: &[Uuid],
    ) -> DomainResult<HashMap<Uuid, Vec<Participant>>> {
        let rows = query_as::<_, DbParticipant>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM conversation_participants \
             WHERE conversation_id = ANY($1) ORDER BY joined_at ASC, user_id ASC"
        ))
        .bind(conversation_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        let mut grouped: HashMap<Uuid, Vec<Participant>> = HashMap::new();
        for row in rows {
            let key = row.conversation_id;
            grouped.entry(key).or_default().push(row.try_into()?);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<DbConversation>) -> DomainResult<Vec<Conversation>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut participants = self.load_participants(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let members = participants.remove(&row.id).unwrap_or_default();
                row.into_conversation(members)
            })
            .collect()
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn create(&self, conversation: &Conversation) -> DomainResult<Conversation> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        query(
            r#"
            INSERT INTO conversations
                (id, type, title, created_by, is_active, direct_key, last_message_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(conversation.id.as_uuid())
        .bind(conversation.conversation_type.as_str())
        .bind(&conversation.title)
        .bind(conversation.created_by.as_uuid())
        .bind(conversation.is_active)
        .bind(direct_key_of(conversation))
        .bind(conversation.last_message_at)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("conversation", e))?;

        for participant in &conversation.participants {
            query(
                r#"
                INSERT INTO conversation_participants
                    (conversation_id, user_id, role, joined_at, left_at, is_active, last_read_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(participant.conversation_id.as_uuid())
            .bind(participant.user_id.as_uuid())
            .bind(participant.role.as_str())
            .bind(participant.joined_at)
            .bind(participant.left_at)
            .bind(participant.is_active)
            .bind(participant.last_read_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("user", e))?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(conversation.clone())
    }

    async fn find_by_id(&self, id: ConversationId) -> DomainResult<Option<Conversation>> {
        let row = query_as::<_, DbConversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_direct_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> DomainResult<Option<Conversation>> {
        let row = query_as::<_, DbConversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE direct_key = $1 AND is_active = TRUE"
        ))
        .bind(direct_key(a, b))
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<PaginatedResult<Conversation>> {
        let total: i64 = query_scalar(
            r#"
            SELECT COUNT(*)
            FROM conversations c
            JOIN conversation_participants p ON p.conversation_id = c.id
            WHERE p.user_id = $1 AND p.is_active = TRUE AND c.is_active = TRUE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        let rows = query_as::<_, DbConversation>(
            r#"
            SELECT c.id, c.type AS conversation_type, c.title, c.created_by, c.is_active,
                   c.last_message_at, c.created_at, c.updated_at
            FROM conversations c
            JOIN conversation_participants p ON p.conversation_id = c.id
            WHERE p.user_id = $1 AND p.is_active = TRUE AND c.is_active = TRUE
            ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        let items = self.hydrate(rows).await?;
        Ok(PaginatedResult::new(items, total as u64, pagination))
    }

    async fn find_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DomainResult<Option<Participant>> {
        let row = query_as::<_, DbParticipant>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM conversation_participants \
             WHERE conversation_id = $1 AND user_id = $2"
        ))
        .bind(conversation_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.map(Participant::try_from).transpose()
    }

    async fn is_active_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DomainResult<bool> {
        query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM conversation_participants p
                JOIN conversations c ON c.id = p.conversation_id
                WHERE p.conversation_id = $1 AND p.user_id = $2
                  AND p.is_active = TRUE AND c.is_active = TRUE
            )
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)
    }

    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
        now: Timestamp,
    ) -> DomainResult<Participant> {
        let row = query_as::<_, DbParticipant>(&format!(
            "INSERT INTO conversation_participants (conversation_id, user_id, role, joined_at, is_active) \
             VALUES ($1, $2, $3, $4, TRUE) \
             ON CONFLICT (conversation_id, user_id) DO UPDATE \
             SET role = EXCLUDED.role, joined_at = EXCLUDED.joined_at, left_at = NULL, is_active = TRUE \
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(conversation_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_db_error("conversation", e))?;

        query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id.as_uuid())
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        row.try_into()
    }

    async fn remove_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        now: Timestamp,
    ) -> DomainResult<bool> {
        let result = query(
            r#"
            UPDATE conversation_participants
            SET is_active = FALSE, left_at = $3
            WHERE conversation_id = $1 AND user_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_last_read(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        read_at: Timestamp,
    ) -> DomainResult<bool> {
        let result = query(
            r#"
            UPDATE conversation_participants
            SET last_read_at = $3
            WHERE conversation_id = $1 AND user_id = $2
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(read_at)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_title(
        &self,
        conversation_id: ConversationId,
        title: Option<String>,
        now: Timestamp,
    ) -> DomainResult<bool> {
        let result = query("UPDATE conversations SET title = $2, updated_at = $3 WHERE id = $1")
            .bind(conversation_id.as_uuid())
            .bind(title)
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_message(
        &self,
        conversation_id: ConversationId,
        at: Timestamp,
    ) -> DomainResult<()> {
        let result =
            query("UPDATE conversations SET last_message_at = $2, updated_at = $2 WHERE id = $1")
                .bind(conversation_id.as_uuid())
                .bind(at)
                .execute(&*self.pool)
                .await
                .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::resource_not_found(
                "conversation",
                conversation_id,
            ));
        }
        Ok(())
    }

    async fn deactivate(
        &self,
        conversation_id: ConversationId,
        now: Timestamp,
    ) -> DomainResult<bool> {
        let result = query(
            "UPDATE conversations SET is_active = FALSE, updated_at = $2 \
             WHERE id = $1 AND is_active = TRUE",
        )
        .bind(conversation_id.as_uuid())
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }
}
