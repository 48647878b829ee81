//! 通知Repository实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    DomainError, DomainResult, Notification, NotificationFilter, NotificationId,
    NotificationRepository, NotificationStats, NotificationType, PaginatedResult, Pagination,
    Timestamp, UserId,
};
use serde_json::Value as JsonValue;
use sqlx::{query, query_as, query_scalar, FromRow};
use uuid::Uuid;

use crate::db::{db_error, map_db_error, DbPool};

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, content, type AS notification_type, \
     data, is_read, read_at, expires_at, created_at";

const INSERT_NOTIFICATION: &str = "INSERT INTO notifications \
        (id, user_id, title, content, type, data, is_read, read_at, expires_at, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     RETURNING id, user_id, title, content, type AS notification_type, \
        data, is_read, read_at, expires_at, created_at";

/// 数据库通知模型
#[derive(Debug, Clone, FromRow)]
struct DbNotification {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    notification_type: String,
    data: Option<JsonValue>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbNotification> for Notification {
    type Error = DomainError;

    fn try_from(row: DbNotification) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: NotificationId::new(row.id),
            user_id: UserId::new(row.user_id),
            title: row.title,
            content: row.content,
            notification_type: row.notification_type.parse::<NotificationType>()?,
            data: row.data,
            is_read: row.is_read,
            read_at: row.read_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

fn bind_insert(
    notification: &Notification,
) -> sqlx::query::QueryAs<'_, sqlx::Postgres, DbNotification, sqlx::postgres::PgArguments> {
    query_as::<_, DbNotification>(INSERT_NOTIFICATION)
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.as_uuid())
        .bind(&notification.title)
        .bind(&notification.content)
        .bind(notification.notification_type.as_str())
        .bind(&notification.data)
        .bind(notification.is_read)
        .bind(notification.read_at)
        .bind(notification.expires_at)
        .bind(notification.created_at)
}

/// 通知Repository实现
pub struct PgNotificationRepository {
    pool: Arc<DbPool>,
}

impl PgNotificationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &Notification) -> DomainResult<Notification> {
        let row = bind_insert(notification)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error("notification", e))?;

        row.try_into()
    }

    async fn create_many(
        &self,
        notifications: &[Notification],
    ) -> DomainResult<Vec<Notification>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut created = Vec::with_capacity(notifications.len());
        for notification in notifications {
            let row = bind_insert(notification)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_db_error("notification", e))?;
            created.push(Notification::try_from(row)?);
        }
        tx.commit().await.map_err(db_error)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: NotificationId) -> DomainResult<Option<Notification>> {
        let row = query_as::<_, DbNotification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error)?;

        row.map(Notification::try_from).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        pagination: Pagination,
        now: Timestamp,
    ) -> DomainResult<PaginatedResult<Notification>> {
        let notification_type = filter.notification_type.map(|t| t.as_str());

        let total: i64 = query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1
              AND (expires_at IS NULL OR expires_at > $2)
              AND ($3::text IS NULL OR type = $3)
              AND ($4::boolean IS NULL OR is_read = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .bind(notification_type)
        .bind(filter.is_read)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        let rows = query_as::<_, DbNotification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 \
               AND (expires_at IS NULL OR expires_at > $2) \
               AND ($3::text IS NULL OR type = $3) \
               AND ($4::boolean IS NULL OR is_read = $4) \
               AND ($5::timestamptz IS NULL OR created_at >= $5) \
               AND ($6::timestamptz IS NULL OR created_at <= $6) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $7 OFFSET $8"
        ))
        .bind(user_id.as_uuid())
        .bind(now)
        .bind(notification_type)
        .bind(filter.is_read)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        let items = rows
            .into_iter()
            .map(Notification::try_from)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(PaginatedResult::new(items, total as u64, pagination))
    }

    async fn count_unread(&self, user_id: UserId, now: Timestamp) -> DomainResult<u64> {
        let count: i64 = query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1 AND is_read = FALSE
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(count as u64)
    }

    async fn list_unread(
        &self,
        user_id: UserId,
        limit: u32,
        now: Timestamp,
    ) -> DomainResult<Vec<Notification>> {
        let rows = query_as::<_, DbNotification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND is_read = FALSE \
               AND (expires_at IS NULL OR expires_at > $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(user_id.as_uuid())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn stats(&self, user_id: UserId, now: Timestamp) -> DomainResult<NotificationStats> {
        let rows: Vec<(String, i64, i64)> = query_as(
            r#"
            SELECT type, COUNT(*), COUNT(*) FILTER (WHERE is_read = FALSE)
            FROM notifications
            WHERE user_id = $1 AND (expires_at IS NULL OR expires_at > $2)
            GROUP BY type
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        let mut stats = NotificationStats::default();
        for (notification_type, total, unread) in rows {
            stats.total += total as u64;
            stats.unread += unread as u64;
            if unread > 0 {
                stats
                    .unread_by_type
                    .insert(notification_type.parse::<NotificationType>()?, unread as u64);
            }
        }
        Ok(stats)
    }

    async fn mark_read(&self, id: NotificationId, at: Timestamp) -> DomainResult<bool> {
        let result = query(
            "UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, $2) WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: UserId, at: Timestamp) -> DomainResult<u64> {
        let result = query(
            "UPDATE notifications SET is_read = TRUE, read_at = $2 \
             WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: NotificationId) -> DomainResult<bool> {
        let result = query("DELETE FROM notifications WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_read(&self, user_id: UserId) -> DomainResult<u64> {
        let result = query("DELETE FROM notifications WHERE user_id = $1 AND is_read = TRUE")
            .bind(user_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: Timestamp) -> DomainResult<u64> {
        let result = query(
            "DELETE FROM notifications WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
