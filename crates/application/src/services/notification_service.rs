use std::collections::HashSet;
use std::sync::Arc;

use domain::{
    DomainError, Notification, NotificationDraft, NotificationFilter, NotificationId,
    NotificationRepository, NotificationStats, PaginatedResult, Pagination, ServerEvent, UserId,
    UserIdentity,
};

use crate::{
    clock::Clock,
    error::ApplicationError,
    realtime::{EventSink, Outbox, SharedRealtimeState},
};

/// 未读列表默认条数
const DEFAULT_UNREAD_LIMIT: u32 = 10;
const MAX_UNREAD_LIMIT: u32 = 100;

pub struct NotificationServiceDependencies {
    pub notifications: Arc<dyn NotificationRepository>,
    pub state: SharedRealtimeState,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct NotificationService {
    deps: NotificationServiceDependencies,
}

impl NotificationService {
    pub fn new(deps: NotificationServiceDependencies) -> Self {
        Self { deps }
    }

    // 只允许通知所有者操作
    async fn load_owned(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification, ApplicationError> {
        let notification = self
            .deps
            .notifications
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| DomainError::resource_not_found("notification", notification_id))?;
        if notification.user_id != user_id {
            return Err(ApplicationError::authorization(
                "notification belongs to another user",
            ));
        }
        Ok(notification)
    }

    fn ensure_admin(actor: &UserIdentity) -> Result<(), ApplicationError> {
        if actor.role.is_admin() {
            Ok(())
        } else {
            Err(ApplicationError::authorization(
                "only admins can manage notifications",
            ))
        }
    }

    /// 推送给收件人当前在线的所有连接
    async fn push(&self, notifications: &[Notification]) {
        let mut outbox = Outbox::new();
        {
            let state = self.deps.state.lock().await;
            for notification in notifications {
                outbox.push_all(
                    state.presence.connections_of(notification.user_id),
                    &ServerEvent::NotificationCreated(notification.clone()),
                );
            }
        }
        if !outbox.is_empty() {
            self.deps.sink.deliver(outbox);
        }
    }

    pub async fn get(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<Notification, ApplicationError> {
        self.load_owned(user_id, notification_id).await
    }

    pub async fn list(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResult<Notification>, ApplicationError> {
        let now = self.deps.clock.now();
        Ok(self
            .deps
            .notifications
            .list_for_user(user_id, filter, pagination, now)
            .await?)
    }

    /// 最近的未读通知，`limit` 缺省为 10，上限 100
    pub async fn unread(
        &self,
        user_id: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>, ApplicationError> {
        let limit = limit
            .unwrap_or(DEFAULT_UNREAD_LIMIT)
            .clamp(1, MAX_UNREAD_LIMIT);
        let now = self.deps.clock.now();
        Ok(self
            .deps
            .notifications
            .list_unread(user_id, limit, now)
            .await?)
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<u64, ApplicationError> {
        let now = self.deps.clock.now();
        Ok(self.deps.notifications.count_unread(user_id, now).await?)
    }

    pub async fn stats(&self, user_id: UserId) -> Result<NotificationStats, ApplicationError> {
        let now = self.deps.clock.now();
        Ok(self.deps.notifications.stats(user_id, now).await?)
    }

    /// 管理员为单个用户创建通知
    pub async fn create(
        &self,
        actor: &UserIdentity,
        recipient: UserId,
        draft: &NotificationDraft,
    ) -> Result<Notification, ApplicationError> {
        Self::ensure_admin(actor)?;
        let notification =
            draft.into_notification(NotificationId::generate(), recipient, self.deps.clock.now())?;
        let created = self.deps.notifications.create(&notification).await?;
        tracing::info!(
            notification_id = %created.id,
            user_id = %recipient,
            actor_id = %actor.id,
            "notification created"
        );
        self.push(std::slice::from_ref(&created)).await;
        Ok(created)
    }

    /// 管理员为多个用户创建同一条通知，重复的收件人只发一次
    pub async fn create_for_users(
        &self,
        actor: &UserIdentity,
        recipients: &[UserId],
        draft: &NotificationDraft,
    ) -> Result<Vec<Notification>, ApplicationError> {
        Self::ensure_admin(actor)?;
        let mut seen = HashSet::new();
        let recipients: Vec<UserId> = recipients
            .iter()
            .copied()
            .filter(|user_id| seen.insert(*user_id))
            .collect();
        if recipients.is_empty() {
            return Err(
                DomainError::validation_error("userIds", "at least one recipient is required")
                    .into(),
            );
        }

        let now = self.deps.clock.now();
        let batch = recipients
            .iter()
            .map(|user_id| draft.into_notification(NotificationId::generate(), *user_id, now))
            .collect::<Result<Vec<_>, _>>()?;
        let created = self.deps.notifications.create_many(&batch).await?;
        tracing::info!(
            count = created.len(),
            actor_id = %actor.id,
            "notifications created"
        );
        self.push(&created).await;
        Ok(created)
    }

    pub async fn mark_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<(), ApplicationError> {
        let notification = self.load_owned(user_id, notification_id).await?;
        if notification.is_read {
            return Ok(());
        }
        let now = self.deps.clock.now();
        self.deps
            .notifications
            .mark_read(notification_id, now)
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, ApplicationError> {
        let now = self.deps.clock.now();
        Ok(self.deps.notifications.mark_all_read(user_id, now).await?)
    }

    pub async fn delete(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> Result<(), ApplicationError> {
        self.load_owned(user_id, notification_id).await?;
        self.deps.notifications.delete(notification_id).await?;
        Ok(())
    }

    pub async fn delete_read(&self, user_id: UserId) -> Result<u64, ApplicationError> {
        Ok(self.deps.notifications.delete_read(user_id).await?)
    }

    /// 管理员清理所有已过期通知
    pub async fn delete_expired(&self, actor: &UserIdentity) -> Result<u64, ApplicationError> {
        Self::ensure_admin(actor)?;
        let now = self.deps.clock.now();
        let removed = self.deps.notifications.delete_expired(now).await?;
        tracing::info!(removed, actor_id = %actor.id, "expired notifications removed");
        Ok(removed)
    }
}
