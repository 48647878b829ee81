//! 通知Repository接口定义

use async_trait::async_trait;

use crate::entities::{Notification, NotificationFilter, NotificationStats};
use crate::errors::DomainResult;
use crate::repositories::{PaginatedResult, Pagination};
use crate::value_objects::{NotificationId, Timestamp, UserId};

/// 通知Repository接口
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 创建通知
    async fn create(&self, notification: &Notification) -> DomainResult<Notification>;

    /// 在同一事务中批量创建通知
    async fn create_many(
        &self,
        notifications: &[Notification],
    ) -> DomainResult<Vec<Notification>>;

    /// 根据ID查找通知
    async fn find_by_id(&self, id: NotificationId) -> DomainResult<Option<Notification>>;

    /// 列出用户未过期的通知，按创建时间倒序
    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        pagination: Pagination,
        now: Timestamp,
    ) -> DomainResult<PaginatedResult<Notification>>;

    /// 未读且未过期的通知数
    async fn count_unread(&self, user_id: UserId, now: Timestamp) -> DomainResult<u64>;

    /// 最近的未读且未过期的通知，最多 `limit` 条
    async fn list_unread(
        &self,
        user_id: UserId,
        limit: u32,
        now: Timestamp,
    ) -> DomainResult<Vec<Notification>>;

    /// 未过期通知的统计
    async fn stats(&self, user_id: UserId, now: Timestamp) -> DomainResult<NotificationStats>;

    /// 标记为已读
    async fn mark_read(&self, id: NotificationId, at: Timestamp) -> DomainResult<bool>;

    /// 标记用户全部通知为已读，返回受影响条数
    async fn mark_all_read(&self, user_id: UserId, at: Timestamp) -> DomainResult<u64>;

    /// 删除通知
    async fn delete(&self, id: NotificationId) -> DomainResult<bool>;

    /// 删除用户全部已读通知，返回删除条数
    async fn delete_read(&self, user_id: UserId) -> DomainResult<u64>;

    /// 删除所有已过期通知，返回删除条数
    async fn delete_expired(&self, now: Timestamp) -> DomainResult<u64>;
}
