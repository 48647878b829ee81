//! 消息Repository接口定义

use async_trait::async_trait;

use crate::entities::Message;
use crate::errors::DomainResult;
use crate::repositories::{PaginatedResult, Pagination};
use crate::value_objects::{ConversationId, MessageId, Timestamp, UserId};

/// 分页游标，取游标之前（更早）的消息
///
/// 游标指向的消息即使已被软删除，仍然按其位置定位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCursor {
    pub created_at: Timestamp,
    pub id: MessageId,
}

impl From<&Message> for MessageCursor {
    fn from(message: &Message) -> Self {
        Self {
            created_at: message.created_at,
            id: message.id,
        }
    }
}

/// 消息Repository接口
///
/// 除 `find_by_id` 外，所有读取都排除已软删除的消息。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 保存新消息
    async fn create(&self, message: &Message) -> DomainResult<Message>;

    /// 根据ID查找消息（含已软删除的）
    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<Message>>;

    /// 分页列出会话消息
    ///
    /// 第一页为最新的消息，页内按 (创建时间, ID) 升序排列。
    async fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        pagination: Pagination,
        before: Option<MessageCursor>,
    ) -> DomainResult<PaginatedResult<Message>>;

    /// 不区分大小写的内容搜索，按创建时间倒序
    async fn search(
        &self,
        conversation_id: ConversationId,
        query: &str,
        pagination: Pagination,
    ) -> DomainResult<PaginatedResult<Message>>;

    /// 会话的最新一条消息
    async fn latest(&self, conversation_id: ConversationId) -> DomainResult<Option<Message>>;

    /// 更新消息内容并设置编辑标记
    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        now: Timestamp,
    ) -> DomainResult<Option<Message>>;

    /// 软删除
    async fn soft_delete(&self, id: MessageId, now: Timestamp) -> DomainResult<bool>;

    /// 永久删除
    async fn hard_delete(&self, id: MessageId) -> DomainResult<bool>;

    /// 统计未读消息：非本人发送、未删除、且创建时间严格晚于 `after`（为空时不限）
    async fn count_unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> DomainResult<u64>;

    /// 列出未读消息，筛选条件与 `count_unread` 一致，按创建时间升序
    async fn list_unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> DomainResult<Vec<Message>>;
}
