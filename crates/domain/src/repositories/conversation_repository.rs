//! 会话与成员关系Repository接口定义

use async_trait::async_trait;

use crate::entities::{Conversation, Participant, ParticipantRole};
use crate::errors::DomainResult;
use crate::repositories::{PaginatedResult, Pagination};
use crate::value_objects::{ConversationId, Timestamp, UserId};

/// 会话Repository接口
///
/// 每次调用都直接查询存储，成员关系不在调用方缓存。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 保存新会话及其参与者
    async fn create(&self, conversation: &Conversation) -> DomainResult<Conversation>;

    /// 根据ID查找会话（含全部参与者）
    async fn find_by_id(&self, id: ConversationId) -> DomainResult<Option<Conversation>>;

    /// 查找两名用户之间的有效私聊会话
    async fn find_direct_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> DomainResult<Option<Conversation>>;

    /// 列出用户参与的有效会话，按最近活动时间倒序
    async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<PaginatedResult<Conversation>>;

    /// 查找参与者记录（含已离开的）
    async fn find_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DomainResult<Option<Participant>>;

    /// 用户是否为有效会话的有效参与者
    async fn is_active_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DomainResult<bool>;

    /// 添加参与者，已离开的参与者会被重新激活
    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
        now: Timestamp,
    ) -> DomainResult<Participant>;

    /// 移除参与者（标记为已离开）
    async fn remove_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        now: Timestamp,
    ) -> DomainResult<bool>;

    /// 更新参与者的最后阅读时间
    async fn update_last_read(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        read_at: Timestamp,
    ) -> DomainResult<bool>;

    /// 更新会话标题
    async fn update_title(
        &self,
        conversation_id: ConversationId,
        title: Option<String>,
        now: Timestamp,
    ) -> DomainResult<bool>;

    /// 记录最新消息时间
    async fn touch_last_message(
        &self,
        conversation_id: ConversationId,
        at: Timestamp,
    ) -> DomainResult<()>;

    /// 停用会话
    async fn deactivate(&self, conversation_id: ConversationId, now: Timestamp)
        -> DomainResult<bool>;
}
