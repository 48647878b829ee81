use std::sync::Arc;

use domain::{
    Conversation, ConversationId, ConversationRepository, ConversationType, DomainError, Message,
    MessageRepository, PaginatedResult, Pagination, Participant, ParticipantRole, Timestamp,
    UserDirectory, UserId,
};

use super::load_for_participant;
use crate::{clock::Clock, error::ApplicationError};

#[derive(Debug, Clone)]
pub struct CreateConversationRequest {
    pub creator_id: UserId,
    pub conversation_type: ConversationType,
    pub title: Option<String>,
    pub participants: Vec<UserId>,
}

/// 创建结果；重复创建私聊时返回已有会话，`created` 为 `false`
#[derive(Debug, Clone)]
pub struct CreatedConversation {
    pub conversation: Conversation,
    pub created: bool,
}

/// 会话列表项
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread_count: u64,
}

pub struct ConversationServiceDependencies {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub clock: Arc<dyn Clock>,
}

pub struct ConversationService {
    deps: ConversationServiceDependencies,
}

impl ConversationService {
    pub fn new(deps: ConversationServiceDependencies) -> Self {
        Self { deps }
    }

    async fn ensure_user_exists(&self, user_id: UserId) -> Result<(), ApplicationError> {
        self.deps
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::resource_not_found("user", user_id))?;
        Ok(())
    }

    pub async fn create(
        &self,
        request: CreateConversationRequest,
    ) -> Result<CreatedConversation, ApplicationError> {
        let now = self.deps.clock.now();
        let conversation = Conversation::create(
            ConversationId::generate(),
            request.creator_id,
            request.conversation_type,
            request.title,
            &request.participants,
            now,
        )?;

        for participant in conversation.participants.iter().skip(1) {
            self.ensure_user_exists(participant.user_id).await?;
        }

        if let Some(other) = conversation.counterpart(request.creator_id) {
            if let Some(existing) = self.find_direct(request.creator_id, other).await? {
                return Ok(CreatedConversation {
                    conversation: existing,
                    created: false,
                });
            }
        }

        match self.deps.conversations.create(&conversation).await {
            Ok(stored) => {
                tracing::info!(
                    conversation_id = %stored.id,
                    creator_id = %request.creator_id,
                    conversation_type = %stored.conversation_type,
                    "conversation created"
                );
                Ok(CreatedConversation {
                    conversation: stored,
                    created: true,
                })
            }
            // 并发创建同一对私聊时，后到者取回已有会话
            Err(DomainError::ResourceAlreadyExists { .. }) if conversation.is_direct() => {
                let other = conversation
                    .counterpart(request.creator_id)
                    .ok_or_else(|| DomainError::business_rule_violation("direct conversation without counterpart"))?;
                let existing = self
                    .find_direct(request.creator_id, other)
                    .await?
                    .ok_or_else(|| DomainError::resource_not_found("conversation", "direct"))?;
                Ok(CreatedConversation {
                    conversation: existing,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_direct(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<Option<Conversation>, ApplicationError> {
        Ok(self.deps.conversations.find_direct_between(a, b).await?)
    }

    pub async fn list(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<PaginatedResult<ConversationSummary>, ApplicationError> {
        let page = self
            .deps
            .conversations
            .list_for_user(user_id, pagination)
            .await?;

        let mut items = Vec::with_capacity(page.items.len());
        for conversation in &page.items {
            let last_message = self.deps.messages.latest(conversation.id).await?;
            let last_read = conversation
                .participant(user_id)
                .and_then(|p| p.last_read_at);
            let unread_count = self
                .deps
                .messages
                .count_unread(conversation.id, user_id, last_read)
                .await?;
            items.push((last_message, unread_count));
        }

        let mut extras = items.into_iter();
        Ok(page.map(|conversation| {
            let (last_message, unread_count) = extras.next().unwrap_or_default();
            ConversationSummary {
                conversation,
                last_message,
                unread_count,
            }
        }))
    }

    pub async fn get(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await
    }

    pub async fn update_title(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        title: Option<String>,
    ) -> Result<Conversation, ApplicationError> {
        let conversation =
            load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id)
                .await?;
        let title = conversation.validate_title(title)?;
        let now = self.deps.clock.now();
        self.deps
            .conversations
            .update_title(conversation_id, title, now)
            .await?;
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await
    }

    pub async fn delete(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<(), ApplicationError> {
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await?;
        let now = self.deps.clock.now();
        self.deps
            .conversations
            .deactivate(conversation_id, now)
            .await?;
        tracing::info!(conversation_id = %conversation_id, user_id = %user_id, "conversation deactivated");
        Ok(())
    }

    pub async fn add_participant(
        &self,
        actor_id: UserId,
        conversation_id: ConversationId,
        participant_id: UserId,
        role: ParticipantRole,
    ) -> Result<Participant, ApplicationError> {
        let conversation =
            load_for_participant(self.deps.conversations.as_ref(), conversation_id, actor_id)
                .await?;
        conversation.ensure_membership_mutable()?;

        if let Some(existing) = conversation
            .participant(participant_id)
            .filter(|p| p.is_active)
        {
            return Ok(existing.clone());
        }
        self.ensure_user_exists(participant_id).await?;

        let now = self.deps.clock.now();
        let participant = self
            .deps
            .conversations
            .add_participant(conversation_id, participant_id, role, now)
            .await?;
        tracing::info!(
            conversation_id = %conversation_id,
            actor_id = %actor_id,
            participant_id = %participant_id,
            "participant added"
        );
        Ok(participant)
    }

    pub async fn remove_participant(
        &self,
        actor_id: UserId,
        conversation_id: ConversationId,
        participant_id: UserId,
    ) -> Result<(), ApplicationError> {
        let conversation =
            load_for_participant(self.deps.conversations.as_ref(), conversation_id, actor_id)
                .await?;
        conversation.ensure_membership_mutable()?;
        if !conversation.is_active_participant(participant_id) {
            return Err(DomainError::resource_not_found("participant", participant_id).into());
        }

        let now = self.deps.clock.now();
        self.deps
            .conversations
            .remove_participant(conversation_id, participant_id, now)
            .await?;
        tracing::info!(
            conversation_id = %conversation_id,
            actor_id = %actor_id,
            participant_id = %participant_id,
            "participant removed"
        );
        Ok(())
    }

    /// 标记会话已读（不经过实时层节流）
    pub async fn mark_read(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Timestamp, ApplicationError> {
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await?;
        let read_at = self.deps.clock.now();
        self.deps
            .conversations
            .update_last_read(conversation_id, user_id, read_at)
            .await?;
        Ok(read_at)
    }

    async fn last_read(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Option<Timestamp>, ApplicationError> {
        let conversation =
            load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id)
                .await?;
        Ok(conversation
            .participant(user_id)
            .and_then(|p| p.last_read_at))
    }

    pub async fn unread_count(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<u64, ApplicationError> {
        let last_read = self.last_read(user_id, conversation_id).await?;
        Ok(self
            .deps
            .messages
            .count_unread(conversation_id, user_id, last_read)
            .await?)
    }

    pub async fn unread_messages(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApplicationError> {
        let last_read = self.last_read(user_id, conversation_id).await?;
        Ok(self
            .deps
            .messages
            .list_unread(conversation_id, user_id, last_read)
            .await?)
    }
}
