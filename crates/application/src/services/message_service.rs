use std::sync::Arc;

use domain::{
    ConversationId, ConversationRepository, DomainError, FileAttachment, Message, MessageCursor,
    MessageDraft, MessageId, MessageRepository, MessageType, PaginatedResult, Pagination,
    UserIdentity, UserId,
};

use super::load_for_participant;
use crate::{
    clock::Clock,
    error::ApplicationError,
    realtime::{DeliveryDispatcher, EventSink, SendOrigin},
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub conversation_id: ConversationId,
    pub content: String,
    pub message_type: Option<MessageType>,
    pub reply_to_message_id: Option<MessageId>,
    pub attachment: Option<FileAttachment>,
}

pub struct MessageServiceDependencies {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub dispatcher: Arc<DeliveryDispatcher>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    // 载入未删除的消息
    async fn load_visible(&self, message_id: MessageId) -> Result<Message, ApplicationError> {
        self.deps
            .messages
            .find_by_id(message_id)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or_else(|| DomainError::resource_not_found("message", message_id).into())
    }

    async fn load_authored(
        &self,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<Message, ApplicationError> {
        let message = self.load_visible(message_id).await?;
        if !message.is_authored_by(user_id) {
            return Err(ApplicationError::authorization(
                "only the author can modify this message",
            ));
        }
        Ok(message)
    }

    /// 分页列出消息，`before` 为游标消息标识
    pub async fn list(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        pagination: Pagination,
        before: Option<MessageId>,
    ) -> Result<PaginatedResult<Message>, ApplicationError> {
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await?;

        let cursor = match before {
            Some(id) => {
                // 软删除的消息仍可作为游标
                let anchor = self
                    .deps
                    .messages
                    .find_by_id(id)
                    .await?
                    .filter(|m| m.conversation_id == conversation_id)
                    .ok_or_else(|| DomainError::resource_not_found("message", id))?;
                Some(MessageCursor::from(&anchor))
            }
            None => None,
        };

        Ok(self
            .deps
            .messages
            .list_by_conversation(conversation_id, pagination, cursor)
            .await?)
    }

    /// 通过 HTTP 发送消息，房间广播经由投递出口完成
    pub async fn send(
        &self,
        sender: &UserIdentity,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let draft = MessageDraft {
            conversation_id: request.conversation_id,
            sender_id: sender.id,
            content: request.content,
            message_type: request.message_type,
            reply_to_message_id: request.reply_to_message_id,
            attachment: request.attachment,
        };
        let outcome = self
            .deps
            .dispatcher
            .dispatch(sender, SendOrigin::Http, draft)
            .await?;
        self.deps.sink.deliver(outcome.outbox);
        Ok(outcome.message)
    }

    pub async fn search(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        query: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResult<Message>, ApplicationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::validation_error("q", "search query must not be empty").into());
        }
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await?;
        Ok(self
            .deps
            .messages
            .search(conversation_id, query, pagination)
            .await?)
    }

    pub async fn latest(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, ApplicationError> {
        load_for_participant(self.deps.conversations.as_ref(), conversation_id, user_id).await?;
        Ok(self.deps.messages.latest(conversation_id).await?)
    }

    pub async fn get(
        &self,
        user_id: UserId,
        message_id: MessageId,
    ) -> Result<Message, ApplicationError> {
        let message = self.load_visible(message_id).await?;
        load_for_participant(
            self.deps.conversations.as_ref(),
            message.conversation_id,
            user_id,
        )
        .await?;
        Ok(message)
    }

    pub async fn update(
        &self,
        user_id: UserId,
        message_id: MessageId,
        content: &str,
    ) -> Result<Message, ApplicationError> {
        self.load_authored(user_id, message_id).await?;
        let content = Message::normalize_edit(content)?;
        let now = self.deps.clock.now();
        self.deps
            .messages
            .update_content(message_id, &content, now)
            .await?
            .ok_or_else(|| DomainError::resource_not_found("message", message_id).into())
    }

    /// 软删除，仅作者可操作
    pub async fn delete(&self, user_id: UserId, message_id: MessageId) -> Result<(), ApplicationError> {
        self.load_authored(user_id, message_id).await?;
        let now = self.deps.clock.now();
        self.deps.messages.soft_delete(message_id, now).await?;
        tracing::info!(message_id = %message_id, user_id = %user_id, "message deleted");
        Ok(())
    }

    /// 永久删除，仅管理员可操作
    pub async fn delete_permanently(
        &self,
        actor: &UserIdentity,
        message_id: MessageId,
    ) -> Result<(), ApplicationError> {
        if !actor.role.is_admin() {
            return Err(ApplicationError::authorization(
                "only administrators can permanently delete messages",
            ));
        }
        if !self.deps.messages.hard_delete(message_id).await? {
            return Err(DomainError::resource_not_found("message", message_id).into());
        }
        tracing::warn!(message_id = %message_id, actor_id = %actor.id, "message permanently deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::realtime::{Outbox, RealtimeState};
    use chrono::Duration;
    use domain::{Conversation, ConversationType, ServerEvent, UserRole};
    use infrastructure::memory::{
        InMemoryConversationRepository, InMemoryMessageRepository, InMemoryNotificationRepository,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Outbox>>);

    impl EventSink for RecordingSink {
        fn deliver(&self, outbox: Outbox) {
            self.0.lock().unwrap().push(outbox);
        }
    }

    struct Fixture {
        service: MessageService,
        sink: Arc<RecordingSink>,
        state: crate::realtime::SharedRealtimeState,
        clock: Arc<ManualClock>,
        alice: UserIdentity,
        bob: UserIdentity,
        conversation_id: ConversationId,
    }

    async fn fixture() -> Fixture {
        let conversations = Arc::new(InMemoryConversationRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let clock = Arc::new(ManualClock::default());
        let alice = UserIdentity::new(UserId::generate(), "Alice", UserRole::Customer);
        let bob = UserIdentity::new(UserId::generate(), "Bob", UserRole::Tasker);
        let conversation = Conversation::create(
            ConversationId::generate(),
            alice.id,
            ConversationType::Direct,
            None,
            &[bob.id],
            clock.now(),
        )
        .unwrap();
        conversations.create(&conversation).await.unwrap();

        let state = RealtimeState::shared(tokio::time::Duration::from_secs(5));
        let dispatcher = Arc::new(DeliveryDispatcher::new(
            conversations.clone(),
            messages.clone(),
            Arc::new(InMemoryNotificationRepository::new()),
            clock.clone(),
            state.clone(),
            100,
        ));
        let sink = Arc::new(RecordingSink::default());
        let service = MessageService::new(MessageServiceDependencies {
            conversations,
            messages,
            dispatcher,
            sink: sink.clone(),
            clock: clock.clone(),
        });
        Fixture {
            service,
            sink,
            state,
            clock,
            alice,
            bob,
            conversation_id: conversation.id,
        }
    }

    fn text(conversation_id: ConversationId, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id,
            content: content.into(),
            message_type: None,
            reply_to_message_id: None,
            attachment: None,
        }
    }

    async fn send_many(f: &Fixture, count: usize) -> Vec<Message> {
        let mut sent = Vec::new();
        for i in 0..count {
            f.clock.advance(Duration::seconds(1));
            sent.push(
                f.service
                    .send(&f.alice, text(f.conversation_id, &format!("m{i}")))
                    .await
                    .unwrap(),
            );
        }
        sent
    }

    #[tokio::test]
    async fn http_send_is_broadcast_once_through_sink() {
        let f = fixture().await;
        let bob_conn = domain::ConnectionId::generate();
        {
            let mut state = f.state.lock().await;
            state.presence.register(f.bob.clone(), bob_conn);
            state.rooms.join(bob_conn, f.conversation_id);
        }
        let message = f
            .service
            .send(&f.alice, text(f.conversation_id, " hello "))
            .await
            .unwrap();
        assert_eq!(message.content, "hello");

        let delivered = f.sink.0.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        let events = delivered[0].events_for(bob_conn);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ServerEvent::NewMessage { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn pages_are_newest_first_and_ascending_within() {
        let f = fixture().await;
        let sent = send_many(&f, 5).await;

        let first = f
            .service
            .list(f.bob.id, f.conversation_id, Pagination::new(1, 2), None)
            .await
            .unwrap();
        let contents: Vec<_> = first.items.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert_eq!(first.total_count, 5);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);

        let older = f
            .service
            .list(f.bob.id, f.conversation_id, Pagination::new(1, 10), Some(sent[3].id))
            .await
            .unwrap();
        let contents: Vec<_> = older.items.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn soft_deleted_message_still_anchors_cursor() {
        let f = fixture().await;
        let sent = send_many(&f, 4).await;
        f.service.delete(f.alice.id, sent[2].id).await.unwrap();

        let page = f
            .service
            .list(f.bob.id, f.conversation_id, Pagination::default(), Some(sent[2].id))
            .await
            .unwrap();
        let contents: Vec<_> = page.items.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1"]);

        let all = f
            .service
            .list(f.bob.id, f.conversation_id, Pagination::default(), None)
            .await
            .unwrap();
        assert_eq!(all.total_count, 3);
        assert!(f.service.get(f.bob.id, sent[2].id).await.is_err());
    }

    #[tokio::test]
    async fn only_author_edits_and_admin_purges() {
        let f = fixture().await;
        let message = f
            .service
            .send(&f.alice, text(f.conversation_id, "draft"))
            .await
            .unwrap();

        let err = f.service.update(f.bob.id, message.id, "hacked").await.unwrap_err();
        assert!(matches!(err, ApplicationError::Authorization(_)));
        let err = f.service.update(f.alice.id, message.id, "  ").await.unwrap_err();
        assert!(matches!(err, ApplicationError::Domain(DomainError::ValidationError { .. })));

        let edited = f.service.update(f.alice.id, message.id, " final ").await.unwrap();
        assert_eq!(edited.content, "final");
        assert!(edited.is_edited);

        let err = f.service.delete_permanently(&f.alice, message.id).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Authorization(_)));
        let admin = UserIdentity::new(UserId::generate(), "Root", UserRole::Admin);
        f.service.delete_permanently(&admin, message.id).await.unwrap();
        assert!(f.service.get(f.alice.id, message.id).await.is_err());
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let f = fixture().await;
        f.service
            .send(&f.alice, text(f.conversation_id, "Need a Plumber tomorrow"))
            .await
            .unwrap();
        f.clock.advance(Duration::seconds(1));
        f.service
            .send(&f.alice, text(f.conversation_id, "thanks"))
            .await
            .unwrap();

        let found = f
            .service
            .search(f.bob.id, f.conversation_id, "plumber", Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.total_count, 1);
        assert!(f
            .service
            .search(f.bob.id, f.conversation_id, "  ", Pagination::default())
            .await
            .is_err());
        let latest = f.service.latest(f.bob.id, f.conversation_id).await.unwrap();
        assert_eq!(latest.map(|m| m.content), Some("thanks".to_string()));
    }
}
