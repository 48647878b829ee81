//! 消息投递
//!
//! 一次发送依次经过：授权、持久化、回执、房间广播、参与者通知。
//! 广播只在持久化成功后发生一次，与请求来自哪种传输无关。

use std::sync::Arc;

use domain::{
    ConnectionId, Conversation, ConversationRepository, DomainError, Message, MessageDraft,
    MessageId, MessageRepository, Notification, NotificationId, NotificationRepository,
    ServerEvent, UserIdentity,
};

use super::outbox::Outbox;
use super::state::SharedRealtimeState;
use crate::clock::Clock;
use crate::error::ApplicationError;

/// 发送请求的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOrigin {
    /// 实时连接：发起连接收到回执，房间内其他连接收到广播
    Connection(ConnectionId),
    /// HTTP 请求：响应本身即回执，房间内所有连接收到广播
    Http,
}

impl SendOrigin {
    fn connection(&self) -> Option<ConnectionId> {
        match self {
            SendOrigin::Connection(id) => Some(*id),
            SendOrigin::Http => None,
        }
    }
}

/// 一次投递的结果
#[derive(Debug)]
pub struct DispatchOutcome {
    pub message: Message,
    pub outbox: Outbox,
    pub notifications_created: usize,
    pub notification_failures: usize,
}

pub struct DeliveryDispatcher {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
    state: SharedRealtimeState,
    preview_chars: usize,
}

impl DeliveryDispatcher {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        clock: Arc<dyn Clock>,
        state: SharedRealtimeState,
        preview_chars: usize,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
            clock,
            state,
            preview_chars,
        }
    }

    pub async fn dispatch(
        &self,
        sender: &UserIdentity,
        origin: SendOrigin,
        draft: MessageDraft,
    ) -> Result<DispatchOutcome, ApplicationError> {
        let conversation_id = draft.conversation_id;

        // 授权
        let conversation = self.authorize(sender, &draft).await?;

        // 持久化
        let now = self.clock.now();
        let message = draft.into_message(MessageId::generate(), now)?;
        let message = self.messages.create(&message).await?;
        if let Err(err) = self
            .conversations
            .touch_last_message(conversation_id, message.created_at)
            .await
        {
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %message.id,
                error = %err,
                "failed to record last message time"
            );
        }

        let event = ServerEvent::NewMessage {
            message: message.clone(),
            conversation_id,
        };

        let recipients: Vec<_> = conversation
            .active_participants()
            .map(|p| p.user_id)
            .filter(|user_id| *user_id != sender.id)
            .collect();

        let mut outbox = Outbox::new();
        let online = {
            let state = self.state.lock().await;

            // 回执
            if let Some(connection_id) = origin.connection() {
                outbox.push(connection_id, event.clone());
            }

            // 房间广播
            let audience = match origin.connection() {
                Some(connection_id) => state.rooms.members_except(conversation_id, connection_id),
                None => state.rooms.members(conversation_id),
            };
            outbox.push_all(audience, &event);

            recipients
                .iter()
                .map(|user_id| (*user_id, state.presence.connections_of(*user_id)))
                .collect::<Vec<_>>()
        };

        // 参与者通知，单个失败不影响其他人
        let mut notifications_created = 0;
        let mut notification_failures = 0;
        for (recipient, connections) in online {
            let notification = Notification::for_message(
                NotificationId::generate(),
                recipient,
                conversation_id,
                sender.id,
                &sender.name,
                &message.content,
                self.preview_chars,
                now,
            );
            match self.notifications.create(&notification).await {
                Ok(stored) => {
                    notifications_created += 1;
                    let event = ServerEvent::NewNotification {
                        notification_type: stored.notification_type,
                        conversation_id,
                        sender_id: sender.id,
                        sender_name: sender.name.clone(),
                        content: stored.content,
                    };
                    outbox.push_all(connections, &event);
                }
                Err(err) => {
                    notification_failures += 1;
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        message_id = %message.id,
                        recipient_id = %recipient,
                        error = %err,
                        "failed to create message notification"
                    );
                }
            }
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            sender_id = %sender.id,
            deliveries = outbox.len(),
            "message dispatched"
        );

        Ok(DispatchOutcome {
            message,
            outbox,
            notifications_created,
            notification_failures,
        })
    }

    async fn authorize(
        &self,
        sender: &UserIdentity,
        draft: &MessageDraft,
    ) -> Result<Conversation, ApplicationError> {
        let conversation = self
            .conversations
            .find_by_id(draft.conversation_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| DomainError::resource_not_found("conversation", draft.conversation_id))?;

        if !conversation.is_active_participant(sender.id) {
            tracing::info!(
                conversation_id = %draft.conversation_id,
                user_id = %sender.id,
                "send rejected: not a participant"
            );
            return Err(ApplicationError::not_participant());
        }

        if let Some(reply_to) = draft.reply_to_message_id {
            let target = self.messages.find_by_id(reply_to).await?;
            let valid = target.is_some_and(|m| {
                m.conversation_id == draft.conversation_id && !m.is_deleted
            });
            if !valid {
                return Err(DomainError::validation_error(
                    "replyToMessageId",
                    "replied message does not exist in this conversation",
                )
                .into());
            }
        }

        Ok(conversation)
    }
}
