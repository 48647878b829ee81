//! 实时命令路由
//!
//! 每条入站命令都在这里授权、修改进程内状态，并返回需要投递的事件。
//! 命令失败只会给发起连接回一个 `error` 事件，连接保持打开。

use std::sync::Arc;

use domain::{
    ClientCommand, ConnectionId, ConversationId, ConversationRepository, MessageDraft,
    NotificationId, PresenceStatus, ServerEvent, UserId, UserIdentity,
};
use tokio::time::{Duration, Instant};

use super::dispatcher::{DeliveryDispatcher, SendOrigin};
use super::outbox::{EventSink, Outbox};
use super::presence::PresenceChange;
use super::state::SharedRealtimeState;
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::services::NotificationService;

/// 实时层参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeSettings {
    pub typing_timeout: Duration,
    pub read_throttle_window: Duration,
    pub notification_preview_chars: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            typing_timeout: Duration::from_millis(3_000),
            read_throttle_window: Duration::from_millis(5_000),
            notification_preview_chars: 100,
        }
    }
}

#[derive(Clone)]
pub struct RealtimeGateway {
    state: SharedRealtimeState,
    conversations: Arc<dyn ConversationRepository>,
    notifications: Arc<NotificationService>,
    dispatcher: Arc<DeliveryDispatcher>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    settings: RealtimeSettings,
}

impl RealtimeGateway {
    pub fn new(
        state: SharedRealtimeState,
        conversations: Arc<dyn ConversationRepository>,
        notifications: Arc<NotificationService>,
        dispatcher: Arc<DeliveryDispatcher>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settings: RealtimeSettings,
    ) -> Self {
        Self {
            state,
            conversations,
            notifications,
            dispatcher,
            sink,
            clock,
            settings,
        }
    }

    pub fn state(&self) -> &SharedRealtimeState {
        &self.state
    }

    /// 登记新连接
    ///
    /// 连接标识由传输层分配，调用前传输层应已能向该连接投递事件。
    /// 新连接总会收到一份在线用户快照；只有用户从离线变为在线时
    /// 才向其他连接广播状态变化。
    pub async fn connect(&self, connection_id: ConnectionId, identity: UserIdentity) -> Outbox {
        let user_id = identity.id;
        let mut outbox = Outbox::new();

        let mut state = self.state.lock().await;
        let change = state.presence.register(identity, connection_id);
        let online = state.presence.list_online();
        outbox.push(connection_id, ServerEvent::OnlineUsers(online.clone()));

        if change == PresenceChange::CameOnline {
            let others: Vec<_> = state
                .presence
                .all_connections()
                .into_iter()
                .filter(|c| *c != connection_id)
                .collect();
            self.announce_presence(&mut outbox, &others, user_id, PresenceStatus::Online, online);
        }
        drop(state);

        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            online = ?change,
            "connection registered"
        );
        outbox
    }

    /// 清理断开的连接
    ///
    /// 连接离开的房间不会单独广播 `user_left`。
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Outbox {
        let mut outbox = Outbox::new();
        let mut state = self.state.lock().await;
        let rooms = state.rooms.drop_connection(connection_id);
        let Some((identity, change)) = state.presence.unregister(connection_id) else {
            return outbox;
        };

        if change == PresenceChange::WentOffline {
            let remaining = state.presence.all_connections();
            let online = state.presence.list_online();
            self.announce_presence(
                &mut outbox,
                &remaining,
                identity.id,
                PresenceStatus::Offline,
                online,
            );
        }
        drop(state);

        tracing::info!(
            connection_id = %connection_id,
            user_id = %identity.id,
            rooms = rooms.len(),
            online = ?change,
            "connection closed"
        );
        outbox
    }

    /// 处理一条命令；任何错误都转换为发给发起连接的 `error` 事件
    pub async fn handle(&self, connection_id: ConnectionId, command: ClientCommand) -> Outbox {
        let name = command.name();
        match self.route(connection_id, command).await {
            Ok(outbox) => outbox,
            Err(err) => {
                match &err {
                    ApplicationError::Authorization(_) | ApplicationError::Domain(_) => {
                        tracing::info!(connection_id = %connection_id, command = name, error = %err, "command rejected");
                    }
                    _ => {
                        tracing::error!(connection_id = %connection_id, command = name, error = %err, "command failed");
                    }
                }
                Outbox::single(connection_id, ServerEvent::error(err.client_message()))
            }
        }
    }

    /// 无法解析的入站帧
    pub fn reject_frame(&self, connection_id: ConnectionId, reason: &str) -> Outbox {
        tracing::debug!(connection_id = %connection_id, reason, "malformed frame");
        Outbox::single(
            connection_id,
            ServerEvent::error(format!("invalid event: {reason}")),
        )
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        self.state.lock().await.presence.list_online()
    }

    async fn route(
        &self,
        connection_id: ConnectionId,
        command: ClientCommand,
    ) -> Result<Outbox, ApplicationError> {
        let identity = self.identity(connection_id).await?;
        match command {
            ClientCommand::JoinConversation { conversation_id } => {
                self.join(connection_id, &identity, conversation_id).await
            }
            ClientCommand::LeaveConversation { conversation_id } => {
                Ok(self.leave(connection_id, &identity, conversation_id).await)
            }
            ClientCommand::SendMessage {
                conversation_id,
                content,
                message_type,
                reply_to_message_id,
                attachment,
            } => {
                let draft = MessageDraft {
                    conversation_id,
                    sender_id: identity.id,
                    content,
                    message_type,
                    reply_to_message_id,
                    attachment,
                };
                let outcome = self
                    .dispatcher
                    .dispatch(&identity, SendOrigin::Connection(connection_id), draft)
                    .await?;
                Ok(outcome.outbox)
            }
            ClientCommand::TypingStart { conversation_id } => {
                self.typing_start(connection_id, &identity, conversation_id)
                    .await
            }
            ClientCommand::TypingStop { conversation_id } => {
                Ok(self.typing_stop(&identity, conversation_id).await)
            }
            ClientCommand::MessageRead { conversation_id } => {
                self.message_read(connection_id, &identity, conversation_id)
                    .await
            }
            ClientCommand::NotificationRead { notification_id } => {
                self.notification_read(&identity, notification_id).await
            }
        }
    }

    async fn identity(&self, connection_id: ConnectionId) -> Result<UserIdentity, ApplicationError> {
        self.state
            .lock()
            .await
            .presence
            .identity(connection_id)
            .cloned()
            .ok_or_else(|| ApplicationError::authentication("connection is not registered"))
    }

    async fn ensure_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<(), ApplicationError> {
        if self
            .conversations
            .is_active_participant(conversation_id, user_id)
            .await?
        {
            Ok(())
        } else {
            Err(ApplicationError::not_participant())
        }
    }

    async fn join(
        &self,
        connection_id: ConnectionId,
        identity: &UserIdentity,
        conversation_id: ConversationId,
    ) -> Result<Outbox, ApplicationError> {
        self.ensure_participant(conversation_id, identity.id).await?;

        let mut outbox = Outbox::new();
        let mut state = self.state.lock().await;
        if !state.presence.is_connected(connection_id) {
            return Ok(outbox);
        }
        if state.rooms.join(connection_id, conversation_id) {
            let event = ServerEvent::UserJoined {
                user_id: identity.id,
                user_name: identity.name.clone(),
                conversation_id,
            };
            outbox.push_all(state.rooms.members_except(conversation_id, connection_id), &event);
            tracing::debug!(
                connection_id = %connection_id,
                user_id = %identity.id,
                conversation_id = %conversation_id,
                "joined room"
            );
        }
        Ok(outbox)
    }

    async fn leave(
        &self,
        connection_id: ConnectionId,
        identity: &UserIdentity,
        conversation_id: ConversationId,
    ) -> Outbox {
        let mut outbox = Outbox::new();
        let mut state = self.state.lock().await;
        if state.rooms.leave(connection_id, conversation_id) {
            let event = ServerEvent::UserLeft {
                user_id: identity.id,
                user_name: identity.name.clone(),
                conversation_id,
            };
            outbox.push_all(state.rooms.members(conversation_id), &event);
        }
        outbox
    }

    async fn typing_start(
        &self,
        connection_id: ConnectionId,
        identity: &UserIdentity,
        conversation_id: ConversationId,
    ) -> Result<Outbox, ApplicationError> {
        self.ensure_participant(conversation_id, identity.id).await?;

        let mut outbox = Outbox::new();
        let mut state = self.state.lock().await;
        if !state.presence.is_connected(connection_id) {
            return Ok(outbox);
        }
        let generation = state.typing.start(conversation_id, identity.id);

        let gateway = self.clone();
        let user_id = identity.id;
        let timeout = self.settings.typing_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            gateway
                .expire_typing(conversation_id, user_id, generation)
                .await;
        });
        state
            .typing
            .arm(conversation_id, identity.id, generation, timer.abort_handle());

        let event = typing_event(identity, conversation_id, true);
        outbox.push_all(state.room_peers(conversation_id, identity.id), &event);
        Ok(outbox)
    }

    /// 停止输入可以来自用户的任意一条连接，事件不会发回该用户自己的连接
    async fn typing_stop(&self, identity: &UserIdentity, conversation_id: ConversationId) -> Outbox {
        let mut outbox = Outbox::new();
        let mut state = self.state.lock().await;
        if state.typing.stop(conversation_id, identity.id) {
            let event = typing_event(identity, conversation_id, false);
            outbox.push_all(state.room_peers(conversation_id, identity.id), &event);
        }
        outbox
    }

    /// 自动停止定时器到期
    ///
    /// 用户仍有在线连接时照常广播停止事件；用户已完全离线时只清理状态。
    async fn expire_typing(&self, conversation_id: ConversationId, user_id: UserId, generation: u64) {
        let mut outbox = Outbox::new();
        {
            let mut state = self.state.lock().await;
            if !state.typing.expire(conversation_id, user_id, generation) {
                return;
            }
            let Some(identity) = state.presence.identity_of_user(user_id).cloned() else {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    user_id = %user_id,
                    "typing expired after user went offline"
                );
                return;
            };
            let event = typing_event(&identity, conversation_id, false);
            outbox.push_all(state.room_peers(conversation_id, user_id), &event);
        }
        if !outbox.is_empty() {
            self.sink.deliver(outbox);
        }
    }

    async fn message_read(
        &self,
        connection_id: ConnectionId,
        identity: &UserIdentity,
        conversation_id: ConversationId,
    ) -> Result<Outbox, ApplicationError> {
        let slot = {
            let mut state = self.state.lock().await;
            state
                .read_throttle
                .try_acquire(identity.id, conversation_id, Instant::now())
        };
        let Some(slot) = slot else {
            tracing::trace!(
                user_id = %identity.id,
                conversation_id = %conversation_id,
                "read update throttled"
            );
            return Ok(Outbox::new());
        };

        let read_at = self.clock.now();
        if let Err(err) = self.record_read(identity.id, conversation_id, read_at).await {
            self.release_slot(slot).await;
            return Err(err);
        }

        let mut outbox = Outbox::new();
        let state = self.state.lock().await;
        let event = ServerEvent::MessageRead {
            user_id: identity.id,
            user_name: identity.name.clone(),
            conversation_id,
            read_at,
        };
        outbox.push_all(state.rooms.members_except(conversation_id, connection_id), &event);
        Ok(outbox)
    }

    async fn record_read(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
        read_at: domain::Timestamp,
    ) -> Result<(), ApplicationError> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.conversations
            .update_last_read(conversation_id, user_id, read_at)
            .await?;
        Ok(())
    }

    async fn release_slot(&self, slot: super::read_throttle::ThrottleSlot) {
        let mut state = self.state.lock().await;
        state.read_throttle.release(slot);
    }

    async fn notification_read(
        &self,
        identity: &UserIdentity,
        notification_id: NotificationId,
    ) -> Result<Outbox, ApplicationError> {
        self.notifications
            .mark_read(identity.id, notification_id)
            .await?;
        Ok(Outbox::new())
    }

    fn announce_presence(
        &self,
        outbox: &mut Outbox,
        audience: &[ConnectionId],
        user_id: UserId,
        status: PresenceStatus,
        online: Vec<UserId>,
    ) {
        let status_event = ServerEvent::UserStatusChanged {
            user_id,
            status,
            timestamp: self.clock.now(),
        };
        outbox.push_all(audience.iter().copied(), &status_event);
        outbox.push_all(audience.iter().copied(), &ServerEvent::OnlineUsers(online));
    }
}

fn typing_event(identity: &UserIdentity, conversation_id: ConversationId, is_typing: bool) -> ServerEvent {
    ServerEvent::UserTyping {
        user_id: identity.id,
        user_name: identity.name.clone(),
        conversation_id,
        is_typing,
    }
}
