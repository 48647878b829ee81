//! 内存仓储实现
//!
//! 用于开发环境和测试，语义与 Postgres 实现保持一致。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Conversation, ConversationId, ConversationRepository, DomainError, DomainResult, Message,
    MessageCursor, MessageId, MessageRepository, Notification, NotificationFilter,
    NotificationId, NotificationRepository, NotificationStats, PaginatedResult, Pagination,
    Participant, ParticipantRole, Timestamp, UserDirectory, UserId, UserIdentity,
};
use tokio::sync::RwLock;

fn paginate<T>(items: Vec<T>, pagination: Pagination) -> PaginatedResult<T> {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(pagination.offset as usize)
        .take(pagination.limit as usize)
        .collect();
    PaginatedResult::new(page, total, pagination)
}

/// 内存用户目录
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserIdentity>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserIdentity) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> DomainResult<Option<UserIdentity>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

/// 内存会话仓储
#[derive(Clone, Default)]
pub struct InMemoryConversationRepository {
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn direct_pair(conversation: &Conversation) -> Option<(UserId, UserId)> {
        if !conversation.is_direct() {
            return None;
        }
        let mut ids: Vec<UserId> = conversation.participants.iter().map(|p| p.user_id).collect();
        ids.sort();
        match ids.as_slice() {
            [a, b] => Some((*a, *b)),
            _ => None,
        }
    }

    fn not_found(id: ConversationId) -> DomainError {
        DomainError::resource_not_found("conversation", id)
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, conversation: &Conversation) -> DomainResult<Conversation> {
        let mut conversations = self.conversations.write().await;
        if conversations.contains_key(&conversation.id) {
            return Err(DomainError::resource_already_exists(
                "conversation",
                conversation.id.to_string(),
            ));
        }
        if let Some(pair) = Self::direct_pair(conversation) {
            let duplicate = conversations
                .values()
                .any(|c| c.is_active && Self::direct_pair(c) == Some(pair));
            if duplicate {
                return Err(DomainError::resource_already_exists(
                    "direct conversation",
                    format!("{}:{}", pair.0, pair.1),
                ));
            }
        }
        conversations.insert(conversation.id, conversation.clone());
        Ok(conversation.clone())
    }

    async fn find_by_id(&self, id: ConversationId) -> DomainResult<Option<Conversation>> {
        Ok(self.conversations.read().await.get(&id).cloned())
    }

    async fn find_direct_between(
        &self,
        a: UserId,
        b: UserId,
    ) -> DomainResult<Option<Conversation>> {
        let pair = if a <= b { (a, b) } else { (b, a) };
        let conversations = self.conversations.read().await;
        Ok(conversations
            .values()
            .find(|c| c.is_active && Self::direct_pair(c) == Some(pair))
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> DomainResult<PaginatedResult<Conversation>> {
        let conversations = self.conversations.read().await;
        let mut visible: Vec<Conversation> = conversations
            .values()
            .filter(|c| c.is_active && c.is_active_participant(user_id))
            .cloned()
            .collect();
        visible.sort_by(|x, y| {
            let x_key = x.last_message_at.unwrap_or(x.created_at);
            let y_key = y.last_message_at.unwrap_or(y.created_at);
            y_key.cmp(&x_key).then_with(|| y.id.cmp(&x.id))
        });
        Ok(paginate(visible, pagination))
    }

    async fn find_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DomainResult<Option<Participant>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(&conversation_id)
            .and_then(|c| c.participant(user_id))
            .cloned())
    }

    async fn is_active_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DomainResult<bool> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(&conversation_id)
            .is_some_and(|c| c.is_active && c.is_active_participant(user_id)))
    }

    async fn add_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
        now: Timestamp,
    ) -> DomainResult<Participant> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| Self::not_found(conversation_id))?;
        conversation.updated_at = now;
        if let Some(existing) = conversation
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
        {
            existing.role = role;
            existing.joined_at = now;
            existing.left_at = None;
            existing.is_active = true;
            return Ok(existing.clone());
        }
        let participant = Participant::new(conversation_id, user_id, role, now);
        conversation.participants.push(participant.clone());
        Ok(participant)
    }

    async fn remove_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        now: Timestamp,
    ) -> DomainResult<bool> {
        let mut conversations = self.conversations.write().await;
        let Some(conversation) = conversations.get_mut(&conversation_id) else {
            return Ok(false);
        };
        match conversation
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id && p.is_active)
        {
            Some(participant) => {
                participant.is_active = false;
                participant.left_at = Some(now);
                conversation.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_last_read(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        read_at: Timestamp,
    ) -> DomainResult<bool> {
        let mut conversations = self.conversations.write().await;
        let participant = conversations
            .get_mut(&conversation_id)
            .and_then(|c| c.participants.iter_mut().find(|p| p.user_id == user_id));
        match participant {
            Some(participant) => {
                participant.last_read_at = Some(read_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_title(
        &self,
        conversation_id: ConversationId,
        title: Option<String>,
        now: Timestamp,
    ) -> DomainResult<bool> {
        let mut conversations = self.conversations.write().await;
        match conversations.get_mut(&conversation_id) {
            Some(conversation) => {
                conversation.title = title;
                conversation.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_last_message(
        &self,
        conversation_id: ConversationId,
        at: Timestamp,
    ) -> DomainResult<()> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| Self::not_found(conversation_id))?;
        conversation.last_message_at = Some(at);
        conversation.updated_at = at;
        Ok(())
    }

    async fn deactivate(
        &self,
        conversation_id: ConversationId,
        now: Timestamp,
    ) -> DomainResult<bool> {
        let mut conversations = self.conversations.write().await;
        match conversations.get_mut(&conversation_id) {
            Some(conversation) if conversation.is_active => {
                conversation.is_active = false;
                conversation.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// 内存消息仓储
#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    messages: Arc<RwLock<HashMap<MessageId, Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的消息总数（含软删除）
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    async fn unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> Vec<Message> {
        let messages = self.messages.read().await;
        let mut unread: Vec<Message> = messages
            .values()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && !m.is_deleted
                    && m.sender_id != reader
                    && after.map_or(true, |at| m.created_at > at)
            })
            .cloned()
            .collect();
        unread.sort_by_key(Message::order_key);
        unread
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: &Message) -> DomainResult<Message> {
        let mut messages = self.messages.write().await;
        if messages.contains_key(&message.id) {
            return Err(DomainError::resource_already_exists(
                "message",
                message.id.to_string(),
            ));
        }
        messages.insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<Message>> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        pagination: Pagination,
        before: Option<MessageCursor>,
    ) -> DomainResult<PaginatedResult<Message>> {
        let messages = self.messages.read().await;
        let mut visible: Vec<Message> = messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted)
            .filter(|m| before.map_or(true, |c| m.order_key() < (c.created_at, c.id)))
            .cloned()
            .collect();
        visible.sort_by_key(|m| std::cmp::Reverse(m.order_key()));
        let mut result = paginate(visible, pagination);
        result.items.reverse();
        Ok(result)
    }

    async fn search(
        &self,
        conversation_id: ConversationId,
        query: &str,
        pagination: Pagination,
    ) -> DomainResult<PaginatedResult<Message>> {
        let needle = query.to_lowercase();
        let messages = self.messages.read().await;
        let mut hits: Vec<Message> = messages
            .values()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && !m.is_deleted
                    && m.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by_key(|m| std::cmp::Reverse(m.order_key()));
        Ok(paginate(hits, pagination))
    }

    async fn latest(&self, conversation_id: ConversationId) -> DomainResult<Option<Message>> {
        let messages = self.messages.read().await;
        Ok(messages
            .values()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted)
            .max_by_key(|m| m.order_key())
            .cloned())
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
        now: Timestamp,
    ) -> DomainResult<Option<Message>> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&id) {
            Some(message) if !message.is_deleted => {
                message.content = content.to_string();
                message.is_edited = true;
                message.updated_at = now;
                Ok(Some(message.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn soft_delete(&self, id: MessageId, now: Timestamp) -> DomainResult<bool> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&id) {
            Some(message) if !message.is_deleted => {
                message.is_deleted = true;
                message.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn hard_delete(&self, id: MessageId) -> DomainResult<bool> {
        Ok(self.messages.write().await.remove(&id).is_some())
    }

    async fn count_unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> DomainResult<u64> {
        Ok(self.unread(conversation_id, reader, after).await.len() as u64)
    }

    async fn list_unread(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        after: Option<Timestamp>,
    ) -> DomainResult<Vec<Message>> {
        Ok(self.unread(conversation_id, reader, after).await)
    }
}

/// 内存通知仓储
#[derive(Clone, Default)]
pub struct InMemoryNotificationRepository {
    notifications: Arc<RwLock<HashMap<NotificationId, Notification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部通知，按创建时间升序
    pub async fn all(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> =
            self.notifications.read().await.values().cloned().collect();
        all.sort_by_key(|n| (n.created_at, n.id));
        all
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, notification: &Notification) -> DomainResult<Notification> {
        let mut notifications = self.notifications.write().await;
        if notifications.contains_key(&notification.id) {
            return Err(DomainError::resource_already_exists(
                "notification",
                notification.id.to_string(),
            ));
        }
        notifications.insert(notification.id, notification.clone());
        Ok(notification.clone())
    }

    async fn create_many(&self, batch: &[Notification]) -> DomainResult<Vec<Notification>> {
        let mut notifications = self.notifications.write().await;
        if let Some(existing) = batch.iter().find(|n| notifications.contains_key(&n.id)) {
            return Err(DomainError::resource_already_exists(
                "notification",
                existing.id.to_string(),
            ));
        }
        for notification in batch {
            notifications.insert(notification.id, notification.clone());
        }
        Ok(batch.to_vec())
    }

    async fn find_by_id(&self, id: NotificationId) -> DomainResult<Option<Notification>> {
        Ok(self.notifications.read().await.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        pagination: Pagination,
        now: Timestamp,
    ) -> DomainResult<PaginatedResult<Notification>> {
        let notifications = self.notifications.read().await;
        let mut visible: Vec<Notification> = notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_expired(now) && filter.matches(n))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(paginate(visible, pagination))
    }

    async fn count_unread(&self, user_id: UserId, now: Timestamp) -> DomainResult<u64> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read && !n.is_expired(now))
            .count() as u64)
    }

    async fn list_unread(
        &self,
        user_id: UserId,
        limit: u32,
        now: Timestamp,
    ) -> DomainResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut unread: Vec<Notification> = notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read && !n.is_expired(now))
            .cloned()
            .collect();
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        unread.truncate(limit as usize);
        Ok(unread)
    }

    async fn stats(&self, user_id: UserId, now: Timestamp) -> DomainResult<NotificationStats> {
        let notifications = self.notifications.read().await;
        Ok(NotificationStats::tally(
            notifications
                .values()
                .filter(|n| n.user_id == user_id && !n.is_expired(now)),
        ))
    }

    async fn mark_read(&self, id: NotificationId, at: Timestamp) -> DomainResult<bool> {
        let mut notifications = self.notifications.write().await;
        match notifications.get_mut(&id) {
            Some(notification) => {
                if !notification.is_read {
                    notification.is_read = true;
                    notification.read_at = Some(at);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: UserId, at: Timestamp) -> DomainResult<u64> {
        let mut notifications = self.notifications.write().await;
        let mut affected = 0;
        for notification in notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            notification.read_at = Some(at);
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete(&self, id: NotificationId) -> DomainResult<bool> {
        Ok(self.notifications.write().await.remove(&id).is_some())
    }

    async fn delete_read(&self, user_id: UserId) -> DomainResult<u64> {
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|_, n| !(n.user_id == user_id && n.is_read));
        Ok((before - notifications.len()) as u64)
    }

    async fn delete_expired(&self, now: Timestamp) -> DomainResult<u64> {
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|_, n| !n.is_expired(now));
        Ok((before - notifications.len()) as u64)
    }
}
