use std::collections::HashMap;

use domain::{ConversationId, UserId};
use tokio::task::AbortHandle;

#[derive(Debug)]
struct TypingEntry {
    generation: u64,
    timer: Option<AbortHandle>,
}

/// 正在输入状态表
///
/// 每次 `start` 都会取消旧的自动停止定时器并分配新的代号，
/// 定时器到期时只有代号仍然匹配才会清除状态，旧定时器不会误清除。
/// 状态按用户记录，与发起输入的是哪条连接无关。
#[derive(Debug, Default)]
pub struct TypingCoordinator {
    typing: HashMap<ConversationId, HashMap<UserId, TypingEntry>>,
    next_generation: u64,
}

impl TypingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记用户正在输入，返回本轮的代号
    pub fn start(&mut self, conversation_id: ConversationId, user_id: UserId) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        let previous = self.typing.entry(conversation_id).or_default().insert(
            user_id,
            TypingEntry {
                generation,
                timer: None,
            },
        );
        if let Some(timer) = previous.and_then(|entry| entry.timer) {
            timer.abort();
        }
        generation
    }

    /// 绑定自动停止定时器；代号已过期时直接取消定时器
    pub fn arm(
        &mut self,
        conversation_id: ConversationId,
        user_id: UserId,
        generation: u64,
        timer: AbortHandle,
    ) {
        match self
            .typing
            .get_mut(&conversation_id)
            .and_then(|users| users.get_mut(&user_id))
        {
            Some(entry) if entry.generation == generation => entry.timer = Some(timer),
            _ => timer.abort(),
        }
    }

    /// 显式停止，用户不在输入状态时返回 `false`
    pub fn stop(&mut self, conversation_id: ConversationId, user_id: UserId) -> bool {
        match self.remove(conversation_id, user_id) {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// 定时器到期。代号匹配时清除状态并返回 `true`
    pub fn expire(&mut self, conversation_id: ConversationId, user_id: UserId, generation: u64) -> bool {
        let current = self
            .typing
            .get(&conversation_id)
            .and_then(|users| users.get(&user_id))
            .map(|entry| entry.generation);
        if current != Some(generation) {
            return false;
        }
        self.remove(conversation_id, user_id).is_some()
    }

    pub fn is_typing(&self, conversation_id: ConversationId, user_id: UserId) -> bool {
        self.typing
            .get(&conversation_id)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    pub fn typing_users(&self, conversation_id: ConversationId) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .typing
            .get(&conversation_id)
            .map(|users| users.keys().copied().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    fn remove(&mut self, conversation_id: ConversationId, user_id: UserId) -> Option<TypingEntry> {
        let users = self.typing.get_mut(&conversation_id)?;
        let entry = users.remove(&user_id);
        if users.is_empty() {
            self.typing.remove(&conversation_id);
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_generation_does_not_expire() {
        let mut typing = TypingCoordinator::new();
        let conv = ConversationId::generate();
        let user = UserId::generate();

        let first = typing.start(conv, user);
        let second = typing.start(conv, user);
        assert_ne!(first, second);

        assert!(!typing.expire(conv, user, first));
        assert!(typing.is_typing(conv, user));
        assert!(typing.expire(conv, user, second));
        assert!(!typing.is_typing(conv, user));
        assert!(typing.typing_users(conv).is_empty());
    }

    #[test]
    fn stop_only_reports_active_typing() {
        let mut typing = TypingCoordinator::new();
        let conv = ConversationId::generate();
        let user = UserId::generate();

        assert!(!typing.stop(conv, user));
        let generation = typing.start(conv, user);
        assert!(typing.stop(conv, user));
        assert!(!typing.stop(conv, user));
        assert!(!typing.expire(conv, user, generation));
    }

    #[test]
    fn empty_conversation_entry_is_removed() {
        let mut typing = TypingCoordinator::new();
        let conv = ConversationId::generate();
        let a = UserId::generate();
        let b = UserId::generate();
        typing.start(conv, a);
        typing.start(conv, b);
        typing.stop(conv, a);
        assert_eq!(typing.typing_users(conv), vec![b]);
        typing.stop(conv, b);
        assert!(typing.typing.is_empty());
    }

    #[tokio::test]
    async fn restart_aborts_previous_timer() {
        let mut typing = TypingCoordinator::new();
        let conv = ConversationId::generate();
        let user = UserId::generate();

        let generation = typing.start(conv, user);
        let timer = tokio::spawn(std::future::pending::<()>());
        typing.arm(conv, user, generation, timer.abort_handle());
        typing.start(conv, user);

        assert!(timer.await.unwrap_err().is_cancelled());
    }
}
