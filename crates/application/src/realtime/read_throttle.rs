use std::collections::HashMap;

use domain::{ConversationId, UserId};
use tokio::time::{Duration, Instant};

/// 已被占用的节流名额，授权失败时归还
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSlot {
    user_id: UserId,
    conversation_id: ConversationId,
    acquired_at: Instant,
    previous: Option<Instant>,
}

/// 已读位置更新节流
///
/// 同一 (用户, 会话) 在窗口期内只接受一次更新，其余调用静默忽略。
#[derive(Debug)]
pub struct ReadThrottle {
    window: Duration,
    accepted: HashMap<(UserId, ConversationId), Instant>,
}

impl ReadThrottle {
    const PRUNE_THRESHOLD: usize = 4096;

    pub fn new(window: Duration) -> Self {
        Self {
            window,
            accepted: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 尝试占用名额；窗口期内已接受过则返回 `None`
    pub fn try_acquire(
        &mut self,
        user_id: UserId,
        conversation_id: ConversationId,
        now: Instant,
    ) -> Option<ThrottleSlot> {
        if self.accepted.len() >= Self::PRUNE_THRESHOLD {
            self.prune(now);
        }

        let key = (user_id, conversation_id);
        let previous = self.accepted.get(&key).copied();
        if previous.is_some_and(|last| now.duration_since(last) < self.window) {
            return None;
        }
        self.accepted.insert(key, now);
        Some(ThrottleSlot {
            user_id,
            conversation_id,
            acquired_at: now,
            previous,
        })
    }

    /// 归还名额，恢复占用前的记录
    pub fn release(&mut self, slot: ThrottleSlot) {
        let key = (slot.user_id, slot.conversation_id);
        if self.accepted.get(&key) != Some(&slot.acquired_at) {
            return;
        }
        match slot.previous {
            Some(previous) => {
                self.accepted.insert(key, previous);
            }
            None => {
                self.accepted.remove(&key);
            }
        }
    }

    /// 清除已过窗口期的记录
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.accepted
            .retain(|_, last| now.duration_since(*last) < window);
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_call_inside_window_is_ignored() {
        let mut throttle = ReadThrottle::new(Duration::from_secs(5));
        let user = UserId::generate();
        let conv = ConversationId::generate();
        let start = Instant::now();

        assert!(throttle.try_acquire(user, conv, start).is_some());
        assert!(throttle
            .try_acquire(user, conv, start + Duration::from_millis(4_999))
            .is_none());
        assert!(throttle
            .try_acquire(user, conv, start + Duration::from_secs(5))
            .is_some());
    }

    #[test]
    fn pairs_are_independent() {
        let mut throttle = ReadThrottle::new(Duration::from_secs(5));
        let user = UserId::generate();
        let now = Instant::now();
        assert!(throttle
            .try_acquire(user, ConversationId::generate(), now)
            .is_some());
        assert!(throttle
            .try_acquire(user, ConversationId::generate(), now)
            .is_some());
        assert!(throttle
            .try_acquire(UserId::generate(), ConversationId::generate(), now)
            .is_some());
    }

    #[test]
    fn released_slot_can_be_taken_again() {
        let mut throttle = ReadThrottle::new(Duration::from_secs(5));
        let user = UserId::generate();
        let conv = ConversationId::generate();
        let now = Instant::now();

        let slot = throttle.try_acquire(user, conv, now).unwrap();
        throttle.release(slot);
        assert!(throttle.is_empty());
        assert!(throttle.try_acquire(user, conv, now).is_some());
    }

    #[test]
    fn prune_drops_stale_entries() {
        let mut throttle = ReadThrottle::new(Duration::from_secs(5));
        let now = Instant::now();
        throttle.try_acquire(UserId::generate(), ConversationId::generate(), now);
        throttle.prune(now + Duration::from_secs(6));
        assert_eq!(throttle.len(), 0);
    }
}
