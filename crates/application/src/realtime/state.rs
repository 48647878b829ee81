use std::sync::Arc;

use domain::{ConnectionId, ConversationId, UserId};
use tokio::sync::Mutex;
use tokio::time::Duration;

use super::presence::PresenceRegistry;
use super::read_throttle::ReadThrottle;
use super::rooms::RoomTracker;
use super::typing::TypingCoordinator;

/// 进程级实时状态
///
/// 进程启动时为空，随进程退出而丢弃。锁只在同步的读写之间持有，
/// 不跨越任何存储调用。
#[derive(Debug)]
pub struct RealtimeState {
    pub presence: PresenceRegistry,
    pub rooms: RoomTracker,
    pub typing: TypingCoordinator,
    pub read_throttle: ReadThrottle,
}

impl RealtimeState {
    pub fn new(read_throttle_window: Duration) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            rooms: RoomTracker::new(),
            typing: TypingCoordinator::new(),
            read_throttle: ReadThrottle::new(read_throttle_window),
        }
    }

    pub fn shared(read_throttle_window: Duration) -> SharedRealtimeState {
        Arc::new(Mutex::new(Self::new(read_throttle_window)))
    }

    /// 房间内不属于该用户的连接
    pub fn room_peers(&self, conversation_id: ConversationId, user_id: UserId) -> Vec<ConnectionId> {
        let own = self.presence.connections_of(user_id);
        self.rooms
            .members(conversation_id)
            .into_iter()
            .filter(|connection_id| !own.contains(connection_id))
            .collect()
    }
}

pub type SharedRealtimeState = Arc<Mutex<RealtimeState>>;
