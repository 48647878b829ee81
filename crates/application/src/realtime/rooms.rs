use std::collections::{HashMap, HashSet};

use domain::{ConnectionId, ConversationId};

/// 房间成员表
///
/// 同时维护 连接 -> 房间 与 房间 -> 连接 两个方向的索引，二者始终一致。
#[derive(Debug, Default)]
pub struct RoomTracker {
    by_connection: HashMap<ConnectionId, HashSet<ConversationId>>,
    by_room: HashMap<ConversationId, HashSet<ConnectionId>>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入房间，已加入时返回 `false`
    pub fn join(&mut self, connection_id: ConnectionId, conversation_id: ConversationId) -> bool {
        let added = self
            .by_connection
            .entry(connection_id)
            .or_default()
            .insert(conversation_id);
        if added {
            self.by_room
                .entry(conversation_id)
                .or_default()
                .insert(connection_id);
        }
        added
    }

    /// 离开房间，未加入时返回 `false`
    pub fn leave(&mut self, connection_id: ConnectionId, conversation_id: ConversationId) -> bool {
        let removed = match self.by_connection.get_mut(&connection_id) {
            Some(rooms) => {
                let removed = rooms.remove(&conversation_id);
                if rooms.is_empty() {
                    self.by_connection.remove(&connection_id);
                }
                removed
            }
            None => false,
        };
        if removed {
            self.remove_from_room(conversation_id, connection_id);
        }
        removed
    }

    pub fn is_joined(&self, connection_id: ConnectionId, conversation_id: ConversationId) -> bool {
        self.by_connection
            .get(&connection_id)
            .is_some_and(|rooms| rooms.contains(&conversation_id))
    }

    /// 房间内的连接，按标识排序
    pub fn members(&self, conversation_id: ConversationId) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .by_room
            .get(&conversation_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn members_except(
        &self,
        conversation_id: ConversationId,
        excluded: ConnectionId,
    ) -> Vec<ConnectionId> {
        let mut members = self.members(conversation_id);
        members.retain(|c| *c != excluded);
        members
    }

    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<ConversationId> {
        let mut rooms: Vec<ConversationId> = self
            .by_connection
            .get(&connection_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// 连接断开时清理其全部房间，返回离开的房间
    pub fn drop_connection(&mut self, connection_id: ConnectionId) -> Vec<ConversationId> {
        let rooms: Vec<ConversationId> = self
            .by_connection
            .remove(&connection_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for conversation_id in &rooms {
            self.remove_from_room(*conversation_id, connection_id);
        }
        rooms
    }

    fn remove_from_room(&mut self, conversation_id: ConversationId, connection_id: ConnectionId) {
        if let Some(members) = self.by_room.get_mut(&conversation_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.by_room.remove(&conversation_id);
            }
        }
    }
}
