use std::collections::{HashMap, HashSet};

use domain::{ConnectionId, UserId, UserIdentity};

/// 注册或注销连接引起的在线状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// 用户的第一条连接
    CameOnline,
    /// 用户的最后一条连接断开
    WentOffline,
    /// 连接数变化但在线状态不变
    Unchanged,
}

/// 在线状态登记表
///
/// 用户在线当且仅当其连接集合非空。集合在第一条连接时创建，
/// 最后一条连接移除时删除。
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: HashMap<UserId, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, UserIdentity>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, identity: UserIdentity, connection_id: ConnectionId) -> PresenceChange {
        let user_id = identity.id;
        self.connections.insert(connection_id, identity);
        let set = self.users.entry(user_id).or_default();
        let first = set.is_empty();
        set.insert(connection_id);
        if first {
            PresenceChange::CameOnline
        } else {
            PresenceChange::Unchanged
        }
    }

    /// 注销连接，返回连接绑定的身份；未知连接返回 `None`
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<(UserIdentity, PresenceChange)> {
        let identity = self.connections.remove(&connection_id)?;
        let mut change = PresenceChange::Unchanged;
        if let Some(set) = self.users.get_mut(&identity.id) {
            set.remove(&connection_id);
            if set.is_empty() {
                self.users.remove(&identity.id);
                change = PresenceChange::WentOffline;
            }
        }
        Some((identity, change))
    }

    /// 当前在线用户，按标识排序
    pub fn list_online(&self) -> Vec<UserId> {
        let mut online: Vec<UserId> = self.users.keys().copied().collect();
        online.sort();
        online
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn identity(&self, connection_id: ConnectionId) -> Option<&UserIdentity> {
        self.connections.get(&connection_id)
    }

    /// 用户任一在线连接上绑定的身份
    pub fn identity_of_user(&self, user_id: UserId) -> Option<&UserIdentity> {
        self.users
            .get(&user_id)
            .and_then(|set| set.iter().find_map(|c| self.connections.get(c)))
    }

    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn connections_of(&self, user_id: UserId) -> Vec<ConnectionId> {
        let mut connections: Vec<ConnectionId> = self
            .users
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        connections.sort();
        connections
    }

    pub fn all_connections(&self) -> Vec<ConnectionId> {
        let mut connections: Vec<ConnectionId> = self.connections.keys().copied().collect();
        connections.sort();
        connections
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
