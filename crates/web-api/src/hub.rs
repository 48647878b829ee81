//! 连接投递中心
//!
//! 每个 WebSocket 连接在这里登记一个发送通道；实时层产生的 Outbox
//! 按收件连接分发到对应通道，由连接自己的写任务发送出去。

use std::collections::HashMap;
use std::sync::RwLock;

use application::{EventSink, Outbox};
use domain::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct ConnectionHub {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记连接，返回该连接的事件接收端
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(connection_id, tx);
        rx
    }

    pub fn unregister(&self, connection_id: ConnectionId) {
        self.senders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.senders.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl EventSink for ConnectionHub {
    fn deliver(&self, outbox: Outbox) {
        if outbox.is_empty() {
            return;
        }
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        for envelope in outbox {
            match senders.get(&envelope.recipient) {
                Some(tx) => {
                    if tx.send(envelope.event).is_err() {
                        tracing::debug!(connection_id = %envelope.recipient, "connection closed before delivery");
                    }
                }
                None => {
                    tracing::debug!(connection_id = %envelope.recipient, "dropping event for unknown connection");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_only_their_recipient() {
        let hub = ConnectionHub::new();
        let (a, b) = (ConnectionId::generate(), ConnectionId::generate());
        let mut rx_a = hub.register(a);
        let mut rx_b = hub.register(b);

        hub.deliver(Outbox::single(a, ServerEvent::error("boom")));

        assert_eq!(rx_a.recv().await, Some(ServerEvent::error("boom")));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregistered_connections_are_skipped() {
        let hub = ConnectionHub::new();
        let a = ConnectionId::generate();
        let rx = hub.register(a);
        hub.unregister(a);
        drop(rx);

        hub.deliver(Outbox::single(a, ServerEvent::error("late")));
        assert_eq!(hub.connection_count(), 0);
    }
}
