use domain::{ConnectionId, ServerEvent};

/// 发往单个连接的事件
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub recipient: ConnectionId,
    pub event: ServerEvent,
}

/// 一次处理产生的全部待投递事件，按产生顺序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    envelopes: Vec<Envelope>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(recipient: ConnectionId, event: ServerEvent) -> Self {
        let mut outbox = Self::new();
        outbox.push(recipient, event);
        outbox
    }

    pub fn push(&mut self, recipient: ConnectionId, event: ServerEvent) {
        self.envelopes.push(Envelope { recipient, event });
    }

    /// 把同一事件发给多个连接
    pub fn push_all<I>(&mut self, recipients: I, event: &ServerEvent)
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        for recipient in recipients {
            self.push(recipient, event.clone());
        }
    }

    pub fn extend(&mut self, other: Outbox) {
        self.envelopes.extend(other.envelopes);
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter()
    }

    /// 某个连接将收到的事件
    pub fn events_for(&self, recipient: ConnectionId) -> Vec<&ServerEvent> {
        self.envelopes
            .iter()
            .filter(|e| e.recipient == recipient)
            .map(|e| &e.event)
            .collect()
    }
}

impl IntoIterator for Outbox {
    type Item = Envelope;
    type IntoIter = std::vec::IntoIter<Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.envelopes.into_iter()
    }
}

/// 投递出口
///
/// 定时器与 HTTP 请求产生的事件没有发起连接可以回写，经由此接口投递。
pub trait EventSink: Send + Sync {
    fn deliver(&self, outbox: Outbox);
}
