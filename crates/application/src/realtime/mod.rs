//! 实时会话核心
//!
//! 在线状态、房间成员、正在输入、已读节流四张进程内状态表，
//! 以及消息投递与命令路由。所有处理器都返回一组待投递的事件，
//! 传输层负责把事件写到具体连接上。

pub mod dispatcher;
pub mod gateway;
pub mod outbox;
pub mod presence;
pub mod read_throttle;
pub mod rooms;
pub mod state;
pub mod typing;

pub use dispatcher::{DeliveryDispatcher, DispatchOutcome, SendOrigin};
pub use gateway::{RealtimeGateway, RealtimeSettings};
pub use outbox::{Envelope, EventSink, Outbox};
pub use presence::{PresenceChange, PresenceRegistry};
pub use read_throttle::{ReadThrottle, ThrottleSlot};
pub use rooms::RoomTracker;
pub use state::{RealtimeState, SharedRealtimeState};
pub use typing::TypingCoordinator;
