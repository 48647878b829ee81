//! 应用层实现。
//!
//! 实时会话核心（在线状态、房间、正在输入、已读节流、消息投递）、
//! 连接握手，以及面向请求/响应接口的会话、消息、通知用例服务。

pub mod clock;
pub mod error;
pub mod handshake;
pub mod realtime;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use handshake::{CredentialVerifier, Handshake, VerifiedCredential};
pub use realtime::{
    DeliveryDispatcher, DispatchOutcome, Envelope, EventSink, Outbox, RealtimeGateway,
    RealtimeSettings, RealtimeState, SendOrigin, SharedRealtimeState,
};
pub use services::{
    ConversationService, ConversationServiceDependencies, ConversationSummary,
    CreateConversationRequest, CreatedConversation, MessageService, MessageServiceDependencies,
    NotificationService, NotificationServiceDependencies, SendMessageRequest,
};
