//! Repository实现模块
//!
//! 包含所有数据访问层的 Postgres 实现

pub mod conversation_repository_impl;
pub mod message_repository_impl;
pub mod notification_repository_impl;
pub mod user_repository_impl;

// 重新导出所有Repository实现
pub use conversation_repository_impl::PgConversationRepository;
pub use message_repository_impl::PgMessageRepository;
pub use notification_repository_impl::PgNotificationRepository;
pub use user_repository_impl::PgUserDirectory;
