//! 基础设施层实现。
//!
//! 提供 Postgres 仓储与内存仓储两套实现，分别用于生产与开发/测试，
//! 实现领域层定义的数据访问接口。

pub mod builder;
pub mod db;
pub mod memory;
pub mod migrations;

pub use builder::{InfrastructureConfig, InfrastructureError, Storage};
pub use db::repositories::{
    PgConversationRepository, PgMessageRepository, PgNotificationRepository, PgUserDirectory,
};
pub use db::{Db, DbPool};
pub use memory::{
    InMemoryConversationRepository, InMemoryMessageRepository, InMemoryNotificationRepository,
    InMemoryUserDirectory,
};
pub use migrations::MIGRATOR;
