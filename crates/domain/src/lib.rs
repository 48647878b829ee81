//! 实时会话系统核心领域模型
//!
//! 包含用户身份、会话、消息、通知等核心实体，实时事件定义，以及数据访问接口。

pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use repositories::*;
pub use value_objects::*;
