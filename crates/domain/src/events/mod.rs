//! 实时事件定义
//!
//! 连接上双向传输的事件，均编码为 `{"event": "<name>", "data": <payload>}` 形式的 JSON 文本帧。

pub mod realtime;

// 重新导出事件类型
pub use realtime::*;
