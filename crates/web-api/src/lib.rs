//! Web API 层。
//!
//! 提供 Axum 路由与 WebSocket 传输，将请求委托给应用层的实时网关与用例服务。

mod auth;
mod dto;
mod error;
mod hub;
mod routes;
mod state;
mod websocket;

pub use auth::{AuthUser, Claims, JwtService};
pub use error::ApiError;
pub use hub::ConnectionHub;
pub use routes::router;
pub use state::AppState;
