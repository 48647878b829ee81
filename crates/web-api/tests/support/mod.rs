#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use application::{RealtimeSettings, SystemClock};
use config::JwtConfig;
use domain::{UserId, UserIdentity, UserRole};
use futures_util::StreamExt;
use infrastructure::{InMemoryUserDirectory, Storage};
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState, JwtService};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const JWT_SECRET: &str = "integration-test-secret-with-32-plus-chars";

/// 在随机端口上启动的完整服务，使用内存存储
pub struct TestServer {
    pub base_http: String,
    pub base_ws: String,
    pub jwt: JwtService,
    pub alice: UserIdentity,
    pub bob: UserIdentity,
    pub carol: UserIdentity,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let users = InMemoryUserDirectory::new();
        let alice = UserIdentity::new(UserId::generate(), "Alice", UserRole::Customer);
        let bob = UserIdentity::new(UserId::generate(), "Bob", UserRole::Tasker);
        let carol = UserIdentity::new(UserId::generate(), "Carol", UserRole::Admin);
        for user in [&alice, &bob, &carol] {
            users.insert(user.clone()).await;
        }

        let jwt_config = JwtConfig {
            secret: JWT_SECRET.into(),
            expiration_hours: 1,
        };
        let state = AppState::new(
            Storage::in_memory(users),
            jwt_config.clone(),
            RealtimeSettings::default(),
            Arc::new(SystemClock),
        );
        let app = router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            base_http: format!("http://{addr}"),
            base_ws: format!("ws://{addr}/ws"),
            jwt: JwtService::new(jwt_config),
            alice,
            bob,
            carol,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn token(&self, user: &UserIdentity) -> String {
        self.jwt.generate_token(user.id, user.role).expect("token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_http, path)
    }

    pub async fn connect(&self, user: &UserIdentity) -> WsClient {
        let url = format!("{}?token={}", self.base_ws, self.token(user));
        let (socket, _) = connect_async(url).await.expect("websocket connect");
        socket
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// 读取下一条指定名称的事件，跳过其他事件
pub async fn next_event(socket: &mut WsClient, name: &str) -> Value {
    timeout(Duration::from_secs(5), async {
        loop {
            let frame = socket
                .next()
                .await
                .expect("socket closed")
                .expect("socket error");
            if let TungsteniteMessage::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).expect("json frame");
                if value["event"] == name {
                    return value["data"].clone();
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}
