//! WebSocket 传输
//!
//! 握手阶段完成身份校验，失败时直接拒绝升级。连接建立后：
//! - 读任务把文本帧解析为 `ClientCommand` 交给实时网关
//! - 写任务把投递中心转来的事件序列化为文本帧
//! - 任一任务结束即视为断开，执行清理

use std::panic::AssertUnwindSafe;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use domain::{ClientCommand, ConnectionId, ServerEvent, UserIdentity};
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use application::{EventSink, Outbox};

use crate::{auth::bearer_token, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// 凭证来源：先取查询参数 `token`，再取 `Authorization: Bearer` 头
fn credential<'a>(query: &'a WsQuery, headers: &'a HeaderMap) -> Option<&'a str> {
    query
        .token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| bearer_token(headers))
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let identity = match state
        .handshake
        .authenticate(credential(&query, &headers))
        .await
    {
        Ok(identity) => identity,
        Err(err) => {
            tracing::info!(error = %err, "websocket handshake rejected");
            return Err(err.into());
        }
    };

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, identity)))
}

/// 写任务命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Vec<u8>),
}

/// 先登记投递通道，再让连接对实时网关可见
async fn open_connection(
    state: &AppState,
    identity: UserIdentity,
) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
    let connection_id = ConnectionId::generate();
    let events = state.hub.register(connection_id);
    let outbox = state.gateway.connect(connection_id, identity).await;
    state.hub.deliver(outbox);
    (connection_id, events)
}

async fn run_connection(socket: WebSocket, state: AppState, identity: UserIdentity) {
    let user_id = identity.id;
    let (connection_id, mut events) = open_connection(&state, identity).await;
    tracing::info!(user_id = %user_id, connection_id = %connection_id, "websocket connected");

    let (mut sender, mut incoming) = socket.split();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize websocket event");
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        WsCommand::SendPong(data) => {
                            if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                else => break,
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => {
                    let outbox = handle_text(&recv_state, connection_id, text.as_str()).await;
                    recv_state.hub.deliver(outbox);
                }
                WsMessage::Binary(_) => {
                    let outbox = recv_state
                        .gateway
                        .reject_frame(connection_id, "binary frames are not supported");
                    recv_state.hub.deliver(outbox);
                }
                WsMessage::Ping(data) => {
                    if cmd_tx.send(WsCommand::SendPong(data.to_vec())).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => {}
                WsMessage::Close(_) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister(connection_id);
    let outbox = state.gateway.disconnect(connection_id).await;
    state.hub.deliver(outbox);
    tracing::info!(user_id = %user_id, connection_id = %connection_id, "websocket disconnected");
}

/// 处理一帧文本；处理过程中的 panic 被转换为通用错误事件
async fn handle_text(state: &AppState, connection_id: ConnectionId, text: &str) -> Outbox {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            return state
                .gateway
                .reject_frame(connection_id, &err.to_string());
        }
    };

    let name = command.name();
    match AssertUnwindSafe(state.gateway.handle(connection_id, command))
        .catch_unwind()
        .await
    {
        Ok(outbox) => outbox,
        Err(_) => {
            tracing::error!(connection_id = %connection_id, command = name, "command handler panicked");
            Outbox::single(connection_id, ServerEvent::error("internal server error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use application::{RealtimeSettings, SystemClock};
    use config::JwtConfig;
    use domain::{PresenceStatus, UserId, UserRole};
    use infrastructure::{InMemoryUserDirectory, Storage};

    fn app_state() -> AppState {
        AppState::new(
            Storage::in_memory(InMemoryUserDirectory::new()),
            JwtConfig {
                secret: "websocket-unit-test-secret-0123456789".into(),
                expiration_hours: 1,
            },
            RealtimeSettings::default(),
            Arc::new(SystemClock),
        )
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        received
    }

    #[tokio::test]
    async fn channel_is_registered_before_presence() {
        let state = app_state();
        let alice = UserIdentity::new(UserId::generate(), "Alice", UserRole::Customer);
        let bob = UserIdentity::new(UserId::generate(), "Bob", UserRole::Tasker);

        // 持有实时状态锁，让 Alice 的登记停在网关之前
        let guard = state.gateway.state().lock().await;
        let pending = tokio::spawn({
            let state = state.clone();
            let alice = alice.clone();
            async move { open_connection(&state, alice).await }
        });
        while state.hub.connection_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(guard.presence.list_online().is_empty());
        drop(guard);

        let (_, mut alice_events) = pending.await.unwrap();
        let (_, mut bob_events) = open_connection(&state, bob.clone()).await;

        let alice_saw = drain(&mut alice_events);
        assert!(alice_saw.iter().any(|event| matches!(
            event,
            ServerEvent::UserStatusChanged { user_id, status: PresenceStatus::Online, .. }
                if *user_id == bob.id
        )));
        assert!(matches!(
            drain(&mut bob_events).first(),
            Some(ServerEvent::OnlineUsers(users)) if users.len() == 2
        ));
    }

    #[tokio::test]
    async fn simultaneous_connections_see_each_other() {
        let state = app_state();
        let alice = UserIdentity::new(UserId::generate(), "Alice", UserRole::Customer);
        let bob = UserIdentity::new(UserId::generate(), "Bob", UserRole::Tasker);

        let ((_, mut alice_events), (_, mut bob_events)) = tokio::join!(
            open_connection(&state, alice.clone()),
            open_connection(&state, bob.clone()),
        );

        for (events, other) in [(&mut alice_events, bob.id), (&mut bob_events, alice.id)] {
            let online = drain(events)
                .into_iter()
                .filter_map(|event| match event {
                    ServerEvent::OnlineUsers(users) => Some(users),
                    _ => None,
                })
                .last()
                .unwrap_or_default();
            assert!(online.contains(&other));
        }
    }
}
