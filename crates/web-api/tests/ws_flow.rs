mod support;

use futures_util::SinkExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message as TungsteniteMessage};

use support::{next_event, TestServer, WsClient};

async fn send(socket: &mut WsClient, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    socket
        .send(TungsteniteMessage::Text(frame.into()))
        .await
        .expect("send frame");
}

async fn create_direct(server: &TestServer) -> String {
    let conversation: Value = Client::new()
        .post(server.url("/conversations"))
        .bearer_auth(server.token(&server.alice))
        .json(&json!({ "type": "direct", "participants": [server.bob.id] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    conversation["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn handshake_requires_valid_token() {
    let server = TestServer::start().await;

    let without = connect_async(server.base_ws.clone()).await;
    assert!(without.is_err());

    let forged = connect_async(format!("{}?token=not-a-jwt", server.base_ws)).await;
    assert!(forged.is_err());
}

#[tokio::test]
async fn presence_is_announced_to_other_connections() {
    let server = TestServer::start().await;

    let mut alice = server.connect(&server.alice).await;
    let snapshot = next_event(&mut alice, "online_users").await;
    assert_eq!(snapshot, json!([server.alice.id]));

    let mut bob = server.connect(&server.bob).await;
    let snapshot = next_event(&mut bob, "online_users").await;
    assert_eq!(snapshot.as_array().unwrap().len(), 2);

    let status = next_event(&mut alice, "user_status_changed").await;
    assert_eq!(status["userId"], json!(server.bob.id));
    assert_eq!(status["status"], "online");

    bob.close(None).await.unwrap();
    let status = next_event(&mut alice, "user_status_changed").await;
    assert_eq!(status["status"], "offline");
}

#[tokio::test]
async fn socket_message_reaches_room_and_notifies_recipient() {
    let server = TestServer::start().await;
    let conversation_id = create_direct(&server).await;

    let mut alice = server.connect(&server.alice).await;
    let mut bob = server.connect(&server.bob).await;

    send(&mut alice, "join_conversation", json!({ "conversationId": conversation_id })).await;
    send(&mut bob, "join_conversation", json!({ "conversationId": conversation_id })).await;
    let joined = next_event(&mut alice, "user_joined").await;
    assert_eq!(joined["userName"], "Bob");

    send(
        &mut alice,
        "send_message",
        json!({ "conversationId": conversation_id, "content": "hi there" }),
    )
    .await;

    let ack = next_event(&mut alice, "new_message").await;
    assert_eq!(ack["message"]["content"], "hi there");

    let delivered = next_event(&mut bob, "new_message").await;
    assert_eq!(delivered["message"]["id"], ack["message"]["id"]);

    let notification = next_event(&mut bob, "new_notification").await;
    assert_eq!(notification["senderName"], "Alice");
    assert_eq!(notification["content"], "hi there");
}

#[tokio::test]
async fn rejected_commands_keep_connection_open() {
    let server = TestServer::start().await;
    let conversation_id = create_direct(&server).await;

    let mut carol = server.connect(&server.carol).await;
    socket_text(&mut carol, "{not json").await;
    let error = next_event(&mut carol, "error").await;
    assert!(error["message"].as_str().unwrap().starts_with("invalid event"));

    send(&mut carol, "join_conversation", json!({ "conversationId": conversation_id })).await;
    let error = next_event(&mut carol, "error").await;
    assert!(error["message"].is_string());

    send(&mut carol, "typing_stop", json!({ "conversationId": conversation_id })).await;
    let online: Value = Client::new()
        .get(server.url("/presence/online"))
        .bearer_auth(server.token(&server.carol))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(online, json!([server.carol.id]));
}

async fn socket_text(socket: &mut WsClient, text: &str) {
    socket
        .send(TungsteniteMessage::Text(text.to_string().into()))
        .await
        .expect("send frame");
}

#[tokio::test]
async fn admin_notification_reaches_online_recipient() {
    let server = TestServer::start().await;

    let mut bob = server.connect(&server.bob).await;
    next_event(&mut bob, "online_users").await;

    let response = Client::new()
        .post(server.url("/notifications"))
        .bearer_auth(server.token(&server.carol))
        .json(&json!({
            "userId": server.bob.id,
            "title": "Payout sent",
            "content": "Your payout is on its way",
            "type": "payment"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let pushed = next_event(&mut bob, "new_notification").await;
    assert_eq!(pushed["title"], "Payout sent");
    assert_eq!(pushed["type"], "payment");
    assert_eq!(pushed["userId"], json!(server.bob.id));
}
