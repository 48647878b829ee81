mod support;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use support::TestServer;

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let server = TestServer::start().await;
    let client = Client::new();

    let response = client
        .get(server.url("/conversations"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let health = client
        .get(format!("{}/health", server.base_http))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn direct_conversation_message_flow() {
    let server = TestServer::start().await;
    let client = Client::new();
    let alice = server.token(&server.alice);
    let bob = server.token(&server.bob);
    let carol = server.token(&server.carol);

    let created = client
        .post(server.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "type": "direct", "participants": [server.bob.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let conversation: Value = created.json().await.unwrap();
    let conversation_id = conversation["id"].as_str().unwrap().to_string();

    let again = client
        .post(server.url("/conversations"))
        .bearer_auth(&bob)
        .json(&json!({ "type": "direct", "participants": [server.alice.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::OK);
    let existing: Value = again.json().await.unwrap();
    assert_eq!(existing["id"], conversation["id"]);

    let sent = client
        .post(server.url(&format!("/conversations/{conversation_id}/messages")))
        .bearer_auth(&alice)
        .json(&json!({ "content": "  hello bob  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(sent.status(), StatusCode::CREATED);
    let message: Value = sent.json().await.unwrap();
    assert_eq!(message["content"], "hello bob");

    let unread: Value = client
        .get(server.url(&format!("/conversations/{conversation_id}/unread/count")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 1);

    let notifications: Value = client
        .get(server.url("/notifications"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notifications["total"], 1);
    assert_eq!(notifications["items"][0]["title"], "New message from Alice");

    let read = client
        .post(server.url(&format!("/conversations/{conversation_id}/read")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(read.status(), StatusCode::OK);
    let unread: Value = client
        .get(server.url(&format!("/conversations/{conversation_id}/unread/count")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 0);

    let page: Value = client
        .get(server.url(&format!("/conversations/{conversation_id}/messages?limit=10")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["hasNext"], false);

    let outsider = client
        .get(server.url(&format!("/conversations/{conversation_id}")))
        .bearer_auth(&carol)
        .send()
        .await
        .unwrap();
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_requests_are_reported_as_bad_request() {
    let server = TestServer::start().await;
    let client = Client::new();
    let alice = server.token(&server.alice);

    let bad_type = client
        .post(server.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "type": "broadcast", "participants": [server.bob.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);

    let with_self = client
        .post(server.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "type": "group", "title": "me", "participants": [server.alice.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(with_self.status(), StatusCode::BAD_REQUEST);

    let group: Value = client
        .post(server.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "type": "group", "title": "team", "participants": [server.bob.id] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = group["id"].as_str().unwrap();

    let empty_search = client
        .get(server.url(&format!("/conversations/{conversation_id}/messages/search?q=")))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(empty_search.status(), StatusCode::BAD_REQUEST);

    let empty_message = client
        .post(server.url(&format!("/conversations/{conversation_id}/messages")))
        .bearer_auth(&alice)
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_message.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_notifications_and_owner_checks() {
    let server = TestServer::start().await;
    let client = Client::new();
    let alice = server.token(&server.alice);
    let bob = server.token(&server.bob);
    let admin = server.token(&server.carol);

    let forbidden = client
        .post(server.url("/notifications"))
        .bearer_auth(&alice)
        .json(&json!({ "userId": server.bob.id, "title": "hi", "content": "there" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let created = client
        .post(server.url("/notifications"))
        .bearer_auth(&admin)
        .json(&json!({
            "userId": server.bob.id,
            "title": "Booking confirmed",
            "content": "See you tomorrow",
            "type": "booking"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let booking: Value = created.json().await.unwrap();
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let batch = client
        .post(server.url("/notifications/multiple"))
        .bearer_auth(&admin)
        .json(&json!({
            "userIds": [server.alice.id, server.bob.id],
            "title": "Maintenance",
            "content": "Tonight at 02:00"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(batch.status(), StatusCode::CREATED);
    let batch: Value = batch.json().await.unwrap();
    assert_eq!(batch.as_array().unwrap().len(), 2);

    let own = client
        .get(server.url(&format!("/notifications/{booking_id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::OK);
    let foreign = client
        .get(server.url(&format!("/notifications/{booking_id}")))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    let stats: Value = client
        .get(server.url("/notifications/stats"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["unread"], 2);
    assert_eq!(stats["unreadByType"]["booking"], 1);
    assert_eq!(stats["unreadByType"]["system"], 1);

    let unread: Value = client
        .get(server.url("/notifications/unread?limit=1"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread.as_array().unwrap().len(), 1);

    let future: Value = client
        .get(server.url("/notifications?dateFrom=2999-01-01T00:00:00Z"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(future["total"], 0);

    let sweep = client
        .delete(server.url("/notifications/expired"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(sweep.status(), StatusCode::FORBIDDEN);
    let swept: Value = client
        .delete(server.url("/notifications/expired"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(swept["count"], 0);
}
