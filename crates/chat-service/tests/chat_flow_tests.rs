//! End-to-end chat flow tests.
//!
//! Drive a real server over HTTP using the `TestChatServer` harness with the
//! in-memory store.

use chat_service::models::{MessageKind, BROADCAST_RECIPIENT, LEAVE_STATUS_TEXT};
use chat_service::services::ChatStore;
use chat_service::tasks::SweeperConfig;
use chat_test_utils::TestChatServer;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

async fn join(client: &Client, server: &TestChatServer, name: &str) -> reqwest::Result<StatusCode> {
    let response = client
        .post(format!("{}/participants", server.url()))
        .json(&json!({ "name": name }))
        .send()
        .await?;
    Ok(response.status())
}

async fn post_message(
    client: &Client,
    server: &TestChatServer,
    user: &str,
    body: Value,
) -> reqwest::Result<StatusCode> {
    let response = client
        .post(format!("{}/messages", server.url()))
        .header("User", user)
        .json(&body)
        .send()
        .await?;
    Ok(response.status())
}

async fn list_messages(
    client: &Client,
    server: &TestChatServer,
    user: &str,
    query: &str,
) -> Result<(StatusCode, Value), anyhow::Error> {
    let response = client
        .get(format!("{}/messages{}", server.url(), query))
        .header("User", user)
        .send()
        .await?;
    let status = response.status();
    let body = if status.is_success() {
        response.json().await?
    } else {
        Value::Null
    };
    Ok((status, body))
}

/// Join, reject a duplicate, post, then read back with and without a limit.
#[tokio::test]
async fn test_join_post_and_read_scenario() -> Result<(), anyhow::Error> {
    let (server, store) = TestChatServer::spawn_in_memory().await?;
    let client = Client::new();

    assert_eq!(join(&client, &server, "alice").await?, StatusCode::CREATED);
    assert_eq!(join(&client, &server, "alice").await?, StatusCode::CONFLICT);

    let participants: Value = client
        .get(format!("{}/participants", server.url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(participants.as_array().map(Vec::len), Some(1));

    let status = post_message(
        &client,
        &server,
        "alice",
        json!({ "to": BROADCAST_RECIPIENT, "text": "hi", "type": "message" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(store.all_messages().await.len(), 2);

    let (status, all) = list_messages(&client, &server, "alice", "").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let (status, last) = list_messages(&client, &server, "alice", "?limit=1").await?;
    assert_eq!(status, StatusCode::OK);
    let last = last.as_array().cloned().unwrap_or_default();
    assert_eq!(last.len(), 1);
    assert_eq!(last.first().map(|m| m["text"].clone()), Some(json!("hi")));
    assert_eq!(last.first().map(|m| m["type"].clone()), Some(json!("message")));

    Ok(())
}

/// Heartbeat for an unknown participant is 404 and changes nothing.
#[tokio::test]
async fn test_heartbeat_for_unknown_participant() -> Result<(), anyhow::Error> {
    let (server, store) = TestChatServer::spawn_in_memory().await?;
    let client = Client::new();

    let response = client
        .post(format!("{}/status", server.url()))
        .header("User", "bob")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(store.all_messages().await.is_empty());

    Ok(())
}

/// Private messages reach only their sender and recipient.
#[tokio::test]
async fn test_private_message_visibility() -> Result<(), anyhow::Error> {
    let (server, _store) = TestChatServer::spawn_in_memory().await?;
    let client = Client::new();

    for name in ["alice", "bob", "carol"] {
        assert_eq!(join(&client, &server, name).await?, StatusCode::CREATED);
    }

    let status = post_message(
        &client,
        &server,
        "alice",
        json!({ "to": "bob", "text": "secret", "type": "private_message" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let saw_secret = |body: &Value| {
        body.as_array()
            .is_some_and(|messages| messages.iter().any(|m| m["text"] == "secret"))
    };

    for (name, expected) in [("alice", true), ("bob", true), ("carol", false)] {
        let (status, body) = list_messages(&client, &server, name, "").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saw_secret(&body), expected, "visibility for {}", name);
    }

    Ok(())
}

/// Posting as a name that never joined is rejected without a write.
#[tokio::test]
async fn test_post_from_unknown_sender_is_rejected() -> Result<(), anyhow::Error> {
    let (server, store) = TestChatServer::spawn_in_memory().await?;
    let client = Client::new();

    let status = post_message(
        &client,
        &server,
        "ghost",
        json!({ "to": BROADCAST_RECIPIENT, "text": "boo", "type": "message" }),
    )
    .await?;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(store.all_messages().await.is_empty());

    Ok(())
}

/// Error bodies carry a code and a message.
#[tokio::test]
async fn test_error_body_shape() -> Result<(), anyhow::Error> {
    let (server, _store) = TestChatServer::spawn_in_memory().await?;
    let client = Client::new();
    join(&client, &server, "alice").await?;

    let response = client
        .get(format!("{}/messages?limit=0", server.url()))
        .header("User", "alice")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert!(body["error"]["message"].is_string());

    Ok(())
}

/// The sweeper evicts a silent participant and announces it, while a
/// participant that keeps sending heartbeats stays.
#[tokio::test]
async fn test_sweeper_evicts_silent_participant() -> Result<(), anyhow::Error> {
    let (mut server, store) = TestChatServer::spawn_in_memory().await?;
    let client = Client::new();

    join(&client, &server, "quiet").await?;
    join(&client, &server, "chatty").await?;
    store
        .set_last_status("quiet", Utc::now() - chrono::Duration::seconds(30))
        .await;

    server.start_sweeper(SweeperConfig {
        interval: Duration::from_millis(20),
        inactivity_threshold: Duration::from_secs(10),
    });

    let mut evicted = false;
    for _ in 0..100 {
        let response = client
            .post(format!("{}/status", server.url()))
            .header("User", "chatty")
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        if store.find_participant("quiet").await?.is_none() {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(evicted, "silent participant should be evicted");
    assert!(store.find_participant("chatty").await?.is_some());

    let leaves: Vec<_> = store
        .all_messages()
        .await
        .into_iter()
        .filter(|m| m.kind == MessageKind::Status && m.text == LEAVE_STATUS_TEXT)
        .collect();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves.first().map(|m| m.from.as_str()), Some("quiet"));
    assert_eq!(
        leaves.first().map(|m| m.to.as_str()),
        Some(BROADCAST_RECIPIENT)
    );

    // An evicted participant can no longer read or heartbeat
    let (status, _) = list_messages(&client, &server, "quiet", "").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

/// Unknown routes still return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let (server, _store) = TestChatServer::spawn_in_memory().await?;

    let response = reqwest::get(format!("{}/nonexistent", server.url())).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
