//! Reading and acknowledging notifications.

mod common;

use axum::http::{Method, StatusCode};
use common::TestContext;
use serde_json::json;
use taskboard::db::MAX_BATCH_IDS;

#[tokio::test]
async fn mark_read_only_touches_the_callers_unread_notifications() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let carol = ctx.register("Carol", "carol@example.com").await;

    let first = ctx.create_task(&alice, "First").await;
    let second = ctx.create_task(&alice, "Second").await;
    ctx.share_by_email(&alice, &first, json!(["bob@example.com", "carol@example.com"]))
        .await;
    ctx.share_by_email(&alice, &second, json!("bob@example.com"))
        .await;

    let bobs = ctx.notifications(&bob).await;
    assert_eq!(bobs.len(), 2);
    // Newest first.
    assert_eq!(bobs[0]["relatedTask"]["title"], "Second");
    let carols = ctx.notifications(&carol).await;
    let carol_id = carols[0]["id"].as_str().unwrap().to_string();
    let bob_first = bobs[1]["id"].as_str().unwrap().to_string();

    // Bob cannot mark Carol's notification.
    let (status, _) = ctx
        .put(
            "/api/notifications/mark-read",
            &bob.token,
            json!({ "notificationIds": [carol_id] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.notifications(&carol).await[0]["isRead"], false);

    // Mixed batch: only Bob's own id counts.
    let (status, body) = ctx
        .put(
            "/api/notifications/mark-read",
            &bob.token,
            json!({ "notificationIds": [bob_first, carol_id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modified"], 1);

    let bobs = ctx.notifications(&bob).await;
    assert_eq!(bobs[0]["isRead"], false);
    assert_eq!(bobs[1]["isRead"], true);

    // Already read: nothing left to modify.
    let (status, _) = ctx
        .put(
            "/api/notifications/mark-read",
            &bob.token,
            json!({ "notificationIds": [bob_first] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_read_requires_ids() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;

    for body in [json!({}), json!({ "notificationIds": [] })] {
        let (status, _) = ctx
            .put("/api/notifications/mark-read", &alice.token, body)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn mark_read_rejects_oversized_batches() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let ids: Vec<String> = (0..=MAX_BATCH_IDS).map(|i| format!("id-{}", i)).collect();

    let (status, body) = ctx
        .put(
            "/api/notifications/mark-read",
            &alice.token,
            json!({ "notificationIds": ids }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn mark_all_read_reports_how_many_changed() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    for title in ["One", "Two"] {
        let id = ctx.create_task(&alice, title).await;
        ctx.share_by_email(&alice, &id, json!("bob@example.com"))
            .await;
    }

    let (status, body) = ctx
        .send(
            Method::PUT,
            "/api/notifications/mark-all-read",
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modified"], 2);
    assert!(ctx
        .notifications(&bob)
        .await
        .iter()
        .all(|n| n["isRead"] == true));

    let (status, body) = ctx
        .send(
            Method::PUT,
            "/api/notifications/mark-all-read",
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modified"], 0);
}
