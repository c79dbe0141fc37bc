//! Sharing, the notification fan-out and the live channel.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{of_type, TestContext};
use serde_json::json;
use taskboard::db::{Task, TaskStatus, UserSummary};
use taskboard::services::sharing::{ShareTarget, SharingService};
use taskboard::services::notifications::{
    NotificationService, EVENT_TASK_SHARED, EVENT_TASK_STATUS_UPDATED,
};
use tokio::sync::mpsc;

#[tokio::test]
async fn share_by_id_and_email_notifies_each_new_user_once() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let carol = ctx.register("Carol", "carol@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;

    let (status, body) = ctx
        .put(
            &format!("/api/tasks/{}/share", task_id),
            &alice.token,
            json!({ "userIdToShareWith": bob.id, "emails": ["CAROL@example.com", "bob@example.com"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task shared with 2 users");
    let added: Vec<&str> = body["newlyShared"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(added, vec![bob.id.as_str(), carol.id.as_str()]);
    assert_eq!(body["task"]["sharedWith"].as_array().unwrap().len(), 2);

    for user in [&bob, &carol] {
        let notifications = ctx.notifications(user).await;
        assert_eq!(notifications.len(), 1);
        let n = &notifications[0];
        assert_eq!(n["type"], "taskShared");
        assert_eq!(n["isRead"], false);
        assert_eq!(n["message"], "Alice shared the task \"Write report\" with you");
        assert_eq!(n["relatedTask"]["title"], "Write report");
        assert_eq!(n["relatedUser"]["name"], "Alice");
    }
    assert!(ctx.notifications(&alice).await.is_empty());
}

#[tokio::test]
async fn resharing_is_idempotent() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;

    let (status, _) = ctx.share_by_email(&alice, &task_id, json!("bob@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ctx.share_by_email(&alice, &task_id, json!("bob@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newlyShared"], json!([]));
    assert_eq!(body["task"]["sharedWith"].as_array().unwrap().len(), 1);

    assert_eq!(of_type(&ctx.notifications(&bob).await, "taskShared").len(), 1);
}

#[tokio::test]
async fn concurrent_shares_notify_the_new_member_once() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;
    let sharer = ctx.load_user(&alice).await;

    let target = || vec![ShareTarget::ByEmail("bob@example.com".to_string())];
    let (first, second) = tokio::join!(
        SharingService::share(&ctx.state, &sharer, &task_id, target()),
        SharingService::share(&ctx.state, &sharer, &task_id, target()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.newly_shared.len() + second.newly_shared.len(), 1);
    assert_eq!(first.report.persisted + second.report.persisted, 1);
    assert_eq!(first.task.shared_with.len(), 1);
    assert_eq!(second.task.shared_with.len(), 1);
    assert_eq!(of_type(&ctx.notifications(&bob).await, "taskShared").len(), 1);
}

#[tokio::test]
async fn sharing_with_yourself_is_a_noop() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let task_id = ctx.create_task(&alice, "Solo").await;

    let (status, body) = ctx
        .put(
            &format!("/api/tasks/{}/share", task_id),
            &alice.token,
            json!({ "userIdToShareWith": alice.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newlyShared"], json!([]));
    assert_eq!(body["task"]["sharedWith"], json!([]));
    assert!(ctx.notifications(&alice).await.is_empty());
}

#[tokio::test]
async fn unresolved_targets_do_not_block_the_rest() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;

    let (status, body) = ctx
        .put(
            &format!("/api/tasks/{}/share", task_id),
            &alice.token,
            json!({
                "userIdToShareWith": [uuid::Uuid::new_v4().to_string()],
                "emails": ["ghost@example.com", "bob@example.com"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task shared with 1 user");
    assert_eq!(body["newlyShared"][0]["id"], bob.id.as_str());
}

#[tokio::test]
async fn malformed_share_requests_are_rejected_before_writing() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;
    let uri = format!("/api/tasks/{}/share", task_id);

    let (status, _) = ctx
        .put(
            &uri,
            &alice.token,
            json!({ "userIdToShareWith": "not-a-uuid", "emails": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx.put(&uri, &alice.token, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, task) = ctx.get(&format!("/api/tasks/{}", task_id), &alice.token).await;
    assert_eq!(task["sharedWith"], json!([]));
    assert!(ctx.notifications(&bob).await.is_empty());
}

#[tokio::test]
async fn status_change_notifies_everyone_but_the_actor() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let carol = ctx.register("Carol", "carol@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;
    ctx.share_by_email(&alice, &task_id, json!(["bob@example.com", "carol@example.com"]))
        .await;
    let uri = format!("/api/tasks/{}", task_id);

    // Not a status change: nobody hears about it.
    ctx.put(&uri, &alice.token, json!({ "title": "Write the report" }))
        .await;
    // Same status again: still nothing.
    ctx.put(&uri, &alice.token, json!({ "status": "Pending" }))
        .await;
    for user in [&bob, &carol] {
        assert!(of_type(&ctx.notifications(user).await, "taskStatusUpdated").is_empty());
    }

    let (status, _) = ctx
        .put(&uri, &alice.token, json!({ "status": "Working" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    for user in [&bob, &carol] {
        let notifications = ctx.notifications(user).await;
        let updates = of_type(&notifications, "taskStatusUpdated");
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0]["message"],
            "Alice changed the status of \"Write the report\" to Working"
        );
        assert_eq!(updates[0]["relatedUser"]["id"], alice.id.as_str());
    }
    assert!(ctx.notifications(&alice).await.is_empty());
}

#[tokio::test]
async fn live_connections_receive_events_and_storage_still_happens() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let task_id = ctx.create_task(&alice, "Write report").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = ctx.state.live.register_connection(&bob.id, tx);

    ctx.share_by_email(&alice, &task_id, json!("bob@example.com"))
        .await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event.event, EVENT_TASK_SHARED);
    assert_eq!(event.data["taskId"], task_id.as_str());
    assert_eq!(event.data["taskTitle"], "Write report");
    assert_eq!(event.data["sharedBy"], "Alice");

    ctx.put(
        &format!("/api/tasks/{}", task_id),
        &alice.token,
        json!({ "status": "Finished" }),
    )
    .await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event.event, EVENT_TASK_STATUS_UPDATED);
    assert_eq!(event.data["newStatus"], "Finished");
    assert_eq!(event.data["updatedBy"], "Alice");

    // Pushed live and persisted.
    assert_eq!(ctx.notifications(&bob).await.len(), 2);

    ctx.state.live.remove_connection(&bob.id, connection);
    assert_eq!(ctx.state.live.connection_count(&bob.id), 0);
}

#[tokio::test]
async fn one_failed_recipient_does_not_stop_the_fan_out() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;
    let bob = ctx.register("Bob", "bob@example.com").await;
    let actor = ctx.load_user(&alice).await;

    let summary = |id: &str, name: &str| UserSummary {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    };
    let now = Utc::now().naive_utc();
    // The first member has no user row, so storing their notification fails.
    let task = Task {
        id: "task-without-row".to_string(),
        owner: summary(&alice.id, "Alice"),
        title: "Write report".to_string(),
        description: None,
        status: TaskStatus::Finished,
        due_date: None,
        shared_with: vec![summary("ghost-user", "Ghost"), summary(&bob.id, "Bob")],
        created_at: now,
        updated_at: now,
    };

    let report = NotificationService::new(&ctx.state)
        .notify_status_change(&task, &actor)
        .await;
    assert_eq!(report.recipients, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.pushed_live, 0);

    let notifications = ctx.notifications(&bob).await;
    assert_eq!(of_type(&notifications, "taskStatusUpdated").len(), 1);
}

#[tokio::test]
async fn live_endpoint_requires_a_valid_token() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("Alice", "alice@example.com").await;

    let (status, _) = ctx
        .send(axum::http::Method::GET, "/ws", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .send(axum::http::Method::GET, "/ws?token=garbage", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Authenticated but not an upgrade request.
    let (status, _) = ctx
        .send(
            axum::http::Method::GET,
            &format!("/ws?token={}", alice.token),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
