//! End-to-end tests for the AI analysis and summary commands.

mod common;

use chrono::{TimeZone, Utc};
use common::{gemini_body, MockService, Reply, TestReceiver, TestReceiverOptions};
use notification_receiver::ai::MISSING_CREDENTIAL_MESSAGE;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

async fn receiver_with_gemini(gemini: &MockService) -> TestReceiver {
    TestReceiver::spawn_with(TestReceiverOptions {
        gemini_base_url: gemini.gemini_base_url(),
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn test_analysis_success_fills_modal() {
    let gemini = MockService::gemini_text("ok").await;
    let receiver = receiver_with_gemini(&gemini).await;
    let document = receiver
        .add(json!({"source": "CI", "status": "failed"}), Some(Utc::now()))
        .await;
    let notification = receiver.sync_core.state().notifications[0].clone();
    assert_eq!(notification.id, document.id);

    receiver.sync_core.analyze(&notification).await;

    let modal = receiver.sync_core.state().modal;
    assert!(modal.open);
    assert!(!modal.loading);
    assert_eq!(modal.content, "ok");
    assert_eq!(modal.title, "✨ AI Analysis for notification from \"CI\"");

    let requests = gemini.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].path,
        "/v1beta/models/gemini-2.0-flash:generateContent"
    );
    assert_eq!(requests[0].query, "key=test-key");
    let prompt = requests[0].prompt();
    assert!(prompt.contains("\"status\": \"failed\""));
    assert!(prompt.contains("1.  Explain what this data likely means in plain English."));
    assert!(prompt.contains("Recommend a concrete next step"));
    assert_eq!(requests[0].body["contents"][0]["role"], "user");

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_api_error_is_shown_in_modal() {
    let gemini = MockService::fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": {"code": 500, "message": "backend exploded"}}),
    )
    .await;
    let receiver = receiver_with_gemini(&gemini).await;
    receiver.add(json!({"source": "CI"}), Some(Utc::now())).await;
    let notification = receiver.sync_core.state().notifications[0].clone();

    receiver.sync_core.analyze(&notification).await;

    let modal = receiver.sync_core.state().modal;
    assert!(!modal.loading);
    assert!(modal
        .content
        .starts_with("Sorry, the AI analysis failed. The error was:"));
    assert!(modal.content.contains("500"));
    assert!(modal.content.contains("backend exploded"));

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_missing_candidates_is_a_failure() {
    let gemini = MockService::fixed(StatusCode::OK, json!({"candidates": []})).await;
    let receiver = receiver_with_gemini(&gemini).await;
    receiver.add(json!({"n": 1}), Some(Utc::now())).await;

    assert!(receiver.sync_core.summarize_all().await);

    let modal = receiver.sync_core.state().modal;
    assert_eq!(
        modal.content,
        "Sorry, the AI summary failed. The error was: Failed to parse the response from the AI model."
    );

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_placeholder_key_skips_the_network() {
    let gemini = MockService::gemini_text("should not be asked").await;
    let receiver = TestReceiver::spawn_with(TestReceiverOptions {
        gemini_base_url: gemini.gemini_base_url(),
        gemini_api_key: Some("PASTE_YOUR_GEMINI_API_KEY_HERE".to_string()),
        ..Default::default()
    })
    .await;
    receiver.add(json!({"n": 1}), Some(Utc::now())).await;
    let notification = receiver.sync_core.state().notifications[0].clone();

    receiver.sync_core.analyze(&notification).await;

    let modal = receiver.sync_core.state().modal;
    assert_eq!(modal.content, MISSING_CREDENTIAL_MESSAGE);
    assert!(!modal.loading);
    assert_eq!(gemini.request_count(), 0);

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_summary_embeds_latest_fifty_of_seventy_five() {
    let gemini = MockService::gemini_text("summary").await;
    let receiver = receiver_with_gemini(&gemini).await;
    let path = receiver.collection_path();
    for i in 0..75i64 {
        receiver
            .store
            .add_document(
                &path,
                common::fields(json!({"seq": format!("item-{:02}", i)})),
                Utc.timestamp_millis_opt(1_000 * (i + 1)).single(),
            )
            .unwrap();
    }
    common::wait_for_state(&receiver.sync_core, |s| s.notifications.len() == 75).await;

    assert!(receiver.sync_core.summarize_all().await);
    assert_eq!(receiver.sync_core.state().modal.content, "summary");

    let prompt = gemini.requests()[0].prompt();
    assert!(prompt.contains("Here are the latest 75 notifications"));
    assert_eq!(prompt.matches("\"seq\"").count(), 50);
    // Newest first: the oldest 25 are left out
    assert!(prompt.contains("item-74"));
    assert!(prompt.contains("item-25"));
    assert!(!prompt.contains("item-24"));

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_stale_completion_is_discarded() {
    let gemini = MockService::spawn(|request| {
        let slow = request.prompt().contains("slow-one");
        let reply: Reply = Box::pin(async move {
            if slow {
                tokio::time::sleep(Duration::from_millis(400)).await;
                (StatusCode::OK, gemini_body("slow answer"))
            } else {
                (StatusCode::OK, gemini_body("fast answer"))
            }
        });
        reply
    })
    .await;
    let receiver = receiver_with_gemini(&gemini).await;
    receiver
        .add(json!({"source": "slow-one"}), Utc.timestamp_millis_opt(2_000).single())
        .await;
    receiver
        .add(json!({"source": "fast-one"}), Utc.timestamp_millis_opt(1_000).single())
        .await;
    let notifications = receiver.sync_core.state().notifications;
    let slow = notifications[0].clone();
    let fast = notifications[1].clone();
    assert_eq!(slow.source.as_deref(), Some("slow-one"));

    let core = receiver.sync_core.clone();
    let slow_task = tokio::spawn(async move { core.analyze(&slow).await });
    common::wait_for_state(&receiver.sync_core, |s| s.modal.loading).await;
    receiver.sync_core.analyze(&fast).await;

    let modal = receiver.sync_core.state().modal;
    assert_eq!(modal.content, "fast answer");
    assert_eq!(modal.title, "✨ AI Analysis for notification from \"fast-one\"");

    slow_task.await.unwrap();
    let modal = receiver.sync_core.state().modal;
    assert_eq!(modal.content, "fast answer");
    assert!(!modal.loading);

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_commands_over_http() {
    let gemini = MockService::gemini_text("over http").await;
    let receiver = receiver_with_gemini(&gemini).await;
    let document = receiver.add(json!({"source": "CI"}), Some(Utc::now())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(receiver.url(&format!(
            "/v1/dashboard/notifications/{}/analyze",
            document.id
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let state = common::wait_for_state(&receiver.sync_core, |s| {
        s.modal.open && !s.modal.loading
    })
    .await;
    assert_eq!(state.modal.content, "over http");

    let response = client
        .post(receiver.url("/v1/dashboard/modal/close"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let dashboard: serde_json::Value = client
        .get(receiver.url("/v1/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["modal"]["open"], false);
    assert_eq!(dashboard["modal"]["content"], "");

    let response = client
        .post(receiver.url("/v1/dashboard/summarize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    common::wait_for_state(&receiver.sync_core, |s| {
        s.modal.open && !s.modal.loading && s.modal.title.contains("Summary")
    })
    .await;

    receiver.shutdown().await;
}
