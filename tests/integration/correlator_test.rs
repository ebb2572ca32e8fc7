//! Request correlation and event dispatch through a live client.

#[path = "../helpers/mod.rs"]
mod helpers;

use assert_matches::assert_matches;
use dap_driver::dap::types::Message;
use dap_driver::Error;
use helpers::fake_adapter::connect;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_sequence_numbers_increase_on_the_wire() {
    let (client, mut adapter) = connect(Duration::from_secs(5));

    let pending: Vec<_> = ["threads", "modules", "loadedSources"]
        .iter()
        .map(|command| client.send_request(command, None).unwrap())
        .collect();

    let mut seen = Vec::new();
    for command in ["threads", "modules", "loadedSources"] {
        seen.push(adapter.expect_request(command).await.seq);
    }

    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        seen,
        pending.iter().map(|p| p.seq()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_unmatched_response_does_not_disturb_pending_requests() {
    let (client, mut adapter) = connect(Duration::from_secs(5));

    let first = client.send_request("threads", None).unwrap();
    let second = client.send_request("modules", None).unwrap();
    let first_req = adapter.expect_request("threads").await;
    let second_req = adapter.expect_request("modules").await;

    adapter
        .send_response(999, "threads", true, None, Some(json!({"bogus": true})))
        .await;
    adapter.respond(&second_req, Some(json!({"modules": []}))).await;
    assert_eq!(second.body().await.unwrap(), Some(json!({"modules": []})));
    assert_eq!(client.pending_requests(), 1);

    adapter.respond(&first_req, Some(json!({"threads": []}))).await;
    assert_eq!(first.body().await.unwrap(), Some(json!({"threads": []})));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_late_response_after_timeout_is_dropped() {
    let (client, mut adapter) = connect(Duration::from_millis(100));

    let slow = client.send_request("stackTrace", None).unwrap();
    let req = adapter.expect_request("stackTrace").await;

    let err = slow.body().await.unwrap_err();
    assert_matches!(err, Error::Timeout { ref command, after } if command == "stackTrace" && after == Duration::from_millis(100));
    assert_eq!(client.pending_requests(), 0);

    adapter.respond(&req, Some(json!({"stackFrames": []}))).await;

    // The client keeps working after the stray response.
    let next = client.send_request("threads", None).unwrap();
    let next_req = adapter.expect_request("threads").await;
    adapter.respond(&next_req, Some(json!({"threads": []}))).await;
    assert_ok!(next.body().await);
}

#[tokio::test]
async fn test_failed_response_carries_adapter_message() {
    let (client, mut adapter) = connect(Duration::from_secs(5));

    let pending = client.send_request("evaluate", None).unwrap();
    let req = adapter.expect_request("evaluate").await;
    adapter.fail(&req, "not available").await;

    assert_eq!(pending.body().await.unwrap_err().to_string(), "not available");
}

#[tokio::test]
async fn test_one_shot_and_persistent_handlers() {
    let (client, mut adapter) = connect(Duration::from_secs(5));

    let every = Arc::new(AtomicUsize::new(0));
    let once = Arc::new(AtomicUsize::new(0));
    {
        let every = every.clone();
        client.events().on("output", move |_| {
            every.fetch_add(1, Ordering::SeqCst);
        });
        let once = once.clone();
        client.events().once("output", move |_| {
            once.fetch_add(1, Ordering::SeqCst);
        });
    }
    let done = client.events().arm(&["terminated"]);

    for line in ["a", "b", "c"] {
        adapter
            .event("output", Some(json!({"category": "stdout", "output": line})))
            .await;
    }
    adapter.event("terminated", None).await;

    done.wait(Duration::from_secs(5)).await.unwrap();
    assert_eq!(every.load(Ordering::SeqCst), 3);
    assert_eq!(once.load(Ordering::SeqCst), 1);
    assert_eq!(client.events().handler_count("output"), 1);
}

#[tokio::test]
async fn test_reverse_request_is_answered_unsupported() {
    let (client, mut adapter) = connect(Duration::from_secs(5));

    let seq = adapter
        .reverse_request("runInTerminal", Some(json!({"args": ["./app"]})))
        .await;

    match adapter.next_message(Duration::from_secs(5)).await {
        Some(Message::Response(resp)) => {
            assert_eq!(resp.request_seq, seq);
            assert_eq!(resp.command, "runInTerminal");
            assert!(!resp.success);
        }
        other => panic!("Expected a rejection, got {:?}", other),
    }
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_adapter_exit_disconnects_client() {
    let (client, adapter) = connect(Duration::from_millis(100));
    drop(adapter);

    let pending = client.send_request("threads", None).unwrap();
    assert_matches!(pending.body().await, Err(Error::Timeout { .. }));
    assert!(!client.is_connected());
}
