//! End-to-end session scenarios against a scripted adapter.

#[path = "../helpers/mod.rs"]
mod helpers;

use assert_matches::assert_matches;
use dap_driver::debug::{
    BreakpointDescriptor, DebugSession, Debugger, LaunchRequest, SessionState, StopOutcome,
    VariableNode,
};
use dap_driver::{EngineConfig, Error};
use helpers::fake_adapter::{connect, FakeAdapter};
use helpers::log_capture;
use serde_json::json;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(100);

fn debugger() -> Debugger {
    Debugger::new(EngineConfig::default().with_request_timeout(Duration::from_secs(5)))
}

async fn launched(thread_id: i32) -> (Debugger, FakeAdapter) {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = debugger();

    let (outcome, _) = tokio::join!(
        debugger.launch_with_client(client, LaunchRequest::new("/workspace/target/debug/app")),
        adapter.accept_launch(thread_id)
    );
    outcome.unwrap();
    (debugger, adapter)
}

fn session(debugger: &Debugger) -> &DebugSession {
    debugger.session().expect("session should be active")
}

#[tokio::test]
async fn test_launch_captures_thread_from_first_stop() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = debugger();
    let request = LaunchRequest::new("/workspace/target/debug/app").stop_on_entry(true);

    let (outcome, launch) = tokio::join!(
        debugger.launch_with_client(client, request),
        adapter.accept_launch(7)
    );

    let outcome = outcome.unwrap();
    assert_eq!(
        outcome.stop,
        StopOutcome::Stopped {
            thread_id: 7,
            reason: "entry".to_string()
        }
    );
    assert!(outcome.breakpoints.is_empty());

    let session = session(&debugger);
    assert_eq!(session.thread_id(), Some(7));
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(outcome.session_id, session.id);

    let args = launch.arguments.unwrap();
    assert_eq!(args["program"], "/workspace/target/debug/app");
    assert_eq!(args["stopOnEntry"], true);
    assert_eq!(args["type"], "lldb");
}

#[tokio::test]
async fn test_launch_response_held_until_configured() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = debugger();

    let script = async {
        let init = adapter.expect_request("initialize").await;
        adapter.respond(&init, None).await;

        let launch = adapter.expect_request("launch").await;
        adapter.event("initialized", None).await;

        let done = adapter.expect_request("configurationDone").await;
        adapter.respond(&done, None).await;
        adapter
            .event("stopped", Some(json!({"reason": "breakpoint", "threadId": 1})))
            .await;
        adapter.respond(&launch, None).await;
    };

    let (outcome, _) = tokio::join!(
        debugger.launch_with_client(client, LaunchRequest::new("./app")),
        script
    );

    assert_eq!(outcome.unwrap().stop.thread_id(), Some(1));
}

#[tokio::test]
async fn test_rejected_launch_fails_fast() {
    let (logs, _guard) = log_capture::capture();
    let (client, mut adapter) = connect(Duration::from_secs(5));
    // Waiting for `initialized` would take the full 30s default.
    let mut debugger = Debugger::new(EngineConfig::default());

    let script = async {
        let init = adapter.expect_request("initialize").await;
        adapter.respond(&init, None).await;

        let launch = adapter.expect_request("launch").await;
        adapter.fail(&launch, "Could not find program '/missing'").await;

        let disconnect = adapter.expect_request("disconnect").await;
        adapter.respond(&disconnect, None).await;
    };

    let launch = debugger.launch_with_client(client, LaunchRequest::new("/missing"));
    let (result, _) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(launch, script)
    })
    .await
    .expect("launch should not wait for initialized");

    assert_matches!(result, Err(Error::AdapterFailure { ref command, ref message })
        if command == "launch" && message == "Could not find program '/missing'");
    assert!(debugger.session().is_none());
    assert!(log_capture::contains(&logs, tracing::Level::ERROR, "Launch failed"));
}

#[tokio::test]
async fn test_missing_initialized_times_out_and_tears_down() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = Debugger::new(
        EngineConfig::default().with_event_timeout(Duration::from_millis(200)),
    );

    let script = async {
        let init = adapter.expect_request("initialize").await;
        adapter.respond(&init, None).await;
        adapter.expect_request("launch").await;

        let disconnect = adapter.expect_request("disconnect").await;
        assert_eq!(disconnect.arguments.as_ref().unwrap()["terminateDebuggee"], true);
        adapter.respond(&disconnect, None).await;
    };

    let (result, _) = tokio::join!(
        debugger.launch_with_client(client, LaunchRequest::new("./app")),
        script
    );

    assert_matches!(result, Err(Error::Timeout { ref command, .. }) if command.contains("initialized"));
    assert!(debugger.session().is_none());
}

#[tokio::test]
async fn test_launch_installs_initial_breakpoints() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = debugger();
    let request = LaunchRequest::new("./app")
        .with_breakpoint("src/main.rs", 4)
        .with_breakpoint("src/main.rs", 9);

    let script = async {
        let init = adapter.expect_request("initialize").await;
        adapter.respond(&init, None).await;
        let launch = adapter.expect_request("launch").await;
        adapter.respond(&launch, None).await;
        adapter.event("initialized", None).await;

        let set = adapter.expect_request("setBreakpoints").await;
        let args = set.arguments.clone().unwrap();
        assert_eq!(args["source"]["path"], "src/main.rs");
        assert_eq!(args["breakpoints"], json!([{"line": 4}, {"line": 9}]));
        adapter
            .respond(
                &set,
                Some(json!({"breakpoints": [
                    {"id": 1, "verified": true, "line": 4},
                    {"id": 2, "verified": true, "line": 10}
                ]})),
            )
            .await;

        let done = adapter.expect_request("configurationDone").await;
        adapter.respond(&done, None).await;
        adapter
            .event("stopped", Some(json!({"reason": "breakpoint", "threadId": 1})))
            .await;
    };

    let (outcome, _) = tokio::join!(debugger.launch_with_client(client, request), script);
    let breakpoints = outcome.unwrap().breakpoints;

    assert_eq!(breakpoints.len(), 2);
    assert_eq!(breakpoints[1].id, 2);
    assert_eq!(breakpoints[1].requested_line, 9);
    assert_eq!(breakpoints[1].line, 10);
}

#[tokio::test]
async fn test_initial_breakpoints_in_several_files_get_distinct_ids() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = debugger();
    let request = LaunchRequest::new("./app")
        .with_breakpoint("src/main.rs", 4)
        .with_breakpoint("src/lib.rs", 12);

    let script = async {
        let init = adapter.expect_request("initialize").await;
        adapter.respond(&init, None).await;
        let launch = adapter.expect_request("launch").await;
        adapter.respond(&launch, None).await;
        adapter.event("initialized", None).await;

        for _ in 0..2 {
            let set = adapter.expect_request("setBreakpoints").await;
            adapter
                .respond(&set, Some(json!({"breakpoints": [{"verified": true}]})))
                .await;
        }

        let done = adapter.expect_request("configurationDone").await;
        adapter.respond(&done, None).await;
        adapter
            .event("stopped", Some(json!({"reason": "breakpoint", "threadId": 1})))
            .await;
    };

    let (outcome, _) = tokio::join!(debugger.launch_with_client(client, request), script);
    let breakpoints = outcome.unwrap().breakpoints;

    let ids: Vec<i32> = breakpoints.iter().map(|bp| bp.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(breakpoints[0].file, "src/main.rs");
    assert_eq!(breakpoints[1].file, "src/lib.rs");
    assert_eq!(breakpoints[1].line, 12);
}

#[tokio::test]
async fn test_set_breakpoint_maps_adapter_result() {
    let (debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("setBreakpoints").await;
        let args = req.arguments.clone().unwrap();
        assert_eq!(args["source"]["path"], "src/main.rs");
        assert_eq!(args["breakpoints"], json!([{"line": 10}]));
        adapter
            .respond(&req, Some(json!({"breakpoints": [{"verified": true, "line": 10}]})))
            .await;
    };

    let (result, _) = tokio::join!(debugger.set_breakpoint("src/main.rs", 10), script);

    assert_eq!(
        result.unwrap(),
        vec![BreakpointDescriptor {
            id: 0,
            file: "src/main.rs".to_string(),
            line: 10,
            requested_line: 10,
            verified: true,
            message: None,
        }]
    );
}

#[tokio::test]
async fn test_get_variables_flattens_scopes() {
    let (debugger, mut adapter) = launched(7).await;

    let script = async {
        let trace = adapter.expect_request("stackTrace").await;
        let args = trace.arguments.clone().unwrap();
        assert_eq!(args["threadId"], 7);
        assert_eq!(args["levels"], 1);
        adapter
            .respond(
                &trace,
                Some(json!({"stackFrames": [{"id": 1, "name": "main", "line": 5, "column": 1}]})),
            )
            .await;

        let scopes = adapter.expect_request("scopes").await;
        assert_eq!(scopes.arguments.clone().unwrap()["frameId"], 1);
        adapter
            .respond(
                &scopes,
                Some(json!({"scopes": [
                    {"name": "Registers", "variablesReference": 0, "expensive": true},
                    {"name": "Local", "variablesReference": 100, "expensive": false}
                ]})),
            )
            .await;

        let vars = adapter.expect_request("variables").await;
        assert_eq!(vars.arguments.clone().unwrap()["variablesReference"], 100);
        adapter
            .respond(
                &vars,
                Some(json!({"variables": [{"name": "x", "value": "42", "type": "i32"}]})),
            )
            .await;
    };

    let (result, _) = tokio::join!(debugger.get_variables(), script);

    assert_eq!(
        result.unwrap(),
        vec![VariableNode {
            name: "x".to_string(),
            value: "42".to_string(),
            type_name: Some("i32".to_string()),
            variables_reference: 0,
        }]
    );
    assert!(adapter.next_message(QUIET).await.is_none());
}

#[tokio::test]
async fn test_expand_variable_lists_children() {
    let (debugger, mut adapter) = launched(7).await;

    let script = async {
        let vars = adapter.expect_request("variables").await;
        assert_eq!(vars.arguments.clone().unwrap()["variablesReference"], 1001);
        adapter
            .respond(
                &vars,
                Some(json!({"variables": [
                    {"name": "[0]", "value": "1", "type": "i32"},
                    {"name": "[1]", "value": "2", "type": "i32"}
                ]})),
            )
            .await;
    };

    let (result, _) = tokio::join!(debugger.expand_variable(1001), script);
    let names: Vec<String> = result.unwrap().into_iter().map(|v| v.name).collect();
    assert_eq!(names, vec!["[0]", "[1]"]);
}

#[tokio::test]
async fn test_continue_without_thread_sends_nothing() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut session = DebugSession::new(client, "./app", Duration::from_secs(5));

    let result = session.continue_execution().await;

    assert_matches!(result, Err(Error::Precondition(_)));
    assert!(adapter.next_message(QUIET).await.is_none());
}

#[tokio::test]
async fn test_continue_runs_to_next_stop() {
    let (mut debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("continue").await;
        assert_eq!(req.arguments.clone().unwrap()["threadId"], 7);
        adapter.respond(&req, Some(json!({"allThreadsContinued": true}))).await;
        adapter.event("continued", Some(json!({"threadId": 7}))).await;
        adapter
            .event("stopped", Some(json!({"reason": "breakpoint", "threadId": 8})))
            .await;
    };

    let (outcome, _) = tokio::join!(debugger.continue_execution(), script);

    assert_eq!(
        outcome.unwrap(),
        StopOutcome::Stopped {
            thread_id: 8,
            reason: "breakpoint".to_string()
        }
    );
    assert_eq!(session(&debugger).thread_id(), Some(8));
    assert_eq!(session(&debugger).state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_step_over_sends_next() {
    let (mut debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("next").await;
        assert_eq!(req.arguments.clone().unwrap()["threadId"], 7);
        adapter.respond(&req, None).await;
        adapter
            .event("stopped", Some(json!({"reason": "step", "threadId": 7})))
            .await;
    };

    let (outcome, _) = tokio::join!(debugger.step_over(), script);
    assert_matches!(outcome, Ok(StopOutcome::Stopped { thread_id: 7, ref reason }) if reason == "step");
}

#[tokio::test]
async fn test_continue_until_exit() {
    let (mut debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("continue").await;
        adapter.respond(&req, None).await;
        adapter.event("exited", Some(json!({"exitCode": 0}))).await;
        adapter.event("terminated", None).await;
    };

    let (outcome, _) = tokio::join!(debugger.continue_execution(), script);

    assert_eq!(outcome.unwrap(), StopOutcome::Exited { exit_code: Some(0) });
    assert_eq!(session(&debugger).state(), SessionState::Terminated);
    assert_eq!(session(&debugger).thread_id(), None);

    assert_matches!(debugger.get_variables().await, Err(Error::Precondition(_)));
}

#[tokio::test]
async fn test_rejected_continue_keeps_session() {
    let (mut debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("continue").await;
        adapter.fail(&req, "Process is not stopped").await;
    };

    let (outcome, _) = tokio::join!(debugger.continue_execution(), script);

    assert_matches!(outcome, Err(Error::AdapterFailure { ref message, .. }) if message == "Process is not stopped");
    assert_eq!(session(&debugger).state(), SessionState::Stopped);
    assert_eq!(session(&debugger).thread_id(), Some(7));
}

#[tokio::test]
async fn test_continue_without_stop_times_out_and_stays_stopped() {
    let (client, mut adapter) = connect(Duration::from_secs(5));
    let mut debugger = Debugger::new(
        EngineConfig::default()
            .with_request_timeout(Duration::from_secs(5))
            .with_event_timeout(Duration::from_millis(200)),
    );
    let (outcome, _) = tokio::join!(
        debugger.launch_with_client(client, LaunchRequest::new("/workspace/target/debug/app")),
        adapter.accept_launch(7)
    );
    outcome.unwrap();

    let script = async {
        let req = adapter.expect_request("continue").await;
        adapter.respond(&req, None).await;
    };

    let (outcome, _) = tokio::join!(debugger.continue_execution(), script);

    assert_matches!(outcome, Err(Error::Timeout { .. }));
    assert_eq!(session(&debugger).state(), SessionState::Stopped);
    assert_eq!(session(&debugger).thread_id(), Some(7));
}

#[tokio::test]
async fn test_terminate_disconnects_and_is_idempotent() {
    let (mut debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("disconnect").await;
        let args = req.arguments.clone().unwrap();
        assert_eq!(args["terminateDebuggee"], true);
        assert_eq!(args["restart"], false);
        adapter.respond(&req, None).await;
    };

    tokio::join!(debugger.terminate(), script);
    assert!(debugger.session().is_none());

    debugger.terminate().await;
    assert_matches!(debugger.continue_execution().await, Err(Error::Precondition(_)));
}

#[tokio::test]
async fn test_terminate_swallows_disconnect_failure() {
    let (mut debugger, mut adapter) = launched(7).await;

    let script = async {
        let req = adapter.expect_request("disconnect").await;
        adapter.fail(&req, "already gone").await;
    };

    tokio::join!(debugger.terminate(), script);
    assert!(debugger.session().is_none());
}

#[tokio::test]
async fn test_second_launch_replaces_first_session() {
    let (mut debugger, mut first) = launched(7).await;
    let first_id = session(&debugger).id.clone();
    let (client, mut second) = connect(Duration::from_secs(5));

    let script = async {
        let disconnect = first.expect_request("disconnect").await;
        first.respond(&disconnect, None).await;
        second.accept_launch(3).await;
    };

    let (outcome, _) = tokio::join!(
        debugger.launch_with_client(client, LaunchRequest::new("./other")),
        script
    );

    let outcome = outcome.unwrap();
    assert_ne!(outcome.session_id, first_id);
    assert_eq!(session(&debugger).thread_id(), Some(3));
    assert_eq!(session(&debugger).program, "./other");
}
