//! One debug target driven through one adapter connection.
//!
//! Startup is a fixed exchange:
//!
//! ```text
//! initialize ─► (arm initialized) launch ─► (arm stopped) ─► initialized
//!            ─► [initial setBreakpoints] ─► configurationDone ─► stopped
//! ```
//!
//! Waiters are always armed before the request that can trigger their event,
//! because events are never replayed to late subscribers.

use super::state::{
    BreakpointDescriptor, BreakpointLocation, LaunchRequest, SessionState, StopOutcome,
    VariableNode,
};
use crate::dap::client::DapClient;
use crate::dap::events::{body_field, EventWaiter};
use crate::dap::types::{Event, StoppedEventBody};
use crate::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const INITIALIZED: &str = "initialized";
const STOP_EVENTS: &[&str] = &["stopped", "terminated", "exited"];

/// Upper bound on the best-effort `disconnect` during teardown.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct DebugSession {
    pub id: String,
    pub program: String,
    client: DapClient,
    state: SessionState,
    thread_id: Option<i32>,
    event_timeout: Duration,
}

impl DebugSession {
    /// Wrap a connected client without talking to it yet.
    pub fn new(client: DapClient, program: impl Into<String>, event_timeout: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            program: program.into(),
            client,
            state: SessionState::Idle,
            thread_id: None,
            event_timeout,
        }
    }

    /// Run the startup exchange. On any failure the adapter is torn down
    /// before the error is returned.
    pub async fn launch(
        client: DapClient,
        adapter_id: &str,
        launch_args: Value,
        request: &LaunchRequest,
        event_timeout: Duration,
    ) -> Result<(Self, StopOutcome, Vec<BreakpointDescriptor>)> {
        let mut session = Self::new(client, request.program.clone(), event_timeout);
        info!(session = %session.id, program = %session.program, "🚀 Launching debug session");

        match session
            .start(adapter_id, launch_args, &request.breakpoints)
            .await
        {
            Ok((outcome, breakpoints)) => Ok((session, outcome, breakpoints)),
            Err(e) => {
                error!(
                    session = %session.id,
                    state = %session.state,
                    "❌ Launch failed: {}", e
                );
                session.terminate().await;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn thread_id(&self) -> Option<i32> {
        self.thread_id
    }

    pub fn client(&self) -> &DapClient {
        &self.client
    }

    async fn start(
        &mut self,
        adapter_id: &str,
        launch_args: Value,
        breakpoints: &[BreakpointLocation],
    ) -> Result<(StopOutcome, Vec<BreakpointDescriptor>)> {
        self.state = SessionState::Initializing;
        let capabilities = self.client.initialize(adapter_id).await?;
        debug!(session = %self.id, ?capabilities, "Adapter capabilities");

        self.state = SessionState::AwaitingInitialized;
        let initialized = self.client.events().arm(&[INITIALIZED]);
        let launch = self.client.launch(launch_args)?;
        let first_stop = self.client.events().arm(STOP_EVENTS);

        self.await_initialized(initialized, Box::pin(launch.body()))
            .await?;

        let descriptors = self.install_initial_breakpoints(breakpoints).await;

        self.state = SessionState::AwaitingConfigurationAck;
        self.client.configuration_done().await?;

        self.state = SessionState::AwaitingFirstStop;
        let outcome = self.await_stop(first_stop).await?;
        info!(session = %self.id, ?outcome, "✅ Debug session ready");

        Ok((outcome, descriptors))
    }

    /// Wait for `initialized` while the `launch` response is outstanding.
    /// An adapter that rejects `launch` outright fails the launch at once;
    /// any other launch result is only logged.
    async fn await_initialized<F>(
        &self,
        initialized: EventWaiter,
        mut launch_response: std::pin::Pin<Box<F>>,
    ) -> Result<()>
    where
        F: Future<Output = Result<Option<Value>>> + Send + 'static,
    {
        let initialized = initialized.wait(self.event_timeout);
        tokio::pin!(initialized);

        tokio::select! {
            launched = &mut launch_response => {
                match launched {
                    Ok(_) => debug!(session = %self.id, "Launch acknowledged before initialized"),
                    Err(e @ Error::AdapterFailure { .. }) => return Err(e),
                    Err(e) => warn!(session = %self.id, "Launch response: {}", e),
                }
                initialized.await?;
            }
            event = &mut initialized => {
                event?;
                let session = self.id.clone();
                tokio::spawn(async move {
                    match launch_response.await {
                        Ok(_) => debug!(%session, "Launch acknowledged"),
                        Err(e) => warn!(%session, "Launch request reported failure: {}", e),
                    }
                });
            }
        }

        debug!(session = %self.id, "📡 Received initialized");
        Ok(())
    }

    /// Breakpoints requested at launch, one `setBreakpoints` per file. A
    /// failure here is logged and the launch carries on.
    async fn install_initial_breakpoints(
        &self,
        breakpoints: &[BreakpointLocation],
    ) -> Vec<BreakpointDescriptor> {
        let mut by_file: Vec<(&str, Vec<i32>)> = Vec::new();
        for bp in breakpoints {
            match by_file.iter_mut().find(|(file, _)| *file == bp.file) {
                Some((_, lines)) => lines.push(bp.line),
                None => by_file.push((&bp.file, vec![bp.line])),
            }
        }

        let mut descriptors = Vec::new();
        for (file, lines) in by_file {
            match self.client.set_breakpoints(file, &lines).await {
                Ok(result) => {
                    info!(session = %self.id, file, count = result.len(), "Applied breakpoints");
                    // Fallback ids count across all files.
                    for (idx, bp) in result.into_iter().enumerate() {
                        let requested = lines.get(idx).copied().unwrap_or(lines[0]);
                        let position = descriptors.len();
                        descriptors.push(BreakpointDescriptor::from_adapter(
                            position, file, requested, bp,
                        ));
                    }
                }
                Err(e) => warn!(session = %self.id, file, "⚠️  Failed to apply breakpoints: {}", e),
            }
        }
        descriptors
    }

    /// Resume until the next stop.
    pub async fn continue_execution(&mut self) -> Result<StopOutcome> {
        let thread_id = self.require_thread()?;
        let stop = self.client.events().arm(STOP_EVENTS);

        self.client.continue_execution(thread_id)?.body().await?;
        debug!(session = %self.id, thread_id, "▶️  Continued");

        self.run_until_stop(stop).await
    }

    /// Step over the current line and wait for the resulting stop.
    pub async fn step_over(&mut self) -> Result<StopOutcome> {
        let thread_id = self.require_thread()?;
        let stop = self.client.events().arm(STOP_EVENTS);

        self.client.next(thread_id)?.body().await?;
        debug!(session = %self.id, thread_id, "Stepping over");

        self.run_until_stop(stop).await
    }

    /// `Running` while the stop is awaited; a failed wait puts the prior
    /// state back.
    async fn run_until_stop(&mut self, stop: EventWaiter) -> Result<StopOutcome> {
        let prior = self.state;
        self.state = SessionState::Running;

        let result = self.await_stop(stop).await;
        if let Err(e) = &result {
            warn!(session = %self.id, state = %prior, "No stop after resuming: {}", e);
            self.state = prior;
        }
        result
    }

    /// Variables of every scope in the top frame of the active thread, flattened.
    pub async fn get_variables(&self) -> Result<Vec<VariableNode>> {
        let thread_id = self.require_thread()?;

        let frames = self.client.stack_trace(thread_id, Some(1)).await?;
        let frame = frames.first().ok_or_else(|| Error::AdapterFailure {
            command: "stackTrace".to_string(),
            message: format!("Thread {} has no stack frames", thread_id),
        })?;
        debug!(session = %self.id, frame_id = frame.id, frame = %frame.name, "Inspecting frame");

        let scopes = self.client.scopes(frame.id).await?;

        let mut nodes = Vec::new();
        for scope in scopes.iter().filter(|s| s.variables_reference != 0) {
            let variables = self.client.variables(scope.variables_reference).await?;
            nodes.extend(variables.into_iter().map(VariableNode::from));
        }
        Ok(nodes)
    }

    /// Children of a structured value from an earlier inspection.
    pub async fn expand_variable(&self, variables_reference: i32) -> Result<Vec<VariableNode>> {
        self.require_thread()?;
        if variables_reference <= 0 {
            return Err(Error::Precondition(format!(
                "Variable reference {} has no children",
                variables_reference
            )));
        }

        let variables = self.client.variables(variables_reference).await?;
        Ok(variables.into_iter().map(VariableNode::from).collect())
    }

    /// Sends a one-entry breakpoint list for `file`; the adapter may drop
    /// breakpoints set earlier in the same file.
    pub async fn set_breakpoint(&self, file: &str, line: i32) -> Result<Vec<BreakpointDescriptor>> {
        self.require_thread()?;

        let breakpoints = self.client.set_breakpoints(file, &[line]).await?;
        info!(session = %self.id, file, line, count = breakpoints.len(), "🎯 Breakpoint set");

        Ok(breakpoints
            .into_iter()
            .enumerate()
            .map(|(idx, bp)| BreakpointDescriptor::from_adapter(idx, file, line, bp))
            .collect())
    }

    /// Best-effort `disconnect`, then the adapter process is ended regardless.
    pub async fn terminate(mut self) {
        if self.client.is_connected() {
            match tokio::time::timeout(DISCONNECT_TIMEOUT, self.client.disconnect(true)).await {
                Ok(Ok(())) => debug!(session = %self.id, "Disconnect acknowledged"),
                Ok(Err(e)) => debug!(session = %self.id, "Disconnect failed (ignored): {}", e),
                Err(_) => debug!(session = %self.id, "Disconnect timed out (ignored)"),
            }
        }

        self.client.shutdown().await;
        self.state = SessionState::Terminated;
        self.thread_id = None;
        info!(session = %self.id, "🛑 Debug session terminated");
    }

    async fn await_stop(&mut self, waiter: EventWaiter) -> Result<StopOutcome> {
        let event = waiter.wait(self.event_timeout).await?;
        let outcome = self.stop_outcome(&event)?;

        match &outcome {
            StopOutcome::Stopped { thread_id, reason } => {
                info!(session = %self.id, thread_id, %reason, "📍 Stopped");
                self.thread_id = Some(*thread_id);
                self.state = SessionState::Stopped;
            }
            StopOutcome::Exited { exit_code } => {
                info!(session = %self.id, ?exit_code, "🚪 Program finished");
                self.thread_id = None;
                self.state = SessionState::Terminated;
            }
        }
        Ok(outcome)
    }

    fn stop_outcome(&self, event: &Event) -> Result<StopOutcome> {
        if event.event != "stopped" {
            let exit_code = body_field(event, "exitCode")
                .and_then(Value::as_i64)
                .map(|code| code as i32);
            return Ok(StopOutcome::Exited { exit_code });
        }

        let body: StoppedEventBody = match &event.body {
            Some(body) => serde_json::from_value(body.clone()).map_err(|e| Error::AdapterFailure {
                command: "stopped".to_string(),
                message: format!("Malformed 'stopped' event: {}", e),
            })?,
            None => StoppedEventBody::default(),
        };

        // Adapters may omit threadId when all threads stopped; keep the last one.
        let thread_id = body
            .thread_id
            .or(self.thread_id)
            .ok_or_else(|| Error::AdapterFailure {
                command: "stopped".to_string(),
                message: "'stopped' event carried no threadId".to_string(),
            })?;

        Ok(StopOutcome::Stopped {
            thread_id,
            reason: body.reason,
        })
    }

    fn require_thread(&self) -> Result<i32> {
        self.thread_id.ok_or_else(Error::no_thread)
    }
}
