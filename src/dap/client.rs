use super::correlator::{Correlator, PendingResponse};
use super::events::EventDispatcher;
use super::transport::framed;
use super::transport_trait::{MessageReader, MessageWriter};
use super::types::*;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CLIENT_ID: &str = "dap_driver";

/// DAP client: a reader task draining adapter output into the correlator and
/// the event dispatcher, and a writer task owning the adapter's input.
pub struct DapClient {
    correlator: Arc<Correlator>,
    events: Arc<EventDispatcher>,
    connected: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    child: Option<Child>,
}

impl DapClient {
    /// Spawn an adapter speaking DAP over stdio.
    pub async fn spawn(command: &str, args: &[String], request_timeout: Duration) -> Result<Self> {
        info!("Spawning debug adapter: {} {:?}", command, args);

        let child = Command::new(command)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Process(format!("Failed to spawn debug adapter: {}", e)))?;

        Self::from_child(child, request_timeout)
    }

    /// Take over an already spawned adapter with piped stdin/stdout.
    pub fn from_child(mut child: Child, request_timeout: Duration) -> Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Process("Failed to get adapter stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Process("Failed to get adapter stdout".to_string()))?;

        let (reader, writer) = framed(stdout, stdin);
        Ok(Self::with_transport(
            Box::new(reader),
            Box::new(writer),
            Some(child),
            request_timeout,
        ))
    }

    /// Build a client over arbitrary byte streams (adapter output, adapter input).
    pub fn from_streams<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = framed(reader, writer);
        Self::with_transport(Box::new(reader), Box::new(writer), None, request_timeout)
    }

    pub fn with_transport(
        reader: Box<dyn MessageReader>,
        writer: Box<dyn MessageWriter>,
        child: Option<Child>,
        request_timeout: Duration,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let correlator = Arc::new(Correlator::new(write_tx, request_timeout));
        let events = Arc::new(EventDispatcher::new());
        let connected = Arc::new(AtomicBool::new(true));

        let reader_task = tokio::spawn(Self::message_reader(
            reader,
            correlator.clone(),
            events.clone(),
            connected.clone(),
        ));
        let writer_task = tokio::spawn(Self::message_writer(writer, write_rx));

        Self {
            correlator,
            events,
            connected,
            reader_task,
            writer_task,
            child,
        }
    }

    /// Reader task: keeps draining adapter output for the life of the client.
    async fn message_reader(
        mut reader: Box<dyn MessageReader>,
        correlator: Arc<Correlator>,
        events: Arc<EventDispatcher>,
        connected: Arc<AtomicBool>,
    ) {
        loop {
            match reader.read_message().await {
                Ok(Message::Response(resp)) => {
                    correlator.resolve(resp);
                }
                Ok(Message::Event(event)) => {
                    info!(event = %event.event, "Event received");
                    events.dispatch(&event);
                }
                Ok(Message::Request(req)) => {
                    warn!(
                        command = %req.command,
                        "Adapter sent a reverse request, which is not supported"
                    );
                    if let Err(e) = correlator.reject_reverse_request(&req, "Not supported") {
                        warn!("Could not reject reverse request: {}", e);
                    }
                }
                Err(Error::Decode {
                    message,
                    fatal: false,
                }) => {
                    warn!("Skipping undecodable frame: {}", message);
                }
                Err(Error::Decode {
                    message,
                    fatal: true,
                }) => {
                    error!(
                        "Adapter output is malformed ({}); further output will be discarded",
                        message
                    );
                }
                Err(Error::AdapterExited) => {
                    warn!("Debug adapter closed its output stream");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from debug adapter: {}", e);
                    break;
                }
            }
        }
        connected.store(false, Ordering::SeqCst);
    }

    async fn message_writer(
        mut writer: Box<dyn MessageWriter>,
        mut write_rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(message) = write_rx.recv().await {
            if let Err(e) = writer.write_message(&message).await {
                error!("Failed to write DAP message: {}", e);
                break;
            }
        }
        debug!("Writer task exiting");
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// False once the adapter's output stream has ended.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn request_timeout(&self) -> Duration {
        self.correlator.request_timeout()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Send without waiting; the returned handle resolves later.
    pub fn send_request(&self, command: &str, arguments: Option<Value>) -> Result<PendingResponse> {
        self.correlator.send(command, arguments)
    }

    /// Send and wait for a successful response body.
    pub async fn request(&self, command: &str, arguments: Option<Value>) -> Result<Option<Value>> {
        self.send_request(command, arguments)?.body().await
    }

    pub async fn initialize(&self, adapter_id: &str) -> Result<Capabilities> {
        let args = InitializeRequestArguments {
            client_id: Some(CLIENT_ID.to_string()),
            client_name: Some(CLIENT_ID.to_string()),
            adapter_id: adapter_id.to_string(),
            locale: Some("en-US".to_string()),
            lines_start_at_1: Some(true),
            columns_start_at_1: Some(true),
            path_format: Some("path".to_string()),
        };

        let body = self
            .request("initialize", Some(serde_json::to_value(args)?))
            .await?;

        match body {
            Some(body) => parse_body("initialize", body),
            None => Ok(Capabilities::default()),
        }
    }

    /// Send `launch` without waiting: adapters may hold the response until
    /// configuration is done.
    pub fn launch(&self, args: Value) -> Result<PendingResponse> {
        self.send_request("launch", Some(args))
    }

    pub async fn configuration_done(&self) -> Result<()> {
        self.request("configurationDone", None).await.map(|_| ())
    }

    /// Replace the breakpoints of one source file.
    pub async fn set_breakpoints(&self, path: &str, lines: &[i32]) -> Result<Vec<Breakpoint>> {
        let args = SetBreakpointsArguments {
            source: Source {
                name: std::path::Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                path: Some(path.to_string()),
            },
            breakpoints: lines.iter().map(|&line| SourceBreakpoint { line }).collect(),
        };

        #[derive(serde::Deserialize)]
        struct SetBreakpointsResponse {
            #[serde(default)]
            breakpoints: Vec<Breakpoint>,
        }

        let body = self
            .request("setBreakpoints", Some(serde_json::to_value(args)?))
            .await?;
        let parsed: SetBreakpointsResponse = match body {
            Some(body) => parse_body("setBreakpoints", body)?,
            None => SetBreakpointsResponse {
                breakpoints: Vec::new(),
            },
        };

        Ok(parsed.breakpoints)
    }

    /// Queue `continue`; the caller is expected to have armed a `stopped` waiter.
    pub fn continue_execution(&self, thread_id: i32) -> Result<PendingResponse> {
        let args = ThreadArguments { thread_id };
        self.send_request("continue", Some(serde_json::to_value(args)?))
    }

    /// Queue `next` (step over).
    pub fn next(&self, thread_id: i32) -> Result<PendingResponse> {
        let args = ThreadArguments { thread_id };
        self.send_request("next", Some(serde_json::to_value(args)?))
    }

    pub async fn stack_trace(&self, thread_id: i32, levels: Option<i32>) -> Result<Vec<StackFrame>> {
        let args = StackTraceArguments {
            thread_id,
            start_frame: Some(0),
            levels,
        };

        #[derive(serde::Deserialize)]
        struct StackTraceResponse {
            #[serde(rename = "stackFrames", default)]
            stack_frames: Vec<StackFrame>,
        }

        let body = self
            .request("stackTrace", Some(serde_json::to_value(args)?))
            .await?
            .ok_or_else(|| missing_body("stackTrace"))?;
        let parsed: StackTraceResponse = parse_body("stackTrace", body)?;
        Ok(parsed.stack_frames)
    }

    pub async fn scopes(&self, frame_id: i32) -> Result<Vec<Scope>> {
        let args = ScopesArguments { frame_id };

        #[derive(serde::Deserialize)]
        struct ScopesResponse {
            #[serde(default)]
            scopes: Vec<Scope>,
        }

        let body = self
            .request("scopes", Some(serde_json::to_value(args)?))
            .await?
            .ok_or_else(|| missing_body("scopes"))?;
        let parsed: ScopesResponse = parse_body("scopes", body)?;
        Ok(parsed.scopes)
    }

    pub async fn variables(&self, variables_reference: i32) -> Result<Vec<Variable>> {
        let args = VariablesArguments {
            variables_reference,
        };

        #[derive(serde::Deserialize)]
        struct VariablesResponse {
            #[serde(default)]
            variables: Vec<Variable>,
        }

        let body = self
            .request("variables", Some(serde_json::to_value(args)?))
            .await?
            .ok_or_else(|| missing_body("variables"))?;
        let parsed: VariablesResponse = parse_body("variables", body)?;
        Ok(parsed.variables)
    }

    pub async fn disconnect(&self, terminate_debuggee: bool) -> Result<()> {
        let args = DisconnectArguments {
            restart: false,
            terminate_debuggee,
        };
        self.request("disconnect", Some(serde_json::to_value(args)?))
            .await
            .map(|_| ())
    }

    /// Stop the I/O tasks and kill the adapter process.
    pub async fn shutdown(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("Adapter already gone: {}", e);
            }
            match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
                Ok(Ok(status)) => info!("Debug adapter exited with {}", status),
                Ok(Err(e)) => warn!("Failed to reap debug adapter: {}", e),
                Err(_) => warn!("Debug adapter did not exit within 2s of kill"),
            }
        }
    }
}

impl Drop for DapClient {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

fn parse_body<T: DeserializeOwned>(command: &str, body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::AdapterFailure {
        command: command.to_string(),
        message: format!("Malformed '{}' response: {}", command, e),
    })
}

fn missing_body(command: &str) -> Error {
    Error::AdapterFailure {
        command: command.to_string(),
        message: format!("Adapter sent no body for '{}'", command),
    }
}
