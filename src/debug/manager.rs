use super::session::DebugSession;
use super::state::{BreakpointDescriptor, LaunchOutcome, LaunchRequest, StopOutcome, VariableNode};
use crate::adapters::codelldb::{CodeLldbAdapter, ADAPTER_ID};
use crate::adapters::logging::DebugAdapterLogger;
use crate::config::EngineConfig;
use crate::dap::client::DapClient;
use crate::{Error, Result};
use tracing::info;

/// Owns at most one debug session at a time.
///
/// Every operation other than `launch` and `terminate` needs a live session
/// and fails with a precondition error, without any I/O, when there is none.
pub struct Debugger {
    config: EngineConfig,
    session: Option<DebugSession>,
    /// Adapter behind the current session when this debugger spawned it.
    adapter: Option<CodeLldbAdapter>,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Debugger {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            session: None,
            adapter: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&DebugSession> {
        self.session.as_ref()
    }

    /// Discover and spawn the adapter, then run the startup exchange. Any
    /// previous session is terminated first.
    pub async fn launch(&mut self, request: LaunchRequest) -> Result<LaunchOutcome> {
        self.terminate().await;

        let adapter = CodeLldbAdapter::discover(self.config.adapter_override().as_deref())?;
        adapter.log_selection();
        adapter.log_spawn_attempt();

        let client =
            match DapClient::spawn(&adapter.command(), &adapter.args(), self.config.request_timeout)
                .await
            {
                Ok(client) => client,
                Err(e) => {
                    adapter.log_spawn_error(&e);
                    return Err(e);
                }
            };
        adapter.log_connection_success();

        match self.launch_with_client(client, request).await {
            Ok(outcome) => {
                self.adapter = Some(adapter);
                Ok(outcome)
            }
            Err(e) => {
                adapter.log_init_error(&e);
                Err(e)
            }
        }
    }

    /// Run the startup exchange over an already connected client.
    pub async fn launch_with_client(
        &mut self,
        client: DapClient,
        request: LaunchRequest,
    ) -> Result<LaunchOutcome> {
        self.terminate().await;

        let launch_args = CodeLldbAdapter::launch_arguments(&request);
        let (session, stop, breakpoints) = DebugSession::launch(
            client,
            ADAPTER_ID,
            launch_args,
            &request,
            self.config.event_timeout,
        )
        .await?;

        let outcome = LaunchOutcome {
            session_id: session.id.clone(),
            stop,
            breakpoints,
        };
        self.session = Some(session);
        Ok(outcome)
    }

    pub async fn continue_execution(&mut self) -> Result<StopOutcome> {
        self.active_mut()?.continue_execution().await
    }

    pub async fn step_over(&mut self) -> Result<StopOutcome> {
        self.active_mut()?.step_over().await
    }

    pub async fn get_variables(&self) -> Result<Vec<VariableNode>> {
        self.active()?.get_variables().await
    }

    pub async fn expand_variable(&self, variables_reference: i32) -> Result<Vec<VariableNode>> {
        self.active()?.expand_variable(variables_reference).await
    }

    pub async fn set_breakpoint(&self, file: &str, line: i32) -> Result<Vec<BreakpointDescriptor>> {
        self.active()?.set_breakpoint(file, line).await
    }

    /// Safe to call at any time; there is nothing to report on failure.
    pub async fn terminate(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, "Terminating debug session");
            session.terminate().await;
        }
        if let Some(adapter) = self.adapter.take() {
            adapter.log_shutdown();
        }
    }

    fn active(&self) -> Result<&DebugSession> {
        self.session.as_ref().ok_or_else(Error::no_session)
    }

    fn active_mut(&mut self) -> Result<&mut DebugSession> {
        self.session.as_mut().ok_or_else(Error::no_session)
    }
}
