use crate::dap::types::{Breakpoint, Variable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one debug session.
///
/// The startup states are passed through in order during `launch`; afterwards
/// the session moves between `Running` and `Stopped` until it reaches
/// `Terminated`, which is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Initializing,
    AwaitingInitialized,
    AwaitingConfigurationAck,
    AwaitingFirstStop,
    Running,
    Stopped,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::AwaitingInitialized => "awaiting initialized",
            SessionState::AwaitingConfigurationAck => "awaiting configurationDone",
            SessionState::AwaitingFirstStop => "awaiting first stop",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What ended a wait for the program to halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StopOutcome {
    #[serde(rename_all = "camelCase")]
    Stopped { thread_id: i32, reason: String },
    #[serde(rename_all = "camelCase")]
    Exited { exit_code: Option<i32> },
}

impl StopOutcome {
    pub fn thread_id(&self) -> Option<i32> {
        match self {
            StopOutcome::Stopped { thread_id, .. } => Some(*thread_id),
            StopOutcome::Exited { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointLocation {
    pub file: String,
    pub line: i32,
}

/// Parameters for starting a program under the debugger.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub stop_on_entry: bool,
    /// Installed between `initialized` and `configurationDone`.
    #[serde(default)]
    pub breakpoints: Vec<BreakpointLocation>,
}

impl LaunchRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn stop_on_entry(mut self, stop: bool) -> Self {
        self.stop_on_entry = stop;
        self
    }

    pub fn with_breakpoint(mut self, file: impl Into<String>, line: i32) -> Self {
        self.breakpoints.push(BreakpointLocation {
            file: file.into(),
            line,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    pub session_id: String,
    pub stop: StopOutcome,
    pub breakpoints: Vec<BreakpointDescriptor>,
}

/// A requested breakpoint paired with what the adapter made of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointDescriptor {
    pub id: i32,
    pub file: String,
    /// Resolved line; the requested line when the adapter did not say.
    pub line: i32,
    pub requested_line: i32,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BreakpointDescriptor {
    /// `index` stands in for the id when the adapter assigned none.
    pub fn from_adapter(index: usize, file: &str, requested_line: i32, bp: Breakpoint) -> Self {
        Self {
            id: bp.id.unwrap_or(index as i32),
            file: file.to_string(),
            line: bp.line.unwrap_or(requested_line),
            requested_line,
            verified: bp.verified,
            message: bp.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableNode {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Non-zero when the value has children that can be expanded.
    pub variables_reference: i32,
}

impl From<Variable> for VariableNode {
    fn from(var: Variable) -> Self {
        Self {
            name: var.name,
            value: var.value,
            type_name: var.type_,
            variables_reference: var.variables_reference,
        }
    }
}
