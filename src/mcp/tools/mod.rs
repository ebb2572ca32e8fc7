use crate::debug::{Debugger, LaunchRequest, StopOutcome};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointArgs {
    pub file: String,
    pub line: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandVariableArgs {
    pub variables_reference: i32,
}

/// Tool calls are serialized on the debugger lock, so at most one session
/// operation is in flight at a time.
pub struct ToolsHandler {
    debugger: Arc<Mutex<Debugger>>,
}

impl ToolsHandler {
    pub fn new(debugger: Arc<Mutex<Debugger>>) -> Self {
        Self { debugger }
    }

    pub async fn handle_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        debug!("Calling tool {}", name);
        match name {
            "debugger_launch" => self.debugger_launch(arguments).await,
            "debugger_continue" => self.debugger_continue().await,
            "debugger_step_over" => self.debugger_step_over().await,
            "debugger_get_variables" => self.debugger_get_variables().await,
            "debugger_expand_variable" => self.debugger_expand_variable(arguments).await,
            "debugger_set_breakpoint" => self.debugger_set_breakpoint(arguments).await,
            "debugger_terminate" => self.debugger_terminate().await,
            _ => Err(Error::MethodNotFound(name.to_string())),
        }
    }

    async fn debugger_launch(&self, arguments: Value) -> Result<Value> {
        let request: LaunchRequest = parse_args("debugger_launch", arguments)?;

        let mut debugger = self.debugger.lock().await;
        let outcome = debugger.launch(request).await?;

        Ok(json!({
            "success": true,
            "sessionId": outcome.session_id,
            "stop": outcome.stop,
            "breakpoints": outcome.breakpoints,
        }))
    }

    async fn debugger_continue(&self) -> Result<Value> {
        let outcome = self.debugger.lock().await.continue_execution().await?;
        Ok(stop_result(outcome))
    }

    async fn debugger_step_over(&self) -> Result<Value> {
        let outcome = self.debugger.lock().await.step_over().await?;
        Ok(stop_result(outcome))
    }

    async fn debugger_get_variables(&self) -> Result<Value> {
        let variables = self.debugger.lock().await.get_variables().await?;
        Ok(json!({
            "success": true,
            "variables": variables,
        }))
    }

    async fn debugger_expand_variable(&self, arguments: Value) -> Result<Value> {
        let args: ExpandVariableArgs = parse_args("debugger_expand_variable", arguments)?;
        let variables = self
            .debugger
            .lock()
            .await
            .expand_variable(args.variables_reference)
            .await?;

        Ok(json!({
            "success": true,
            "variables": variables,
        }))
    }

    async fn debugger_set_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: SetBreakpointArgs = parse_args("debugger_set_breakpoint", arguments)?;
        let breakpoints = self
            .debugger
            .lock()
            .await
            .set_breakpoint(&args.file, args.line)
            .await?;

        Ok(json!({
            "success": true,
            "breakpoints": breakpoints,
        }))
    }

    async fn debugger_terminate(&self) -> Result<Value> {
        self.debugger.lock().await.terminate().await;
        Ok(json!({ "success": true }))
    }

    pub fn list_tools() -> Vec<Value> {
        let no_arguments = json!({ "type": "object", "properties": {} });

        vec![
            json!({
                "name": "debugger_launch",
                "description": "Launch a program under CodeLLDB and wait until it first stops",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "program": {
                            "type": "string",
                            "description": "Path to the compiled program to debug"
                        },
                        "args": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Command-line arguments for the program"
                        },
                        "cwd": {
                            "type": "string",
                            "description": "Working directory for the program"
                        },
                        "stopOnEntry": {
                            "type": "boolean",
                            "description": "Stop at the program entry point"
                        },
                        "breakpoints": {
                            "type": "array",
                            "description": "Breakpoints installed before the program starts",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "file": { "type": "string" },
                                    "line": { "type": "integer" }
                                },
                                "required": ["file", "line"]
                            }
                        }
                    },
                    "required": ["program"]
                }
            }),
            json!({
                "name": "debugger_continue",
                "description": "Resume execution and wait for the next stop",
                "inputSchema": no_arguments,
            }),
            json!({
                "name": "debugger_step_over",
                "description": "Step over the current line and wait for the next stop",
                "inputSchema": no_arguments,
            }),
            json!({
                "name": "debugger_get_variables",
                "description": "List the variables of the top stack frame",
                "inputSchema": no_arguments,
            }),
            json!({
                "name": "debugger_expand_variable",
                "description": "List the children of a structured variable",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "variablesReference": {
                            "type": "integer",
                            "description": "variablesReference from an earlier listing"
                        }
                    },
                    "required": ["variablesReference"]
                }
            }),
            json!({
                "name": "debugger_set_breakpoint",
                "description": "Set a breakpoint in a source file",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "file": {
                            "type": "string",
                            "description": "Path to the source file"
                        },
                        "line": {
                            "type": "integer",
                            "description": "Line number (1-indexed)"
                        }
                    },
                    "required": ["file", "line"]
                }
            }),
            json!({
                "name": "debugger_terminate",
                "description": "End the debug session and the debugged program",
                "inputSchema": no_arguments,
            }),
        ]
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| Error::InvalidRequest(format!("Invalid arguments for {}: {}", tool, e)))
}

fn stop_result(outcome: StopOutcome) -> Value {
    json!({
        "success": true,
        "stop": outcome,
    })
}
