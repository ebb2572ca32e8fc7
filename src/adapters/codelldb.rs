//! CodeLLDB (vadimcn.vscode-lldb) adapter
//!
//! CodeLLDB 1.11+ speaks DAP over STDIO when started without `--port`, so the
//! adapter is spawned with piped stdin/stdout and no arguments.
//!
//! Discovery order:
//! 1. Explicit override (`--adapter-path`, else `DAP_DRIVER_ADAPTER`). An
//!    override that does not exist is an error, there is no fallback.
//! 2. Fixed install locations (container and system installs).
//! 3. `codelldb` on `PATH`.

use super::logging::DebugAdapterLogger;
use crate::config::ADAPTER_PATH_ENV;
use crate::debug::state::LaunchRequest;
use crate::{Error, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const ADAPTER_ID: &str = "codelldb";

const BINARY_NAME: &str = "codelldb";

const SEARCH_PATH: &[&str] = &[
    "/usr/local/lib/codelldb/adapter/codelldb",
    "/usr/local/bin/codelldb",
    "/usr/bin/codelldb",
    "~/.local/share/codelldb/adapter/codelldb",
];

#[derive(Debug, Clone, PartialEq)]
pub struct CodeLldbAdapter {
    path: PathBuf,
}

impl CodeLldbAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the adapter binary. Nothing is spawned here.
    pub fn discover(override_path: Option<&str>) -> Result<Self> {
        let mut candidates: Vec<PathBuf> = SEARCH_PATH.iter().map(|p| expand(p)).collect();
        if let Some(path) = std::env::var_os("PATH") {
            candidates.extend(std::env::split_paths(&path).map(|dir| dir.join(BINARY_NAME)));
        }
        Self::discover_in(override_path, &candidates)
    }

    /// Discovery against an explicit candidate list.
    pub fn discover_in(override_path: Option<&str>, candidates: &[PathBuf]) -> Result<Self> {
        if let Some(path) = override_path {
            let expanded = expand(path);
            if expanded.is_file() {
                debug!("Using adapter override: {}", expanded.display());
                return Ok(Self::new(expanded));
            }
            return Err(Error::AdapterNotFound(format!(
                "{} does not exist (set via --adapter-path or {})",
                expanded.display(),
                ADAPTER_PATH_ENV
            )));
        }

        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            return Ok(Self::new(found.clone()));
        }

        Err(Error::AdapterNotFound(format!(
            "{} not found in {} locations; install CodeLLDB or set {}",
            BINARY_NAME,
            candidates.len(),
            ADAPTER_PATH_ENV
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn command(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Empty: STDIO mode.
    pub fn args(&self) -> Vec<String> {
        vec![]
    }

    /// Body of the `launch` request.
    pub fn launch_arguments(request: &LaunchRequest) -> Value {
        let mut launch = json!({
            "type": "lldb",
            "request": "launch",
            "program": request.program,
            "args": request.args,
            "stopOnEntry": request.stop_on_entry,
            // Keeps the debuggee's output off the adapter channel and avoids runInTerminal.
            "terminal": "console",
        });

        if let Some(cwd) = &request.cwd {
            launch["cwd"] = json!(cwd);
        }

        launch
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl DebugAdapterLogger for CodeLldbAdapter {
    fn adapter_name(&self) -> &str {
        "CodeLLDB"
    }

    fn adapter_id(&self) -> &str {
        ADAPTER_ID
    }

    fn transport_type(&self) -> &str {
        "STDIO"
    }

    fn command_line(&self) -> String {
        self.command()
    }

    fn log_spawn_error(&self, error: &dyn std::error::Error) {
        error!("❌ [CODELLDB] Failed to spawn CodeLLDB: {}", error);
        error!("   Command: {}", self.command_line());
        error!("   ");
        error!("   Possible causes:");
        error!("   1. Binary is not executable");
        error!("   2. CodeLLDB older than 1.11 (no STDIO mode)");
        error!("   ");
        error!("   Troubleshooting:");
        error!("   $ {} --version", self.command_line());
    }

    fn log_init_error(&self, error: &dyn std::error::Error) {
        error!("❌ [CODELLDB] DAP startup failed: {}", error);
        error!("   CodeLLDB started but the session did not reach its first stop");
        error!("   ");
        error!("   Possible causes:");
        error!("   1. Program path doesn't exist or is not executable");
        error!("   2. Program was not built with debug info");
        error!("   3. Program ran to completion without hitting a breakpoint");
    }
}
