use std::error::Error;
use tracing::{debug, info};

/// Logging contract for debug adapters
///
/// Every adapter logs the same lifecycle points in order so a session can
/// be followed in the log regardless of which adapter ran it:
///
/// 1. Selection (`log_selection`) - where the binary was found
/// 2. Spawn (`log_spawn_attempt`) - process starting
/// 3. Connection (`log_connection_success`) - ready for DAP
/// 4. Shutdown (`log_shutdown`) - cleanup
///
/// Errors are logged via `log_spawn_error` and `log_init_error`, which each
/// adapter implements with its own troubleshooting hints.
pub trait DebugAdapterLogger {
    /// Human readable adapter name: "CodeLLDB"
    fn adapter_name(&self) -> &str;

    /// `adapterID` sent in the `initialize` request
    fn adapter_id(&self) -> &str;

    /// Transport mechanism: "STDIO"
    fn transport_type(&self) -> &str;

    /// Full command line that will be executed
    fn command_line(&self) -> String;

    /// Log adapter selection
    ///
    /// Default format:
    /// ```text
    /// 🦀 [CODELLDB] Adapter selected: codelldb
    ///    Transport: STDIO
    ///    Command: /usr/local/bin/codelldb
    /// ```
    fn log_selection(&self) {
        info!(
            "🦀 [{}] Adapter selected: {}",
            self.adapter_name().to_uppercase(),
            self.adapter_id()
        );
        info!("   Transport: {}", self.transport_type());
        info!("   Command: {}", self.command_line());
    }

    fn log_spawn_attempt(&self) {
        info!(
            "🚀 [{}] Spawning adapter process",
            self.adapter_name().to_uppercase()
        );
        debug!("   Command: {}", self.command_line());
    }

    fn log_connection_success(&self) {
        info!(
            "✅ [{}] Adapter connected and ready",
            self.adapter_name().to_uppercase()
        );
    }

    fn log_shutdown(&self) {
        info!(
            "🛑 [{}] Shutting down adapter",
            self.adapter_name().to_uppercase()
        );
    }

    /// Log spawn error with the failing command and troubleshooting steps
    fn log_spawn_error(&self, error: &dyn Error);

    /// Log a failed DAP startup exchange (initialize through first stop)
    fn log_init_error(&self, error: &dyn Error);
}
