use std::time::Duration;

/// Default window for a single request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default window for waiting on `initialized` / `stopped` events.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable that overrides adapter discovery.
pub const ADAPTER_PATH_ENV: &str = "DAP_DRIVER_ADAPTER";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub request_timeout: Duration,
    pub event_timeout: Duration,
    /// Explicit adapter binary; takes precedence over the env var and the
    /// built-in search path.
    pub adapter_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            adapter_path: None,
        }
    }
}

impl EngineConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    pub fn with_adapter_path(mut self, path: impl Into<String>) -> Self {
        self.adapter_path = Some(path.into());
        self
    }

    /// The adapter override in effect: the explicit path, else the env var.
    pub fn adapter_override(&self) -> Option<String> {
        self.adapter_path
            .clone()
            .or_else(|| std::env::var(ADAPTER_PATH_ENV).ok())
            .filter(|p| !p.trim().is_empty())
    }
}
