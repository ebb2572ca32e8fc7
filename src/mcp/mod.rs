pub mod protocol;
pub mod tools;
pub mod transport;
pub mod transport_trait;

use crate::config::EngineConfig;
use crate::debug::Debugger;
use crate::{Error, Result};
use protocol::{JsonRpcMessage, JsonRpcResponse, ProtocolHandler};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tools::ToolsHandler;
use tracing::{error, info, warn};
use transport::StdioTransport;
use transport_trait::McpTransportTrait;

pub struct McpServer {
    debugger: Arc<Mutex<Debugger>>,
    handler: ProtocolHandler,
}

impl McpServer {
    pub fn new(config: EngineConfig) -> Self {
        info!("Initializing MCP server");

        let debugger = Arc::new(Mutex::new(Debugger::new(config)));
        let tools_handler = Arc::new(ToolsHandler::new(Arc::clone(&debugger)));

        Self {
            debugger,
            handler: ProtocolHandler::new(tools_handler),
        }
    }

    /// Serve on stdin/stdout until the client closes its end.
    pub async fn run(self) -> Result<()> {
        self.run_on(StdioTransport::stdio()).await
    }

    pub async fn run_on<T: McpTransportTrait>(mut self, mut transport: T) -> Result<()> {
        info!("Starting MCP server");

        let result = loop {
            let msg = match transport.read_message().await {
                Ok(Some(msg)) => msg,
                Ok(None) => break Ok(()),
                Err(e @ Error::Decode { fatal: false, .. }) => {
                    warn!("Unreadable message: {}", e);
                    let reply = JsonRpcMessage::Response(JsonRpcResponse::failure(Value::Null, &e));
                    if let Err(e) = transport.write_message(&reply).await {
                        break Err(e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Failed to read message: {}", e);
                    break Err(e);
                }
            };

            if let Some(reply) = self.handler.handle_message(msg).await {
                if let Err(e) = transport.write_message(&reply).await {
                    error!("Failed to write response: {}", e);
                    break Err(e);
                }
            }
        };

        // The adapter must not outlive the server.
        self.debugger.lock().await.terminate().await;
        info!("MCP server stopped");
        result
    }
}
