use super::protocol::JsonRpcMessage;
use crate::Result;
use async_trait::async_trait;

/// Trait for MCP transport layer to enable testing with mocks
#[async_trait]
pub trait McpTransportTrait: Send {
    /// Read the next JSON-RPC message; `None` once the peer has closed the stream
    async fn read_message(&mut self) -> Result<Option<JsonRpcMessage>>;

    /// Write a JSON-RPC message to the transport
    async fn write_message(&mut self, msg: &JsonRpcMessage) -> Result<()>;
}
