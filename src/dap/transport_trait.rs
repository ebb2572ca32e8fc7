use super::types::Message;
use crate::Result;
use async_trait::async_trait;

/// Read half of a DAP transport, split out so tests can mock it
#[async_trait]
pub trait MessageReader: Send {
    /// Read the next DAP protocol message
    async fn read_message(&mut self) -> Result<Message>;
}

/// Write half of a DAP transport
#[async_trait]
pub trait MessageWriter: Send {
    /// Write a DAP protocol message
    async fn write_message(&mut self, msg: &Message) -> Result<()>;
}
