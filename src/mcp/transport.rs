use super::protocol::JsonRpcMessage;
use super::transport_trait::McpTransportTrait;
use crate::dap::codec::FrameCodec;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// `Content-Length` framed JSON-RPC over a byte stream pair, stdin/stdout
/// in production.
pub struct StdioTransport<R, W> {
    input: R,
    output: W,
    codec: FrameCodec<JsonRpcMessage>,
    ready: VecDeque<Result<JsonRpcMessage>>,
    chunk: Box<[u8]>,
}

impl StdioTransport<tokio::io::Stdin, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            codec: FrameCodec::new(),
            ready: VecDeque::new(),
            chunk: vec![0u8; 8 * 1024].into_boxed_slice(),
        }
    }
}

#[async_trait]
impl<R, W> McpTransportTrait for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_message(&mut self) -> Result<Option<JsonRpcMessage>> {
        loop {
            if let Some(next) = self.ready.pop_front() {
                return next.map(Some);
            }

            let n = self.input.read(&mut self.chunk).await?;
            if n == 0 {
                debug!("Input closed");
                return Ok(None);
            }
            trace!("Read {} bytes", n);
            self.ready.extend(self.codec.feed(&self.chunk[..n]));
        }
    }

    async fn write_message(&mut self, msg: &JsonRpcMessage) -> Result<()> {
        let frame = FrameCodec::encode(msg)?;
        debug!("Sending message: {}", String::from_utf8_lossy(&frame));

        self.output.write_all(&frame).await?;
        self.output.flush().await?;
        Ok(())
    }
}
