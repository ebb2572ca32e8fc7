use super::codec::FrameCodec;
use super::transport_trait::{MessageReader, MessageWriter};
use super::types::Message;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

const READ_CHUNK: usize = 8 * 1024;

/// Wrap a byte stream pair (adapter stdout, adapter stdin) as framed halves.
pub fn framed<R, W>(reader: R, writer: W) -> (FramedReader<R>, FramedWriter<W>)
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    (FramedReader::new(reader), FramedWriter::new(writer))
}

/// Feeds raw adapter output through the frame codec.
pub struct FramedReader<R> {
    reader: R,
    codec: FrameCodec<Message>,
    ready: VecDeque<Result<Message>>,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin + Send> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            codec: FrameCodec::new(),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.codec.is_halted()
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MessageReader for FramedReader<R> {
    /// Returns decode errors one frame at a time; `AdapterExited` on EOF.
    async fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(next) = self.ready.pop_front() {
                if let Ok(msg) = &next {
                    debug!("DAP received: {:?}", msg);
                }
                return next;
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                return Err(Error::AdapterExited);
            }
            if self.is_halted() {
                trace!("Framing lost, discarding {} bytes of adapter output", n);
                continue;
            }
            trace!("DAP read {} bytes", n);
            self.ready.extend(self.codec.feed(&self.chunk[..n]));
        }
    }
}

pub struct FramedWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FramedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageWriter for FramedWriter<W> {
    async fn write_message(&mut self, msg: &Message) -> Result<()> {
        let frame = FrameCodec::encode(msg)?;
        debug!("DAP sending: {:?}", msg);

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
