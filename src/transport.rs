use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::error::FramingError;

/// A bidirectional channel of discrete text messages.
#[async_trait]
pub trait Transport: Send {
    /// Next complete message, or `None` once the peer has closed the stream.
    async fn recv(&mut self) -> Result<Option<String>, FramingError>;

    async fn send(&mut self, message: &str) -> Result<(), FramingError>;
}

/// Newline-delimited framing, as used by MCP over stdio.
///
/// Partial reads stay in the buffer until the delimiter arrives. Blank lines
/// are skipped. A final line without a trailing newline is still delivered
/// when the stream ends.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    max_frame_bytes: usize,
    buf: Vec<u8>,
}

pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

impl<R, W> LineTransport<BufReader<R>, W>
where
    R: tokio::io::AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::buffered(BufReader::new(reader), writer)
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn buffered(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            buf: Vec::new(),
        }
    }

    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Read up to the next `\n`, refusing to buffer more than the frame limit.
    async fn read_frame(&mut self) -> Result<bool, FramingError> {
        self.buf.clear();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(!self.buf.is_empty());
            }

            let (chunk, done) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (&available[..i], i + 1),
                None => (available, available.len()),
            };
            if self.buf.len() + chunk.len() > self.max_frame_bytes {
                return Err(FramingError::FrameTooLarge {
                    limit: self.max_frame_bytes,
                });
            }
            self.buf.extend_from_slice(chunk);
            let found_delimiter = done > chunk.len();
            self.reader.consume(done);

            if found_delimiter {
                return Ok(true);
            }
        }
    }
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<String>, FramingError> {
        loop {
            if !self.read_frame().await? {
                return Ok(None);
            }
            let line = std::str::from_utf8(&self.buf).map_err(|_| FramingError::InvalidUtf8)?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            trace!(bytes = line.len(), "frame received");
            return Ok(Some(line.to_string()));
        }
    }

    async fn send(&mut self, message: &str) -> Result<(), FramingError> {
        if message.contains('\n') {
            return Err(FramingError::Encode(
                "message contains the frame delimiter".into(),
            ));
        }
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        trace!(bytes = message.len(), "frame sent");
        Ok(())
    }
}

pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

/// Process stdin/stdout. Logging must go to stderr while this is in use.
pub fn stdio() -> StdioTransport {
    LineTransport::new(tokio::io::stdin(), tokio::io::stdout())
}
