//! Child-process stdio transport.
//!
//! Locking follows one rule: `parking_lot` mutexes guard state that is never
//! held across an `.await`, `tokio` mutexes guard the I/O halves that are.

use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use mcplink_protocol::MessageError;
use mcplink_transport_traits::{
    LimitsConfig, Transport, TransportConfig, TransportError, TransportFactory, TransportResult,
    TransportState, TransportType, validate_message_size,
};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{Mutex as TokioMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead, FramedWrite, LinesCodec,
};
use tracing::{debug, error, trace, warn};

type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
type BoxedAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
type LineReader = FramedRead<BoxedAsyncRead, InboundCodec>;
type LineWriter = FramedWrite<BoxedAsyncWrite, LinesCodec>;

/// Inbound lines buffered between the reader task and `receive`
const CHANNEL_CAPACITY: usize = 1000;

/// One newline-terminated chunk of the inbound stream
#[derive(Debug, PartialEq, Eq)]
enum InboundLine {
    /// Raw bytes, terminator stripped
    Line(Bytes),
    /// Longer than the size limit; the rest of it is skipped
    Oversized,
}

/// Splits stdout on `\n` over raw bytes and never buffers more than the
/// size limit for a single line.
///
/// UTF-8 is checked per line by the reader task, so one bad line does not
/// end the stream.
#[derive(Debug)]
struct InboundCodec {
    inner: AnyDelimiterCodec,
}

impl InboundCodec {
    fn new(limits: &LimitsConfig) -> Self {
        let inner = match limits.max_message_size {
            Some(max) => {
                AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max)
            }
            None => AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec()),
        };
        Self { inner }
    }
}

fn lift(
    chunk: Result<Option<Bytes>, AnyDelimiterCodecError>,
) -> Result<Option<InboundLine>, AnyDelimiterCodecError> {
    match chunk {
        Ok(chunk) => Ok(chunk.map(InboundLine::Line)),
        // The inner codec is now discarding up to the next newline
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(InboundLine::Oversized)),
        Err(e) => Err(e),
    }
}

impl Decoder for InboundCodec {
    type Item = InboundLine;
    type Error = AnyDelimiterCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<InboundLine>, Self::Error> {
        lift(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<InboundLine>, Self::Error> {
        lift(self.inner.decode_eof(buf))
    }
}

/// Line bytes as text, without a trailing `\r`
fn line_text(line: &[u8]) -> Result<String, MessageError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|e| MessageError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })
}

/// Where the byte streams come from on `connect`
enum StreamSource {
    /// Spawn `config.command`
    Spawn,
    /// Streams handed in by the caller; usable once
    Raw {
        reader: Option<BoxedAsyncRead>,
        writer: Option<BoxedAsyncWrite>,
    },
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn => write!(f, "Spawn"),
            Self::Raw { reader, writer } => f
                .debug_struct("Raw")
                .field("reader", &reader.as_ref().map(|_| "<async reader>"))
                .field("writer", &writer.as_ref().map(|_| "<async writer>"))
                .finish(),
        }
    }
}

/// Newline-delimited JSON over a child process's stdin/stdout.
///
/// # Examples
///
/// ```rust,no_run
/// use mcplink_stdio::StdioTransport;
/// use mcplink_transport_traits::{Transport, TransportConfig};
///
/// # async fn run() -> Result<(), mcplink_transport_traits::TransportError> {
/// let config = TransportConfig::command("npx", ["-y", "@modelcontextprotocol/server-everything"]);
/// let transport = StdioTransport::new(config);
/// transport.connect().await?;
/// # Ok(())
/// # }
/// ```
pub struct StdioTransport {
    config: TransportConfig,

    /// Shared with the reader task, which flips it on EOF
    state: Arc<Mutex<TransportState>>,

    source: TokioMutex<StreamSource>,
    writer: TokioMutex<Option<LineWriter>>,
    receiver: TokioMutex<Option<mpsc::Receiver<TransportResult<String>>>>,
    child: TokioMutex<Option<Child>>,

    /// Reader and stderr forwarding tasks
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("source", &"<StreamSource>")
            .field("writer", &"<LineWriter>")
            .field("receiver", &"<mpsc::Receiver>")
            .field("child", &"<Child>")
            .finish()
    }
}

impl StdioTransport {
    /// Transport that spawns `config.command` on connect
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self::with_source(config, StreamSource::Spawn)
    }

    /// Transport over already-open streams.
    ///
    /// `reader` is what the peer writes to (its stdout), `writer` is what the
    /// peer reads from (its stdin). The streams are consumed by the first
    /// `connect`, so the transport cannot reconnect.
    #[must_use]
    pub fn from_raw<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self::with_source(
            TransportConfig::default(),
            StreamSource::Raw {
                reader: Some(Box::pin(reader)),
                writer: Some(Box::pin(writer)),
            },
        )
    }

    fn with_source(config: TransportConfig, source: StreamSource) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(TransportState::Disconnected)),
            source: TokioMutex::new(source),
            writer: TokioMutex::new(None),
            receiver: TokioMutex::new(None),
            child: TokioMutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Replace the message size limits
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.config.limits = limits;
        self
    }

    /// Bound how long `connect` may take
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Configuration this transport was built with
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn set_state(&self, next: TransportState) {
        transition(&self.state, next);
    }

    async fn open_streams(&self) -> TransportResult<()> {
        let (reader, writer) = {
            let mut source = self.source.lock().await;
            match &mut *source {
                StreamSource::Spawn => self.spawn_child().await?,
                StreamSource::Raw { reader, writer } => {
                    let reader = reader.take().ok_or_else(|| {
                        TransportError::ConfigurationError(
                            "Raw reader stream already consumed".to_string(),
                        )
                    })?;
                    let writer = writer.take().ok_or_else(|| {
                        TransportError::ConfigurationError(
                            "Raw writer stream already consumed".to_string(),
                        )
                    })?;
                    (reader, writer)
                }
            }
        };

        // Bounded so a chatty server is paced by how fast we receive
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let lines = FramedRead::new(reader, InboundCodec::new(&self.config.limits));
        let reader_task = tokio::spawn(read_lines(
            lines,
            sender,
            Arc::clone(&self.state),
            self.config.limits.max_message_size,
        ));
        self.tasks.lock().push(reader_task);

        *self.writer.lock().await = Some(FramedWrite::new(writer, LinesCodec::new()));
        *self.receiver.lock().await = Some(receiver);
        Ok(())
    }

    async fn spawn_child(&self) -> TransportResult<(BoxedAsyncRead, BoxedAsyncWrite)> {
        let program = self
            .config
            .command
            .as_deref()
            .filter(|command| !command.trim().is_empty())
            .ok_or_else(|| {
                TransportError::ConfigurationError(
                    "stdio transport needs a command to spawn".to_string(),
                )
            })?;

        let mut command = Command::new(program);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_directory {
            command.current_dir(dir);
        }

        debug!(command = program, args = ?self.config.args, "spawning server process");
        let mut child = command.spawn().map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to spawn `{program}`: {e}"))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::ConnectionFailed("Failed to get stdin handle".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::ConnectionFailed("Failed to get stdout handle".to_string())
        })?;
        if let Some(stderr) = child.stderr.take() {
            let task = tokio::spawn(forward_stderr(stderr, program.to_string()));
            self.tasks.lock().push(task);
        }

        *self.child.lock().await = Some(child);
        Ok((Box::pin(stdout), Box::pin(stdin)))
    }

    async fn stop_child(&self, mut child: Child) {
        match tokio::time::timeout(self.config.shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "server process exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for server process"),
            Err(_) => {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "server process did not exit, killing it"
                );
                if let Err(e) = child.kill().await {
                    error!(error = %e, "failed to kill server process");
                }
            }
        }
    }
}

fn transition(state: &Mutex<TransportState>, next: TransportState) {
    let mut current = state.lock();
    if *current != next {
        trace!("stdio transport state: {} -> {}", *current, next);
        *current = next;
    }
}

/// End of stream: a live transport becomes disconnected, a failed one stays failed
fn mark_closed(state: &Mutex<TransportState>) {
    let mut current = state.lock();
    if matches!(
        *current,
        TransportState::Connecting | TransportState::Connected
    ) {
        trace!("stdio stream closed while {}", *current);
        *current = TransportState::Disconnected;
    }
}

async fn read_lines(
    mut lines: LineReader,
    sender: mpsc::Sender<TransportResult<String>>,
    state: Arc<Mutex<TransportState>>,
    max_message_size: Option<usize>,
) {
    while let Some(next) = lines.next().await {
        let item = match next {
            Ok(InboundLine::Line(bytes)) => match line_text(&bytes) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => {
                    trace!(%line, "received line");
                    Ok(line)
                }
                Err(e) => {
                    warn!(error = %e, "malformed inbound line");
                    Err(TransportError::Malformed(e))
                }
            },
            Ok(InboundLine::Oversized) => {
                warn!(max = ?max_message_size, "dropping oversized inbound message");
                continue;
            }
            Err(e) => {
                error!(error = %e, "failed to read from server stdout");
                transition(
                    &state,
                    TransportState::Failed {
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };

        if sender.send(item).await.is_err() {
            debug!("receive channel closed, stopping reader task");
            return;
        }
    }

    debug!("server closed its stdout");
    mark_closed(&state);
}

async fn forward_stderr(stderr: ChildStderr, program: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(server = %program, "{line}");
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    async fn state(&self) -> TransportState {
        self.state.lock().clone()
    }

    async fn connect(&self) -> TransportResult<()> {
        if matches!(*self.state.lock(), TransportState::Connected) {
            return Ok(());
        }

        self.set_state(TransportState::Connecting);
        let timeout = self.config.connect_timeout;
        let opened = tokio::time::timeout(timeout, self.open_streams())
            .await
            .unwrap_or(Err(TransportError::ConnectionTimeout { timeout }));
        match opened {
            Ok(()) => {
                self.set_state(TransportState::Connected);
                debug!(endpoint = ?self.endpoint(), "stdio transport connected");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to connect stdio transport");
                self.set_state(TransportState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.set_state(TransportState::Disconnecting);

        // Dropping the writer closes the child's stdin, which asks it to exit
        self.writer.lock().await.take();

        // Aborting the reader drops the sender, waking any pending receive
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }
        self.receiver.lock().await.take();

        let child = self.child.lock().await.take();
        if let Some(child) = child {
            self.stop_child(child).await;
        }

        self.set_state(TransportState::Disconnected);
        debug!("stdio transport disconnected");
        Ok(())
    }

    async fn send(&self, message: String) -> TransportResult<()> {
        if !matches!(*self.state.lock(), TransportState::Connected) {
            return Err(TransportError::NotConnected);
        }
        if message.contains(['\n', '\r']) {
            return Err(TransportError::ProtocolError(
                "Message contains embedded newlines, which break stdio framing".to_string(),
            ));
        }
        let size = message.len();
        validate_message_size(size, &self.config.limits)?;

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        if let Err(e) = writer.send(message).await {
            error!(error = %e, "failed to write to server stdin");
            self.set_state(TransportState::Failed {
                reason: e.to_string(),
            });
            return Err(TransportError::SendFailed(e.to_string()));
        }

        trace!(bytes = size, "sent message");
        Ok(())
    }

    async fn receive(&self, timeout: Option<Duration>) -> TransportResult<Option<String>> {
        let mut guard = self.receiver.lock().await;
        let Some(receiver) = guard.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let next = match timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver.recv()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            },
            None => receiver.recv().await,
        };

        match next {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => {
                mark_closed(&self.state);
                Ok(None)
            }
        }
    }

    fn endpoint(&self) -> Option<String> {
        Some(match &self.config.command {
            Some(command) => format!("stdio://{command}"),
            None => "stdio://".to_string(),
        })
    }
}

/// Factory for creating stdio transport instances
#[derive(Debug, Default)]
pub struct StdioTransportFactory;

impl StdioTransportFactory {
    /// Create a new stdio transport factory
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for StdioTransportFactory {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
        if config
            .command
            .as_deref()
            .is_none_or(|command| command.trim().is_empty())
        {
            return Err(TransportError::ConfigurationError(
                "stdio transport needs a command to spawn".to_string(),
            ));
        }
        Ok(Box::new(StdioTransport::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    const PING: &str = r#"{"jsonrpc":"2.0","id":"1","method":"ping"}"#;
    const PONG: &str = r#"{"jsonrpc":"2.0","id":"1","result":{}}"#;

    fn raw_pair() -> (StdioTransport, DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(ours);
        (StdioTransport::from_raw(reader, writer), theirs)
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let transport = StdioTransport::new(TransportConfig::command("cat", Vec::<String>::new()));
        assert_eq!(transport.state().await, TransportState::Disconnected);
        assert_eq!(
            transport.send(PING.to_string()).await,
            Err(TransportError::NotConnected)
        );
        assert_eq!(
            transport.receive(Some(Duration::from_millis(1))).await,
            Err(TransportError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_raw_stream_roundtrip() {
        let (transport, peer) = raw_pair();
        transport.connect().await.unwrap();
        assert!(transport.is_connected().await);

        let (peer_read, mut peer_write) = tokio::io::split(peer);
        let mut peer_lines = BufReader::new(peer_read).lines();

        transport.send(PING.to_string()).await.unwrap();
        assert_eq!(peer_lines.next_line().await.unwrap().as_deref(), Some(PING));

        // CRLF endings and blank keep-alive lines are tolerated
        peer_write
            .write_all(format!("\n{PONG}\r\n").as_bytes())
            .await
            .unwrap();
        let received = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(received.as_deref(), Some(PONG));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_timeout_is_not_end_of_stream() {
        let (transport, _peer) = raw_pair();
        transport.connect().await.unwrap();

        let received = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(received, None);
        assert!(transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_peer_close_drains_then_disconnects() {
        let (transport, mut peer) = raw_pair();
        transport.connect().await.unwrap();

        peer.write_all(format!("{PONG}\n").as_bytes()).await.unwrap();
        drop(peer);

        let first = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(first.as_deref(), Some(PONG));
        let second = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(second, None);
        assert!(!transport.is_connected().await);
        assert_eq!(transport.state().await, TransportState::Disconnected);
    }

    #[tokio::test]
    async fn test_embedded_newlines_rejected() {
        let (transport, _peer) = raw_pair();
        transport.connect().await.unwrap();

        for message in ["{\"a\":\n1}", "{\"a\":1}\r"] {
            let err = transport.send(message.to_string()).await.unwrap_err();
            assert!(matches!(err, TransportError::ProtocolError(_)), "{err:?}");
        }
        // An escaped newline inside a string is fine
        transport
            .send(r#"{"text":"line one\nline two"}"#.to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_size_limits() {
        let (ours, mut peer) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(ours);
        let transport =
            StdioTransport::from_raw(reader, writer).with_limits(LimitsConfig::with_max_message_size(48));
        transport.connect().await.unwrap();

        let big = format!(r#"{{"jsonrpc":"2.0","method":"x","params":{{"p":"{}"}}}}"#, "a".repeat(64));
        assert_eq!(
            transport.send(big.clone()).await,
            Err(TransportError::MessageTooLarge {
                size: big.len(),
                max: 48
            })
        );

        // Oversized inbound lines are dropped, the stream keeps going
        peer.write_all(format!("{big}\n{PONG}\n").as_bytes())
            .await
            .unwrap();
        let received = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(received.as_deref(), Some(PONG));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_stream() {
        let (transport, mut peer) = raw_pair();
        transport.connect().await.unwrap();

        let mut bad = br#"{"jsonrpc":"2.0","method":"log","params":{"t":""#.to_vec();
        bad.push(0xff);
        bad.extend_from_slice(b"\"}}\n");
        peer.write_all(&bad).await.unwrap();
        peer.write_all(format!("{PONG}\n").as_bytes()).await.unwrap();

        let err = transport
            .receive(Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, TransportError::Malformed(MessageError::InvalidUtf8 { .. })),
            "{err:?}"
        );

        let received = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(received.as_deref(), Some(PONG));
        assert!(transport.is_connected().await);
    }

    #[test]
    fn test_inbound_codec_bounds_line_length() {
        let mut codec = InboundCodec::new(&LimitsConfig::with_max_message_size(16));
        let mut buf = BytesMut::from(&b"a".repeat(4096)[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(InboundLine::Oversized));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"tail\n{\"ok\":1}\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(InboundLine::Line(Bytes::from_static(b"{\"ok\":1}\r")))
        );
        assert_eq!(line_text(b"{\"ok\":1}\r").unwrap(), r#"{"ok":1}"#);
    }

    #[tokio::test]
    async fn test_unterminated_flood_is_discarded() {
        let (ours, mut peer) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(ours);
        let transport = StdioTransport::from_raw(reader, writer)
            .with_limits(LimitsConfig::with_max_message_size(64));
        transport.connect().await.unwrap();

        let flood = vec![b'a'; 4 * 1024 * 1024];
        peer.write_all(&flood).await.unwrap();
        peer.write_all(format!("\n{PONG}\n").as_bytes()).await.unwrap();

        let received = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(received.as_deref(), Some(PONG));
        assert!(transport.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let (ours, _peer) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(ours);
        let transport = StdioTransport::from_raw(reader, writer)
            .with_connect_timeout(Duration::from_millis(50));

        // Stream setup cannot make progress while the source is held
        let busy = transport.source.lock().await;
        let err = transport.connect().await.unwrap_err();
        drop(busy);

        assert_eq!(
            err,
            TransportError::ConnectionTimeout {
                timeout: Duration::from_millis(50)
            }
        );
        assert!(matches!(
            transport.state().await,
            TransportState::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_raw_streams_are_single_use() {
        let (transport, _peer) = raw_pair();
        transport.connect().await.unwrap();
        transport.connect().await.unwrap();

        transport.disconnect().await.unwrap();
        assert_eq!(transport.state().await, TransportState::Disconnected);
        assert_eq!(
            transport.receive(None).await,
            Err(TransportError::NotConnected)
        );

        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::ConfigurationError(_)));
        assert!(matches!(
            transport.state().await,
            TransportState::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let transport = StdioTransport::new(TransportConfig::command(
            "mcplink-definitely-not-a-real-binary",
            Vec::<String>::new(),
        ));
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed(_)), "{err:?}");
        assert!(!transport.is_connected().await);
    }

    #[test]
    fn test_factory_requires_command() {
        let factory = StdioTransportFactory::new();
        assert_eq!(factory.transport_type(), TransportType::Stdio);
        assert!(factory.is_available());

        let err = factory.create(TransportConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::ConfigurationError(_)));

        let transport = factory
            .create(TransportConfig::command("server", ["--stdio"]))
            .unwrap();
        assert_eq!(transport.transport_type(), TransportType::Stdio);
        assert_eq!(transport.endpoint().as_deref(), Some("stdio://server"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_process_echo() {
        let transport = StdioTransport::new(TransportConfig::command("cat", Vec::<String>::new()));
        transport.connect().await.unwrap();

        transport.send(PING.to_string()).await.unwrap();
        let echoed = transport.receive(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(echoed.as_deref(), Some(PING));

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
        // Idempotent
        transport.disconnect().await.unwrap();
    }
}
