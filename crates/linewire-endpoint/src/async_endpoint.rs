//! Tokio flavour of [`Endpoint`](crate::Endpoint).
//!
//! The shape is the same as the blocking endpoint: one decode task per
//! connection, a lifecycle signal that fires when the task ends, and an
//! `emit` that writes and flushes before returning. The decode task hands
//! each frame over and waits for it to be taken before reading further, so a
//! slow consumer still pushes back on the peer.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use futures_core::Stream as FutureStream;
use linewire_frame::{encode_frame, Frame, FrameError, NewlineCodec};
use linewire_transport::{
    Address, AsyncListener, AsyncStream, BoxedReader, BoxedWriter, Protocol, TransportError,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::EndpointConfig;
use crate::decode_loop::Exit;
use crate::endpoint::Role;
use crate::error::{EndpointError, Result};

/// One side of a newline-framed connection driven by tokio.
///
/// Receive from one task at a time; concurrent `emit` calls are serialized.
/// Dropping the endpoint stops its decode task and closes the connection.
pub struct AsyncEndpoint {
    role: Role,
    peer: Address,
    local: Address,
    writer: tokio::sync::Mutex<Outbound>,
    incoming: Mutex<mpsc::Receiver<Frame>>,
    stop: CancellationToken,
    done: CancellationToken,
    listener: Mutex<Option<AsyncListener>>,
    closed: AtomicBool,
}

struct Outbound {
    io: Option<BoxedWriter>,
    buf: BytesMut,
    timeout: Option<Duration>,
}

impl AsyncEndpoint {
    fn start(
        role: Role,
        stream: AsyncStream,
        listener: Option<AsyncListener>,
        config: &EndpointConfig,
    ) -> Result<Self> {
        let peer = stream.peer_addr().map_err(|e| role.setup_error(e))?;
        let local = stream.local_addr().map_err(|e| role.setup_error(e))?;
        let (reader, writer) = stream.into_split();

        let (tx, rx) = mpsc::channel(1);
        let stop = CancellationToken::new();
        let done = CancellationToken::new();
        tokio::spawn(decode_task(
            FramedRead::new(reader, NewlineCodec::new()),
            tx,
            config.read_timeout,
            stop.clone(),
            done.clone(),
        ));

        debug!(?role, %peer, "async endpoint started");

        Ok(Self {
            role,
            peer,
            local,
            writer: tokio::sync::Mutex::new(Outbound {
                io: Some(writer),
                buf: BytesMut::new(),
                timeout: config.write_timeout,
            }),
            incoming: Mutex::new(rx),
            stop,
            done,
            listener: Mutex::new(listener),
            closed: AtomicBool::new(false),
        })
    }

    /// Receive the next frame.
    ///
    /// Returns [`EndpointError::Terminated`] once the decode task has ended.
    pub async fn recv(&self) -> Result<Frame> {
        match poll_fn(|cx| self.poll_frame(cx)).await {
            Some(frame) => Ok(frame),
            None => {
                self.done.cancelled().await;
                Err(EndpointError::Terminated)
            }
        }
    }

    /// Receive the next frame, waiting at most `timeout`.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Frame> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| EndpointError::Timeout(timeout))?
    }

    /// Stream of inbound frames, ending when the decode task ends.
    pub fn incoming(&self) -> Frames<'_> {
        Frames { endpoint: self }
    }

    /// Frame `payload` and write it to the peer, flushing before returning.
    pub async fn emit(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }
        let payload = payload.as_ref();

        let mut outbound = self.writer.lock().await;
        let Outbound { io, buf, timeout } = &mut *outbound;
        let io = io.as_mut().ok_or(EndpointError::Closed)?;

        buf.clear();
        encode_frame(payload, buf);
        let write = async {
            io.write_all(&buf[..]).await?;
            io.flush().await
        };
        let written = match timeout {
            Some(limit) => tokio::time::timeout(*limit, write)
                .await
                .unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into())),
            None => write.await,
        };
        written.map_err(|err| EndpointError::Write(FrameError::Io(err)))?;

        trace!(size = payload.len(), "emitted frame");
        Ok(())
    }

    /// Stop the decode task, shut the connection down and release any
    /// bound listener. Idempotent. Frames not yet received are discarded.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop.cancel();

        if let Some(mut io) = self.writer.lock().await.io.take() {
            if let Err(err) = io.shutdown().await {
                debug!(error = %err, "connection shutdown failed");
            }
        }
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if listener.is_some() {
            debug!("released listener");
        }
        debug!(role = ?self.role, "async endpoint closed");
    }

    /// The lifecycle signal: cancelled once the decode task has ended.
    pub fn done(&self) -> &CancellationToken {
        &self.done
    }

    /// Whether the decode task has ended.
    pub fn is_terminated(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Which side opened the connection.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> &Address {
        &self.peer
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> &Address {
        &self.local
    }

    fn poll_frame(&self, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let polled = self
            .incoming
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .poll_recv(cx);
        match polled {
            // A frame left in the slot by a close or a dead task is never delivered.
            Poll::Ready(Some(_)) if self.stop.is_cancelled() || self.done.is_cancelled() => {
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for AsyncEndpoint {
    fn drop(&mut self) {
        // The write half shuts down when dropped; the task drops the read half.
        self.stop.cancel();
    }
}

impl std::fmt::Debug for AsyncEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncEndpoint")
            .field("role", &self.role)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Stream returned by [`AsyncEndpoint::incoming`].
#[derive(Debug)]
pub struct Frames<'a> {
    endpoint: &'a AsyncEndpoint,
}

impl FutureStream for Frames<'_> {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        self.endpoint.poll_frame(cx)
    }
}

async fn decode_task(
    mut frames: FramedRead<BoxedReader, NewlineCodec>,
    tx: mpsc::Sender<Frame>,
    read_timeout: Option<Duration>,
    stop: CancellationToken,
    done: CancellationToken,
) -> Exit {
    let exit = loop {
        let read = async {
            let next = poll_fn(|cx| Pin::new(&mut frames).poll_next(cx));
            match read_timeout {
                Some(limit) => tokio::time::timeout(limit, next).await.unwrap_or_else(|_| {
                    Some(Err(FrameError::Io(std::io::ErrorKind::TimedOut.into())))
                }),
                None => next.await,
            }
        };
        let next = tokio::select! {
            _ = stop.cancelled() => break Exit::Closed,
            next = read => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(error = %err, "read failed; terminating decode task");
                break Exit::ReadFailed;
            }
            None => break Exit::EndOfStream,
        };
        trace!(size = frame.len(), "decoded frame");

        // Hand the frame over, then wait for the slot to empty again.
        let handed = async {
            tx.send(frame).await.ok()?;
            tx.reserve().await.ok().map(drop)
        };
        let handed = tokio::select! {
            _ = stop.cancelled() => break Exit::Closed,
            handed = handed => handed,
        };
        if handed.is_none() {
            break Exit::ConsumerGone;
        }
    };

    drop(frames);
    drop(tx);
    done.cancel();
    debug!(?exit, "decode task terminated");
    exit
}

/// Dial `address` over `protocol` and start an async dialing endpoint.
pub async fn connect_async(
    protocol: &str,
    address: &str,
    config: &EndpointConfig,
) -> Result<AsyncEndpoint> {
    let protocol: Protocol = protocol.parse().map_err(EndpointError::Connection)?;
    let dial = linewire_transport::connect_async(protocol, address);
    let stream = match config.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, dial).await.unwrap_or_else(|_| {
            Err(TransportError::Connect {
                addr: address.to_string(),
                source: std::io::ErrorKind::TimedOut.into(),
            })
        }),
        None => dial.await,
    }
    .map_err(EndpointError::Connection)?;

    info!(%protocol, address, "connected");
    AsyncEndpoint::start(Role::Dialing, stream, None, config)
}

/// Bind `address`, wait for exactly one peer, and start an async accepting endpoint.
pub async fn listen_async(
    protocol: &str,
    address: &str,
    config: &EndpointConfig,
) -> Result<AsyncEndpoint> {
    AsyncAcceptor::bind(protocol, address)
        .await?
        .with_config(config.clone())
        .accept()
        .await
}

/// Async counterpart of [`Acceptor`](crate::Acceptor).
#[derive(Debug)]
pub struct AsyncAcceptor {
    listener: AsyncListener,
    config: EndpointConfig,
}

impl AsyncAcceptor {
    /// Bind and listen on `address` over `protocol`.
    pub async fn bind(protocol: &str, address: &str) -> Result<Self> {
        let protocol: Protocol = protocol.parse().map_err(EndpointError::Bind)?;
        let listener = AsyncListener::bind(protocol, address)
            .await
            .map_err(EndpointError::Bind)?;
        Ok(Self {
            listener,
            config: EndpointConfig::default(),
        })
    }

    /// Override the timeouts applied to the accepted connection.
    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<Address> {
        self.listener.local_addr().map_err(EndpointError::Bind)
    }

    /// Wait for one peer, then start an accepting endpoint that owns the listener.
    pub async fn accept(self) -> Result<AsyncEndpoint> {
        let stream = self.listener.accept().await.map_err(EndpointError::Bind)?;
        info!("accepted connection");
        AsyncEndpoint::start(Role::Accepting, stream, Some(self.listener), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use futures_util::StreamExt;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};
    use tokio::net::TcpStream;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn pair() -> (AsyncEndpoint, AsyncEndpoint) {
        let acceptor = AsyncAcceptor::bind("tcp", "127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().to_string();
        let server = tokio::spawn(acceptor.accept());
        let client = connect_async("tcp", &addr, &EndpointConfig::default())
            .await
            .unwrap();
        (client, server.await.unwrap().unwrap())
    }

    async fn with_raw_peer() -> (AsyncEndpoint, TcpStream) {
        let acceptor = AsyncAcceptor::bind("tcp", "127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().as_inet().unwrap();
        let server = tokio::spawn(acceptor.accept());
        let raw = TcpStream::connect(addr).await.unwrap();
        (server.await.unwrap().unwrap(), raw)
    }

    #[tokio::test]
    async fn ping_pong_then_close() {
        let (a, b) = pair().await;
        assert_eq!(a.role(), Role::Dialing);
        assert_eq!(b.role(), Role::Accepting);
        assert_eq!(a.local_addr(), b.peer_addr());

        a.emit("ping").await.unwrap();
        assert_eq!(b.recv_timeout(WAIT).await.unwrap().as_bytes(), b"ping");
        b.emit("pong").await.unwrap();
        assert_eq!(a.recv_timeout(WAIT).await.unwrap().as_bytes(), b"pong");

        a.close().await;
        a.close().await;
        tokio::time::timeout(WAIT, b.done().cancelled()).await.unwrap();
        tokio::time::timeout(WAIT, a.done().cancelled()).await.unwrap();
        assert!(matches!(b.recv().await, Err(EndpointError::Terminated)));
        assert!(matches!(a.emit("late").await, Err(EndpointError::Closed)));
    }

    /// Start a bare decode task over an in-memory pipe. Returns the peer side
    /// of the pipe, the consumer side of the channel, a count of reads that
    /// returned data, and the task handle.
    fn spawn_decode_task(
        stop: &CancellationToken,
        done: &CancellationToken,
    ) -> (
        DuplexStream,
        mpsc::Receiver<Frame>,
        Arc<AtomicUsize>,
        tokio::task::JoinHandle<Exit>,
    ) {
        let (peer, local) = tokio::io::duplex(64);
        let reads = Arc::new(AtomicUsize::new(0));
        let reader: BoxedReader = Box::new(CountingReader {
            inner: local,
            reads: Arc::clone(&reads),
        });
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(decode_task(
            FramedRead::new(reader, NewlineCodec::new()),
            tx,
            None,
            stop.clone(),
            done.clone(),
        ));
        (peer, rx, reads, task)
    }

    #[tokio::test]
    async fn decode_task_waits_for_each_frame_to_be_taken() {
        let (stop, done) = (CancellationToken::new(), CancellationToken::new());
        let (mut peer, mut rx, reads, task) = spawn_decode_task(&stop, &done);

        peer.write_all(b"one\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        peer.write_all(b"two\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // "one" sits in the slot; nothing further is read or queued behind it.
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap().as_bytes(), b"one");
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await.unwrap().as_bytes(), b"two");
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        drop(peer);
        assert!(rx.recv().await.is_none());
        assert_eq!(task.await.unwrap(), Exit::EndOfStream);
        assert!(done.is_cancelled());
    }

    #[tokio::test]
    async fn stopped_decode_task_reports_closed() {
        let (stop, done) = (CancellationToken::new(), CancellationToken::new());
        let (mut peer, _rx, _reads, task) = spawn_decode_task(&stop, &done);

        peer.write_all(b"held\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.cancel();

        let exit = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(exit, Exit::Closed);
        assert!(done.is_cancelled());
    }

    #[tokio::test]
    async fn close_discards_frame_waiting_in_slot() {
        let (b, mut raw) = with_raw_peer().await;
        raw.write_all(b"pending\n").await.unwrap();

        // Let the task move "pending" into the slot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        b.close().await;

        assert!(matches!(b.recv().await, Err(EndpointError::Terminated)));
        assert!(b.is_terminated());
        assert!(b.incoming().next().await.is_none());
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (a, b) = pair().await;
        let writer = tokio::spawn(async move {
            for i in 0..100 {
                a.emit(format!("n{i}")).await.unwrap();
            }
            a
        });

        for i in 0..100 {
            let frame = b.recv_timeout(WAIT).await.unwrap();
            assert_eq!(frame.as_bytes(), format!("n{i}").as_bytes());
        }
        drop(writer.await.unwrap());
        tokio::time::timeout(WAIT, b.done().cancelled()).await.unwrap();
    }

    #[tokio::test]
    async fn incoming_stream_ends_with_peer() {
        let (b, mut raw) = with_raw_peer().await;
        raw.write_all(b"x\n\nyz\ntail").await.unwrap();
        drop(raw);

        let frames: Vec<Frame> = b.incoming().collect().await;
        let payloads: Vec<&[u8]> = frames.iter().map(Frame::as_bytes).collect();
        assert_eq!(payloads, vec![&b"x"[..], &b""[..], &b"yz"[..]]);

        tokio::time::timeout(WAIT, b.done().cancelled()).await.unwrap();
        assert!(b.is_terminated());
    }

    #[tokio::test]
    async fn emit_writes_delimited_frames() {
        let (b, mut raw) = with_raw_peer().await;
        b.emit("one").await.unwrap();
        b.emit(b"").await.unwrap();
        b.close().await;

        let mut wire = Vec::new();
        raw.read_to_end(&mut wire).await.unwrap();
        assert_eq!(wire, b"one\n\n");
    }

    #[tokio::test]
    async fn read_timeout_terminates_decode_task() {
        let acceptor = AsyncAcceptor::bind("tcp", "127.0.0.1:0")
            .await
            .unwrap()
            .with_config(EndpointConfig::default().with_read_timeout(Duration::from_millis(30)));
        let addr = acceptor.local_addr().unwrap().as_inet().unwrap();
        let server = tokio::spawn(acceptor.accept());
        let _raw = TcpStream::connect(addr).await.unwrap();
        let b = server.await.unwrap().unwrap();

        tokio::time::timeout(WAIT, b.done().cancelled()).await.unwrap();
        assert!(matches!(b.recv().await, Err(EndpointError::Terminated)));
    }

    #[tokio::test]
    async fn unknown_protocol_is_rejected() {
        let err = connect_async("udp", "127.0.0.1:1", &EndpointConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EndpointError::Connection(_)));

        let err = AsyncAcceptor::bind("udp", "127.0.0.1:0").await.unwrap_err();
        assert!(matches!(err, EndpointError::Bind(_)));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn unix_socket_endpoints() {
        let dir = std::env::temp_dir().join(format!(
            "linewire-async-endpoint-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("ep.sock");
        let sock = sock_path.to_string_lossy().into_owned();

        let acceptor = AsyncAcceptor::bind("unix", &sock).await.unwrap();
        let server = tokio::spawn(acceptor.accept());
        let a = connect_async("unix", &sock, &EndpointConfig::default())
            .await
            .unwrap();
        let b = server.await.unwrap().unwrap();

        a.emit("over uds").await.unwrap();
        assert_eq!(b.recv_timeout(WAIT).await.unwrap().as_bytes(), b"over uds");

        b.close().await;
        tokio::time::timeout(WAIT, a.done().cancelled()).await.unwrap();
        assert!(!sock_path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    /// Counts reads that returned data.
    struct CountingReader {
        inner: DuplexStream,
        reads: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let before = buf.filled().len();
            let polled = Pin::new(&mut self.inner).poll_read(cx, buf);
            if matches!(polled, Poll::Ready(Ok(()))) && buf.filled().len() > before {
                self.reads.fetch_add(1, Ordering::SeqCst);
            }
            polled
        }
    }
}
