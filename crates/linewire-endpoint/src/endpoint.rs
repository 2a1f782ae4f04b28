use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use linewire_frame::{Frame, FrameError, FrameReader, FrameWriter};
use linewire_transport::{Address, Listener, Stream, TransportError};
use tracing::{debug, trace};

use crate::config::EndpointConfig;
use crate::decode_loop;
use crate::error::{EndpointError, Result};
use crate::signal::LifecycleSignal;

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Opened by [`connect`](crate::connect).
    Dialing,
    /// Accepted by [`listen`](crate::listen) or [`Acceptor::accept`](crate::Acceptor::accept).
    Accepting,
}

impl Role {
    pub(crate) fn setup_error(self, err: TransportError) -> EndpointError {
        match self {
            Role::Dialing => EndpointError::Connection(err),
            Role::Accepting => EndpointError::Bind(err),
        }
    }
}

/// One side of a newline-framed byte-stream connection.
///
/// Inbound frames are decoded by a background loop and handed over one at a
/// time through [`recv`](Self::recv) and friends. When that loop ends, for
/// whatever reason, [`done`](Self::done) fires and every later receive
/// reports [`EndpointError::Terminated`].
///
/// Outbound frames go through [`emit`](Self::emit), which writes and flushes
/// on the caller's thread. Concurrent `emit` calls are serialized internally.
///
/// Dropping an endpoint closes it.
pub struct Endpoint {
    role: Role,
    // Clone of the connection kept only to sever it on close.
    control: Stream,
    writer: Mutex<FrameWriter<Stream>>,
    // Taken on close so a hand-off the loop is blocked in fails.
    incoming: Mutex<Option<Receiver<Frame>>>,
    done: LifecycleSignal,
    listener: Mutex<Option<Listener>>,
    closed: Arc<AtomicBool>,
}

impl Endpoint {
    /// Wrap a connected stream and start its decode loop.
    pub(crate) fn start(
        role: Role,
        stream: Stream,
        listener: Option<Listener>,
        config: &EndpointConfig,
    ) -> Result<Self> {
        let frame_config = config.frame_config();
        let reader_stream = stream.try_clone().map_err(|e| role.setup_error(e))?;
        let control = stream.try_clone().map_err(|e| role.setup_error(e))?;

        let reader = FrameReader::with_config_stream(reader_stream, &frame_config)
            .map_err(|e| role.setup_error(frame_to_transport_error(e)))?;
        let writer = FrameWriter::with_config_stream(stream, &frame_config)
            .map_err(|e| role.setup_error(frame_to_transport_error(e)))?;

        let (tx, rx) = sync_channel(0);
        let done = LifecycleSignal::new();
        let closed = Arc::new(AtomicBool::new(false));
        decode_loop::spawn(reader, tx, done.clone(), Arc::clone(&closed))
            .map_err(EndpointError::Spawn)?;

        debug!(?role, transport = control.transport_name(), "endpoint started");

        Ok(Self {
            role,
            control,
            writer: Mutex::new(writer),
            incoming: Mutex::new(Some(rx)),
            done,
            listener: Mutex::new(listener),
            closed,
        })
    }

    /// Receive the next frame, blocking until one arrives.
    ///
    /// Returns [`EndpointError::Terminated`] once the decode loop has ended
    /// and every frame it produced has been received, or once the endpoint
    /// has been closed.
    pub fn recv(&self) -> Result<Frame> {
        let incoming = self.receiver();
        let Some(rx) = incoming.as_ref() else {
            return Err(self.terminated());
        };
        rx.recv().map_err(|_| self.terminated())
    }

    /// Receive the next frame, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Frame> {
        let incoming = self.receiver();
        let Some(rx) = incoming.as_ref() else {
            return Err(self.terminated());
        };
        match rx.recv_timeout(timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(EndpointError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(self.terminated()),
        }
    }

    /// Take a frame only if the decode loop is already waiting to hand one over.
    pub fn try_recv(&self) -> Result<Option<Frame>> {
        let incoming = self.receiver();
        let Some(rx) = incoming.as_ref() else {
            return Err(self.terminated());
        };
        match rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.terminated()),
        }
    }

    /// Blocking iterator over inbound frames, ending when the decode loop ends.
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { endpoint: self }
    }

    /// Frame `payload` and write it to the peer, flushing before returning.
    ///
    /// The payload must not contain the delimiter byte; it is not checked.
    pub fn emit(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }
        let payload = payload.as_ref();

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.send(payload).map_err(EndpointError::Write)?;
        trace!(size = payload.len(), "emitted frame");
        Ok(())
    }

    /// Release everything this endpoint constructed: the connection and, for
    /// accepting endpoints, the bound listener.
    ///
    /// Idempotent. Closing severs the connection and stops accepting inbound
    /// frames, which ends the decode loop shortly afterwards even if it was
    /// waiting to hand a frame over; wait on [`done`](Self::done) to observe
    /// that. Frames not yet received are discarded.
    ///
    /// If another thread is blocked in a receive, this waits for that receive
    /// to return, which the severed connection guarantees.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(err) = self.control.shutdown() {
            debug!(error = %err, "connection shutdown failed");
        }
        drop(self.receiver().take());
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if listener.is_some() {
            debug!("released listener");
        }
        debug!(role = ?self.role, "endpoint closed");
    }

    /// The lifecycle signal: fires once the decode loop has ended.
    pub fn done(&self) -> &LifecycleSignal {
        &self.done
    }

    /// Whether the decode loop has ended.
    pub fn is_terminated(&self) -> bool {
        self.done.is_fired()
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
    pub fn peer_addr(&self) -> linewire_transport::Result<Address> {
        self.control.peer_addr()
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> linewire_transport::Result<Address> {
        self.control.local_addr()
    }

    // The loop drops its sender just before firing, and a closed endpoint has
    // already ended the loop's hand-off; either way the signal is about to fire.
    fn terminated(&self) -> EndpointError {
        self.done.wait();
        EndpointError::Terminated
    }

    fn receiver(&self) -> MutexGuard<'_, Option<Receiver<Frame>>> {
        self.incoming
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("role", &self.role)
            .field("closed", &self.is_closed())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Iterator returned by [`Endpoint::incoming`].
#[derive(Debug)]
pub struct Incoming<'a> {
    endpoint: &'a Endpoint,
}

impl Iterator for Incoming<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.endpoint.recv().ok()
    }
}

fn frame_to_transport_error(err: FrameError) -> TransportError {
    match err {
        FrameError::Io(io) => TransportError::Io(io),
        FrameError::ConnectionClosed => {
            TransportError::Io(std::io::Error::from(std::io::ErrorKind::NotConnected))
        }
    }
}
