use std::time::Duration;

use linewire_frame::FrameError;
use linewire_transport::TransportError;

/// Errors that can occur in endpoint operations.
///
/// Failures inside the decode loop are not reported here: the loop has no
/// caller to return to. They end the loop, which fires the endpoint's
/// lifecycle signal, and later receives report [`EndpointError::Terminated`].
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Dialing the remote address failed.
    #[error("connection failed: {0}")]
    Connection(#[source] TransportError),

    /// Binding the listen address, or accepting the single peer, failed.
    #[error("bind failed: {0}")]
    Bind(#[source] TransportError),

    /// Encoding or flushing an outbound frame failed.
    #[error("write failed: {0}")]
    Write(#[source] FrameError),

    /// The decode loop has ended; no further frames will arrive.
    #[error("endpoint terminated")]
    Terminated,

    /// No frame arrived within the requested time.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint was closed locally.
    #[error("endpoint closed")]
    Closed,

    /// The decode loop could not be started.
    #[error("failed to start decode loop: {0}")]
    Spawn(#[source] std::io::Error),
}

impl EndpointError {
    /// The underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            EndpointError::Connection(err) | EndpointError::Bind(err) => err.io_error(),
            EndpointError::Write(FrameError::Io(err)) | EndpointError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EndpointError>;
