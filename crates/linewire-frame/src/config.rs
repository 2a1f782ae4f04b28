use std::time::Duration;

use linewire_transport::TransportError;

use crate::error::FrameError;

/// Stream-level deadlines applied before framing starts.
///
/// Both default to `None`: no deadlines are enforced unless asked for.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout for blocking frame reads.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking frame writes.
    pub write_timeout: Option<Duration>,
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
