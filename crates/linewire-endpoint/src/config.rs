use std::time::Duration;

use linewire_frame::FrameConfig;

/// Optional deadlines applied to an endpoint's connection.
///
/// Everything is `None` by default: the endpoint waits as long as the
/// transport does.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    /// Bound on each tcp connect attempt. Ignored when accepting.
    pub connect_timeout: Option<Duration>,
    /// Read timeout on the raw connection. When it expires the decode loop
    /// terminates, exactly as for any other read failure.
    pub read_timeout: Option<Duration>,
    /// Write timeout on the raw connection, surfaced as a write error from `emit`.
    pub write_timeout: Option<Duration>,
}

impl EndpointConfig {
    /// Set the per-attempt connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}
