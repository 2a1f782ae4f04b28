//! Newline-delimited message streams over TCP and Unix sockets.
//!
//! Every message is its payload followed by `\n`. An endpoint either dials a
//! peer or accepts exactly one, decodes inbound frames on a background loop,
//! and signals once that loop has ended.
//!
//! # Crate Structure
//!
//! - [`transport`]: connection-oriented byte streams (tcp, tcp4, tcp6, unix)
//! - [`frame`]: newline framing, blocking reader/writer and the tokio codec
//! - [`endpoint`]: dialing and accepting endpoints (behind `endpoint` feature)

/// Re-export transport types.
pub mod transport {
    pub use linewire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use linewire_frame::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use linewire_endpoint::*;
}
