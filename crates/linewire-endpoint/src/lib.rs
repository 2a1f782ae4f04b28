//! Dialing and accepting endpoints for newline-framed byte streams.
//!
//! This is the "just works" layer. An [`Endpoint`] owns one connection and a
//! background decode loop: inbound frames arrive one at a time through
//! [`Endpoint::recv`], outbound frames leave through [`Endpoint::emit`], and
//! [`Endpoint::done`] fires once the loop has ended for good.
//!
//! ```no_run
//! let endpoint = linewire_endpoint::connect("tcp", "127.0.0.1:7000")?;
//! endpoint.emit("hello")?;
//! for frame in endpoint.incoming() {
//!     println!("{}", String::from_utf8_lossy(frame.as_bytes()));
//! }
//! # Ok::<(), linewire_endpoint::EndpointError>(())
//! ```

pub mod config;
pub mod connector;
mod decode_loop;
pub mod endpoint;
pub mod error;
pub mod listener;
pub mod signal;

#[cfg(feature = "async")]
pub mod async_endpoint;

pub use config::EndpointConfig;
pub use connector::{connect, connect_with_config};
pub use endpoint::{Endpoint, Incoming, Role};
pub use error::{EndpointError, Result};
pub use linewire_frame::Frame;
pub use listener::{listen, listen_with_config, Acceptor};
pub use signal::LifecycleSignal;

#[cfg(feature = "async")]
pub use async_endpoint::{connect_async, listen_async, AsyncAcceptor, AsyncEndpoint, Frames};
