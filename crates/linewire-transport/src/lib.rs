//! Byte-stream transport for linewire.
//!
//! Provides one interface over the connection-oriented transports an
//! endpoint can run on:
//! - TCP (`tcp`, `tcp4`, `tcp6`)
//! - Unix domain stream sockets (`unix`, Unix targets only)
//!
//! This is the lowest layer of linewire. Everything else builds on top of
//! the [`Stream`] type provided here.

pub mod error;
pub mod listener;
pub mod protocol;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

#[cfg(feature = "async")]
pub mod async_io;

pub use error::{Result, TransportError};
pub use listener::{connect, connect_timeout, Listener};
pub use protocol::Protocol;
pub use stream::{Address, Stream};

#[cfg(unix)]
pub use uds::UnixSocket;

#[cfg(feature = "async")]
pub use async_io::{connect_async, AsyncListener, AsyncStream, BoxedReader, BoxedWriter};
