//! Newline-delimited message framing for linewire.
//!
//! Every message on the wire is its payload followed by a single `\n`
//! (0x0A). There is no length prefix and no handshake; the delimiter is the
//! only framing. Payloads must not contain the delimiter.
//!
//! [`FrameReader`] and [`FrameWriter`] are the buffered decoder and encoder
//! used over blocking streams. With the `async` feature, [`NewlineCodec`]
//! provides the same framing for `tokio_util::codec`.

pub mod codec;
pub mod config;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{decode_frame, encode_frame, find_delimiter, Frame, DELIMITER};
pub use config::FrameConfig;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::NewlineCodec;
