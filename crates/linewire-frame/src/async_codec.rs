//! `tokio_util` codec for newline-delimited frames.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{encode_frame, find_delimiter, split_frame, Frame};
use crate::error::FrameError;

/// Codec for use with `FramedRead` / `FramedWrite`.
///
/// Decoding strips the delimiter; encoding appends it. Bytes left without a
/// delimiter when the stream ends are discarded.
#[derive(Debug, Clone, Default)]
pub struct NewlineCodec {
    // Resume point for the delimiter scan across partial reads.
    next_index: usize,
}

impl NewlineCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for NewlineCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match find_delimiter(src, self.next_index) {
            Some(pos) => {
                self.next_index = 0;
                Ok(Some(split_frame(src, pos)))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            debug!(
                discarded = src.len(),
                "discarding unterminated bytes at end of stream"
            );
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for NewlineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item.as_ref(), dst);
        Ok(())
    }
}
