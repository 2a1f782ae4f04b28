use bytes::{BufMut, Bytes, BytesMut};

/// Byte terminating every frame on the wire (`\n`).
pub const DELIMITER: u8 = b'\n';

/// A single newline-delimited message.
///
/// The payload never contains the delimiter: it is stripped on decode and
/// appended on encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.payload.as_ref()
    }

    /// Consume the frame, returning its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty. Empty frames are valid messages.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The total wire size of this frame (payload + delimiter).
    pub fn wire_size(&self) -> usize {
        self.payload.len() + 1
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.payload.as_ref()
    }
}

/// Encode a payload into the wire format: the payload bytes followed by
/// [`DELIMITER`].
///
/// The payload is written as-is. Keeping the delimiter out of payloads is
/// the caller's obligation; an embedded delimiter splits the message in two
/// on the receiving side.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 1);
    dst.put_slice(payload);
    dst.put_u8(DELIMITER);
}

/// Position of the first delimiter in `src`, starting the scan at `from`.
pub fn find_delimiter(src: &[u8], from: usize) -> Option<usize> {
    src.get(from..)?
        .iter()
        .position(|b| *b == DELIMITER)
        .map(|offset| from + offset)
}

/// Decode one frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a delimiter yet. On success,
/// consumes the frame bytes (including the delimiter) from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    let pos = find_delimiter(src, 0)?;
    Some(split_frame(src, pos))
}

/// Split the frame ending at delimiter index `pos` off the front of `src`.
pub(crate) fn split_frame(src: &mut BytesMut, pos: usize) -> Frame {
    let mut line = src.split_to(pos + 1);
    line.truncate(pos);
    Frame {
        payload: line.freeze(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_appends_delimiter() {
        let mut buf = BytesMut::new();
        encode_frame(b"ping", &mut buf);
        assert_eq!(buf.as_ref(), b"ping\n");
    }

    #[test]
    fn decode_strips_delimiter() {
        let mut buf = BytesMut::from(&b"hello, linewire!\n"[..]);
        let frame = decode_frame(&mut buf).unwrap();

        assert_eq!(frame.as_bytes(), b"hello, linewire!");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete() {
        let mut buf = BytesMut::from(&b"no delimiter yet"[..]);
        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 16, "incomplete data must stay buffered");
    }

    #[test]
    fn multiple_frames_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"second", &mut buf);
        buf.put_slice(b"thi");

        assert_eq!(decode_frame(&mut buf).unwrap().as_bytes(), b"first");
        assert_eq!(decode_frame(&mut buf).unwrap().as_bytes(), b"second");
        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.as_ref(), b"thi");
    }

    #[test]
    fn empty_payload_is_a_frame() {
        let mut buf = BytesMut::from(&b"\n\n"[..]);
        let first = decode_frame(&mut buf).unwrap();
        let second = decode_frame(&mut buf).unwrap();
        assert!(first.is_empty());
        assert!(second.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn carriage_return_is_payload() {
        let mut buf = BytesMut::from(&b"line\r\n"[..]);
        assert_eq!(decode_frame(&mut buf).unwrap().as_bytes(), b"line\r");
    }

    #[test]
    fn find_delimiter_from_offset() {
        assert_eq!(find_delimiter(b"a\nb\n", 0), Some(1));
        assert_eq!(find_delimiter(b"a\nb\n", 2), Some(3));
        assert_eq!(find_delimiter(b"a\nb\n", 4), None);
        assert_eq!(find_delimiter(b"ab", 10), None);
    }

    #[test]
    fn frame_wire_size() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), 5);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.clone().into_payload(), Bytes::from_static(b"test"));
    }
}
