//! The background task that turns an endpoint's inbound byte stream into frames.
//!
//! One loop runs per endpoint, on its own thread, for the endpoint's whole
//! life. It is the sole owner of the buffered decoder and the sole producer
//! on the inbound channel. The channel has no capacity: every frame is
//! handed directly to the consumer, so a slow consumer stalls the loop, which
//! stops reading and lets transport flow control push back on the peer.
//!
//! The loop ends on the first of:
//! - end of stream (the peer closed the connection),
//! - any read error other than `Interrupted`,
//! - the consumer side of the channel being dropped.
//!
//! A local close shuts the connection down and drops the consumer side, so it
//! ends the loop through one of these even when a frame is mid-hand-off.
//!
//! On exit it shuts the connection down, drops the channel sender, and then
//! fires the lifecycle signal. All causes look the same to observers.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use linewire_frame::{Frame, FrameError, FrameReader};
use linewire_transport::Stream;
use tracing::{debug, trace, warn};

use crate::signal::LifecycleSignal;

/// Why a decode loop stopped. Used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    EndOfStream,
    ReadFailed,
    ConsumerGone,
    /// The endpoint was closed locally.
    Closed,
}

/// Read frames and hand them to `tx` until the stream or the consumer goes away.
pub(crate) fn run<R: Read>(reader: &mut FrameReader<R>, tx: &SyncSender<Frame>) -> Exit {
    loop {
        match reader.read_frame() {
            Ok(frame) => {
                trace!(size = frame.len(), "decoded frame");
                if tx.send(frame).is_err() {
                    return Exit::ConsumerGone;
                }
            }
            Err(FrameError::ConnectionClosed) => return Exit::EndOfStream,
            Err(err) => {
                warn!(error = %err, "read failed; terminating decode loop");
                return Exit::ReadFailed;
            }
        }
    }
}

/// Start the decode loop for one endpoint.
pub(crate) fn spawn(
    mut reader: FrameReader<Stream>,
    tx: SyncSender<Frame>,
    done: LifecycleSignal,
    closed: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("linewire-decode".to_string())
        .spawn(move || {
            let mut exit = run(&mut reader, &tx);
            if closed.load(Ordering::SeqCst) {
                exit = Exit::Closed;
            }

            if let Err(err) = reader.get_ref().shutdown() {
                debug!(error = %err, "shutdown after decode loop exit failed");
            }
            drop(reader);
            drop(tx);

            done.fire();
            debug!(?exit, "decode loop terminated");
        })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Cursor, ErrorKind};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::sync_channel;
    use std::time::Duration;

    use super::*;

    fn collect(wire: &'static [u8]) -> (Vec<Frame>, Exit) {
        let (tx, rx) = sync_channel(0);
        let consumer = thread::spawn(move || rx.iter().collect::<Vec<_>>());

        let mut reader = FrameReader::new(Cursor::new(wire));
        let exit = run(&mut reader, &tx);
        drop(tx);

        (consumer.join().unwrap(), exit)
    }

    #[test]
    fn delivers_frames_in_order_then_ends() {
        let (frames, exit) = collect(b"one\ntwo\nthree\n");
        let payloads: Vec<&[u8]> = frames.iter().map(Frame::as_bytes).collect();
        assert_eq!(payloads, vec![&b"one"[..], &b"two"[..], &b"three"[..]]);
        assert_eq!(exit, Exit::EndOfStream);
    }

    #[test]
    fn empty_stream_delivers_nothing() {
        let (frames, exit) = collect(b"");
        assert!(frames.is_empty());
        assert_eq!(exit, Exit::EndOfStream);
    }

    #[test]
    fn empty_payload_is_delivered() {
        let (frames, _) = collect(b"\n");
        assert_eq!(frames, vec![Frame::new(&b""[..])]);
    }

    #[test]
    fn unterminated_tail_is_not_delivered() {
        let (frames, exit) = collect(b"kept\ndropped");
        assert_eq!(frames, vec![Frame::new(&b"kept"[..])]);
        assert_eq!(exit, Exit::EndOfStream);
    }

    #[test]
    fn read_error_ends_loop_without_retry() {
        let mut reader = FrameReader::new(CountingFailReader { calls: 0 });
        let (tx, _rx) = sync_channel(0);

        assert_eq!(run(&mut reader, &tx), Exit::ReadFailed);
        assert_eq!(reader.get_ref().calls, 1, "a failed stream must not be re-read");
    }

    #[test]
    fn dropped_consumer_ends_loop() {
        let (tx, rx) = sync_channel(0);
        drop(rx);

        let mut reader = FrameReader::new(Cursor::new(&b"orphan\nmore\n"[..]));
        assert_eq!(run(&mut reader, &tx), Exit::ConsumerGone);
    }

    #[test]
    fn unreceived_frame_stalls_reading() {
        let reads = Arc::new(AtomicUsize::new(0));
        let source = LineByLine {
            lines: VecDeque::from([&b"one\n"[..], b"two\n", b"three\n"]),
            reads: Arc::clone(&reads),
        };
        let (tx, rx) = sync_channel(0);
        let producer = thread::spawn(move || {
            let mut reader = FrameReader::new(source);
            run(&mut reader, &tx)
        });

        // Nobody receives: the loop must park on the first hand-off.
        thread::sleep(Duration::from_millis(100));
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        assert_eq!(rx.recv().unwrap().as_bytes(), b"one");
        thread::sleep(Duration::from_millis(100));
        assert!(reads.load(Ordering::SeqCst) <= 2, "read past the pending frame");

        let rest: Vec<Frame> = rx.iter().collect();
        assert_eq!(rest, vec![Frame::new(&b"two"[..]), Frame::new(&b"three"[..])]);
        assert_eq!(producer.join().unwrap(), Exit::EndOfStream);
    }

    /// Yields one line per `read` call and counts the calls that returned data.
    struct LineByLine {
        lines: VecDeque<&'static [u8]>,
        reads: Arc<AtomicUsize>,
    }

    impl Read for LineByLine {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some(line) = self.lines.pop_front() else {
                return Ok(0);
            };
            buf[..line.len()].copy_from_slice(line);
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(line.len())
        }
    }

    struct CountingFailReader {
        calls: usize,
    }

    impl Read for CountingFailReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            self.calls += 1;
            Err(std::io::Error::from(ErrorKind::ConnectionReset))
        }
    }
}
