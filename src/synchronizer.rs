use std::time::{Duration, Instant};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};
use crate::frame::{SIZE_POS, START_MARKER};
use crate::transport::{Transport, TransportError};

/// Extracts frames from the raw byte stream: it skips bytes up to a start marker, and then reads
///  the number of bytes announced by the frame size field.
///
/// The synchronizer knows nothing about checksums - the bytes it returns may well be damaged.
pub struct FrameSynchronizer {
    /// Time granted for reading the rest of a frame once its start marker was seen, even if that
    ///  exceeds the caller's wait budget. A frame that starts just before the budget runs out
    ///  should not be torn apart.
    body_grace: Duration,
}

impl FrameSynchronizer {
    pub fn new(body_grace: Duration) -> FrameSynchronizer {
        FrameSynchronizer { body_grace }
    }

    /// Waits up to `wait` for a frame to start, returning the complete frame bytes including
    ///  start marker and checksum.
    ///
    /// `None` means 'no frame', which is not an error: there was no start marker within the time
    ///  budget, the frame was incomplete or malformed, or it did not fit into `capacity` bytes.
    ///  Only errors reported by the transport are returned as errors.
    pub fn get_frame(&self, transport: &mut impl Transport, capacity: usize, wait: Duration) -> Result<Option<Bytes>, TransportError> {
        let deadline = Instant::now() + wait;

        if !self.seek_start_marker(transport, deadline)? {
            return Ok(None);
        }

        let body_deadline = deadline.max(Instant::now() + self.body_grace);

        let mut size_buf = [0u8; 1];
        if read_until(transport, &mut size_buf, body_deadline)? == 0 {
            debug!("start marker without frame size");
            return Ok(None);
        }
        let frame_size = size_buf[0] as usize;

        // NB: sequence number and checksum are always present
        if frame_size < 2 {
            debug!("malformed frame: frame size {}", frame_size);
            return Ok(None);
        }

        let total_len = SIZE_POS + 1 + frame_size;
        let mut frame = BytesMut::with_capacity(total_len);
        frame.put_u8(START_MARKER);
        frame.put_u8(size_buf[0]);
        frame.resize(total_len, 0);

        let num_read = read_until(transport, &mut frame[SIZE_POS + 1..], body_deadline)?;
        if num_read < frame_size {
            debug!("incomplete frame: got {} of {} bytes after frame size", num_read, frame_size);
            return Ok(None);
        }

        if total_len >= capacity {
            debug!("size limit: frame of {} bytes does not fit into {} bytes", total_len, capacity);
            return Ok(None);
        }

        trace!("received frame of {} bytes", total_len);
        Ok(Some(frame.freeze()))
    }

    /// reads single bytes until a start marker is found (`true`) or the deadline is reached
    ///  (`false`)
    fn seek_start_marker(&self, transport: &mut impl Transport, deadline: Instant) -> Result<bool, TransportError> {
        let mut buf = [0u8; 1];
        let mut num_skipped = 0usize;

        loop {
            let num_read = transport.receive(&mut buf, deadline)?;
            if num_read == 1 {
                if buf[0] == START_MARKER {
                    if num_skipped > 0 {
                        debug!("skipped {} bytes before start marker", num_skipped);
                    }
                    return Ok(true);
                }
                num_skipped += 1;
            }

            if Instant::now() >= deadline {
                trace!("timeout seeking start marker, {} bytes skipped", num_skipped);
                return Ok(false);
            }
        }
    }
}

/// fills `buf` with as many bytes as arrive before the deadline, returning their number
fn read_until(transport: &mut impl Transport, buf: &mut [u8], deadline: Instant) -> Result<usize, TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        filled += transport.receive(&mut buf[filled..], deadline)?;
        if Instant::now() >= deadline {
            break;
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_data_frame;
    use crate::seq_num::SeqNum;
    use crate::test_util::ScriptedTransport;
    use crate::transport::MockTransport;
    use rstest::rstest;

    const WAIT: Duration = Duration::from_millis(30);

    fn synchronizer() -> FrameSynchronizer {
        FrameSynchronizer::new(Duration::from_millis(30))
    }

    fn data_frame(payload: &[u8]) -> Vec<u8> {
        build_data_frame(payload, SeqNum::ZERO).to_vec()
    }

    #[test]
    fn test_single_frame() {
        let frame = data_frame(b"abc");
        let mut transport = ScriptedTransport::opened().then_bytes(frame.clone());

        let received = synchronizer().get_frame(&mut transport, 100, WAIT).unwrap();
        assert_eq!(received.unwrap().as_ref(), frame.as_slice());
    }

    #[test]
    fn test_skips_garbage_before_marker() {
        let frame = data_frame(b"abc");
        let mut transport = ScriptedTransport::opened()
            .then_bytes(vec![1, 2, 3, 0xD3])
            .then_bytes(frame.clone());

        let received = synchronizer().get_frame(&mut transport, 100, WAIT).unwrap();
        assert_eq!(received.unwrap().as_ref(), frame.as_slice());
    }

    #[test]
    fn test_frames_are_read_one_at_a_time() {
        let first = data_frame(b"first");
        let second = data_frame(b"second");
        let mut transport = ScriptedTransport::opened()
            .then_bytes([first.clone(), second.clone()].concat());

        let sync = synchronizer();
        assert_eq!(sync.get_frame(&mut transport, 100, WAIT).unwrap().unwrap().as_ref(), first.as_slice());
        assert_eq!(sync.get_frame(&mut transport, 100, WAIT).unwrap().unwrap().as_ref(), second.as_slice());
    }

    #[test]
    fn test_frame_split_across_reads() {
        let frame = data_frame(b"split");
        let mut transport = ScriptedTransport::opened()
            .then_bytes(frame[..4].to_vec())
            .then_bytes(frame[4..].to_vec());

        let received = synchronizer().get_frame(&mut transport, 100, WAIT).unwrap();
        assert_eq!(received.unwrap().as_ref(), frame.as_slice());
    }

    #[test]
    fn test_empty_payload() {
        let frame = data_frame(b"");
        let mut transport = ScriptedTransport::opened().then_bytes(frame.clone());

        let received = synchronizer().get_frame(&mut transport, 100, WAIT).unwrap();
        assert_eq!(received.unwrap().len(), 4);
    }

    #[test]
    fn test_timeout_without_marker() {
        let mut transport = ScriptedTransport::opened().then_bytes(vec![1, 2, 3]);

        let started = Instant::now();
        assert_eq!(synchronizer().get_frame(&mut transport, 100, WAIT).unwrap(), None);
        assert!(started.elapsed() >= WAIT);
    }

    #[test]
    fn test_timeout_on_silence() {
        let mut transport = ScriptedTransport::opened().then_silence();
        assert_eq!(synchronizer().get_frame(&mut transport, 100, WAIT).unwrap(), None);
    }

    #[test]
    fn test_incomplete_frame() {
        let frame = data_frame(b"abcdef");
        let mut transport = ScriptedTransport::opened().then_bytes(frame[..6].to_vec());
        assert_eq!(synchronizer().get_frame(&mut transport, 100, WAIT).unwrap(), None);
    }

    #[rstest]
    #[case::zero(vec![0xD4, 0])]
    #[case::one(vec![0xD4, 1, 0])]
    fn test_malformed_frame_size(#[case] bytes: Vec<u8>) {
        let mut transport = ScriptedTransport::opened().then_bytes(bytes);
        assert_eq!(synchronizer().get_frame(&mut transport, 100, WAIT).unwrap(), None);
    }

    #[rstest]
    #[case::fits(8, true)]
    #[case::exact(7, false)]
    #[case::too_small(5, false)]
    fn test_capacity(#[case] capacity: usize, #[case] expect_frame: bool) {
        let frame = data_frame(b"abc"); // 7 bytes
        let mut transport = ScriptedTransport::opened().then_bytes(frame);
        let received = synchronizer().get_frame(&mut transport, capacity, WAIT).unwrap();
        assert_eq!(received.is_some(), expect_frame);
    }

    #[test]
    fn test_oversized_frame_is_drained() {
        let big = data_frame(&[7u8; 50]);
        let small = data_frame(b"ok");
        let mut transport = ScriptedTransport::opened()
            .then_bytes([big, small.clone()].concat());

        let sync = synchronizer();
        assert_eq!(sync.get_frame(&mut transport, 20, WAIT).unwrap(), None);
        assert_eq!(sync.get_frame(&mut transport, 20, WAIT).unwrap().unwrap().as_ref(), small.as_slice());
    }

    #[test]
    fn test_transport_error_is_propagated() {
        let mut transport = MockTransport::new();
        transport.expect_receive()
            .returning(|_, _| Err(TransportError::Io("line broken".to_string())));

        assert_eq!(
            synchronizer().get_frame(&mut transport, 100, WAIT),
            Err(TransportError::Io("line broken".to_string()))
        );
    }

    #[test]
    fn test_transport_error_inside_frame_is_propagated() {
        let mut transport = ScriptedTransport::opened()
            .then_bytes(vec![0xD4, 5])
            .then_failure(TransportError::Io("line broken".to_string()));

        assert!(synchronizer().get_frame(&mut transport, 100, WAIT).is_err());
    }
}
