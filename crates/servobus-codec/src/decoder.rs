//! Reply decoder: framing state machine and polling loop.
//!
//! [`ReplyDecoder`] is the pure byte-at-a-time state machine;
//! [`read_reply`] drives it by busy-polling a [`BusPort`] under one
//! absolute deadline: a decode attempt that has not completed when the
//! timeout elapses fails with `Timeout`, whether the line was silent,
//! trickling a legitimate reply too slowly, or flooding garbage. The
//! deadline is what guarantees termination — discarded and absorbed bytes
//! never enter the frame buffer, so no byte-count bound can. Elapsed time
//! is measured from the start of the attempt and reported in every
//! outcome, success or failure.
//!
//! The loop is deliberately a busy poll. Timeouts are tens of
//! milliseconds, round-trip latency is measured in microseconds, and a
//! blocking read or event dispatch would bury the signal in scheduling
//! jitter.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use servobus_transport::BusPort;
use tracing::{debug, trace};

use crate::checksum::checksum;
use crate::error::{DecodeError, FailureKind, ReplyError};
use crate::frame::{ID_OFFSET, LEN_OFFSET, MARKER, MIN_FRAME_SIZE, PARAMS_OFFSET};
use crate::reply::Reply;
use crate::variant::{OpcodeClass, ProtocolVariant};

/// Where the state machine is within one inbound frame.
///
/// Lives for a single decode attempt; a fresh decoder is built per
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Discarding garbage until the first 0xFF marker.
    SeekingFirstMarker,
    /// One marker seen; anything but a second one resyncs.
    SeekingSecondMarker,
    /// Absorbing redundant markers until the device id byte.
    SeekingId,
    /// Expecting the length field.
    SeekingLength,
    /// Expecting the instruction-echo (DYN1) or ACK/NACK (SCW) byte.
    SeekingOpcode,
    /// Accumulating parameter bytes.
    SeekingParams,
    /// Expecting the trailing checksum byte.
    SeekingChecksum,
    /// Terminal: the buffer holds one structurally complete frame.
    Complete,
}

/// Outcome of feeding one byte to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The frame is not complete yet.
    NeedMore,
    /// The frame is structurally complete; call [`ReplyDecoder::finish`].
    Complete,
}

/// Byte-at-a-time framing state machine for one reply.
///
/// Generic over the protocol variant, which supplies the checksum salt,
/// the length-tolerance rule, and the opcode policy. The internal buffer
/// holds at most `expected_reply_size` bytes, accumulated from the first
/// accepted marker onward; resync discards it.
#[derive(Debug)]
pub struct ReplyDecoder<V: ProtocolVariant> {
    state: DecoderState,
    buf: BytesMut,
    expected_id: u8,
    expected_reply_size: usize,
    params_to_receive: usize,
    _variant: PhantomData<V>,
}

impl<V: ProtocolVariant> ReplyDecoder<V> {
    /// Create a decoder for one reply of `expected_reply_size` total bytes
    /// from device `expected_id`.
    ///
    /// `expected_reply_size` below the minimum frame size is a caller
    /// contract violation.
    pub fn new(expected_id: u8, expected_reply_size: usize) -> Self {
        assert!(
            expected_reply_size >= MIN_FRAME_SIZE,
            "expected reply size {expected_reply_size} below minimum frame size"
        );
        Self {
            state: DecoderState::SeekingFirstMarker,
            buf: BytesMut::with_capacity(expected_reply_size),
            expected_id,
            expected_reply_size,
            params_to_receive: 0,
            _variant: PhantomData,
        }
    }

    /// Current state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes accumulated so far (from the first accepted marker).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed one byte. Returns the classified failure as soon as a
    /// structural violation is detected; the caller is responsible for
    /// purging the port before the next transaction.
    pub fn push(&mut self, byte: u8) -> std::result::Result<Step, FailureKind> {
        // Capacity equals the declared expected size; running past it
        // without completing means the stream is not the reply we were
        // promised.
        if self.state != DecoderState::Complete && self.buf.len() >= self.expected_reply_size {
            return Err(FailureKind::Timeout);
        }

        match self.state {
            DecoderState::SeekingFirstMarker => {
                if byte == MARKER {
                    self.buf.put_u8(byte);
                    self.state = DecoderState::SeekingSecondMarker;
                } else {
                    trace!(protocol = V::NAME, byte = format_args!("{byte:#04X}"), "discarding");
                }
            }
            DecoderState::SeekingSecondMarker => {
                if byte == MARKER {
                    self.buf.put_u8(byte);
                    self.state = DecoderState::SeekingId;
                } else {
                    trace!(protocol = V::NAME, "lone marker, resyncing");
                    self.buf.clear();
                    self.state = DecoderState::SeekingFirstMarker;
                }
            }
            DecoderState::SeekingId => {
                if byte == MARKER {
                    // Redundant marker run in the header; wait for the
                    // last one and keep it out of the buffer.
                    trace!(protocol = V::NAME, "extra header marker, ignoring");
                } else if byte != self.expected_id {
                    debug!(
                        protocol = V::NAME,
                        expected = self.expected_id,
                        received = byte,
                        "reply from wrong device id"
                    );
                    return Err(FailureKind::MismatchedDeviceId);
                } else {
                    self.buf.put_u8(byte);
                    self.state = DecoderState::SeekingLength;
                }
            }
            DecoderState::SeekingLength => {
                if !V::length_acceptable(byte, self.expected_reply_size) {
                    debug!(
                        protocol = V::NAME,
                        declared = byte,
                        expected = self.expected_reply_size,
                        "length field does not match expected reply size"
                    );
                    return Err(FailureKind::InvalidLength);
                }
                self.params_to_receive = usize::from(byte).saturating_sub(2);
                self.buf.put_u8(byte);
                self.state = DecoderState::SeekingOpcode;
            }
            DecoderState::SeekingOpcode => match V::classify_opcode(byte) {
                OpcodeClass::Accepted => {
                    self.buf.put_u8(byte);
                    self.state = if self.params_to_receive == 0 {
                        DecoderState::SeekingChecksum
                    } else {
                        DecoderState::SeekingParams
                    };
                }
                OpcodeClass::NegativeAck => {
                    debug!(protocol = V::NAME, id = self.expected_id, "NACK received");
                    return Err(FailureKind::NegativeAcknowledged);
                }
                OpcodeClass::Unexpected => {
                    debug!(
                        protocol = V::NAME,
                        opcode = format_args!("{byte:#04X}"),
                        "neither ACK nor NACK"
                    );
                    return Err(FailureKind::UnexpectedOpcode);
                }
            },
            DecoderState::SeekingParams => {
                self.buf.put_u8(byte);
                self.params_to_receive -= 1;
                if self.params_to_receive == 0 {
                    self.state = DecoderState::SeekingChecksum;
                }
            }
            DecoderState::SeekingChecksum => {
                self.buf.put_u8(byte);
                self.state = DecoderState::Complete;
            }
            DecoderState::Complete => {}
        }

        Ok(if self.state == DecoderState::Complete {
            Step::Complete
        } else {
            Step::NeedMore
        })
    }

    /// Validate the checksum of a structurally complete frame and split it
    /// into `(raw, params)`.
    ///
    /// A checksum mismatch is only detectable here, after framing
    /// succeeded; the whole attempt is then reported failed.
    pub fn finish(self) -> std::result::Result<(Bytes, Bytes), FailureKind> {
        debug_assert_eq!(self.state, DecoderState::Complete);

        let raw = self.buf.freeze();
        let received = raw[raw.len() - 1];
        let computed = checksum(&raw[ID_OFFSET..raw.len() - 1], V::SALT);
        if received != computed {
            debug!(
                protocol = V::NAME,
                received = format_args!("{received:#04X}"),
                computed = format_args!("{computed:#04X}"),
                "checksum mismatch"
            );
            return Err(FailureKind::InvalidChecksum);
        }

        let param_count = usize::from(raw[LEN_OFFSET]).saturating_sub(2);
        let params = raw.slice(PARAMS_OFFSET..PARAMS_OFFSET + param_count);
        Ok((raw, params))
    }
}

/// Busy-poll `port` until one complete reply arrives, `timeout` elapses,
/// or a structural violation is detected.
///
/// The timeout is absolute: it bounds the whole decode attempt, so the
/// loop terminates even when a chattering bus keeps bytes arriving
/// forever. All failure outcomes carry the total elapsed time. On any
/// failure the caller must purge the port before the next transaction; a
/// late reply would otherwise corrupt the next decode.
pub fn read_reply<V: ProtocolVariant, P: BusPort>(
    port: &mut P,
    expected_id: u8,
    expected_reply_size: usize,
    timeout: Duration,
) -> crate::error::Result<Reply> {
    let start = Instant::now();
    let mut decoder = ReplyDecoder::<V>::new(expected_id, expected_reply_size);

    loop {
        // Deadline first: consumed-but-discarded bytes never reach the
        // frame buffer, so this check is the only termination guarantee
        // under sustained line noise.
        if start.elapsed() >= timeout {
            debug!(
                protocol = V::NAME,
                id = expected_id,
                received = decoder.buffered(),
                expected = expected_reply_size,
                "reply timed out"
            );
            return Err(DecodeError::Reply(ReplyError {
                kind: FailureKind::Timeout,
                elapsed: start.elapsed(),
            }));
        }

        if port.bytes_to_read()? > 0 {
            let byte = port.read_byte()?;
            match decoder.push(byte) {
                Ok(Step::Complete) => {
                    let elapsed = start.elapsed();
                    let (raw, params) = decoder
                        .finish()
                        .map_err(|kind| ReplyError { kind, elapsed })?;
                    return Ok(Reply {
                        raw,
                        params,
                        elapsed,
                    });
                }
                Ok(Step::NeedMore) => {}
                Err(kind) => {
                    return Err(DecodeError::Reply(ReplyError {
                        kind,
                        elapsed: start.elapsed(),
                    }))
                }
            }
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use servobus_transport::MemoryPort;

    use super::*;
    use crate::dyn1::{self, Dyn1};
    use crate::frame::{build_frame, extract_params};
    use crate::scw::{self, Scw, REPLY_SIZE_ACK_NACK, REPLY_SIZE_GET_SRAM};

    const TIMEOUT: Duration = Duration::from_millis(40);

    /// A port that always has one copy of the same byte ready, like a
    /// chattering neighbor on a shared bus.
    struct ChatterPort(u8);

    impl BusPort for ChatterPort {
        fn write_all(&mut self, _bytes: &[u8]) -> servobus_transport::Result<()> {
            Ok(())
        }

        fn bytes_to_read(&mut self) -> servobus_transport::Result<usize> {
            Ok(1)
        }

        fn read_byte(&mut self) -> servobus_transport::Result<u8> {
            Ok(self.0)
        }

        fn purge(&mut self) -> servobus_transport::Result<()> {
            Ok(())
        }
    }

    fn decode<V: ProtocolVariant>(
        stream: &[u8],
        expected_id: u8,
        expected_reply_size: usize,
    ) -> std::result::Result<(Bytes, Bytes), FailureKind> {
        let mut decoder = ReplyDecoder::<V>::new(expected_id, expected_reply_size);
        for &byte in stream {
            match decoder.push(byte)? {
                Step::Complete => return decoder.finish(),
                Step::NeedMore => {}
            }
        }
        Err(FailureKind::Timeout)
    }

    #[test]
    fn clean_frame_roundtrip() {
        let frame = build_frame::<Dyn1>(5, 0x00, &[10, 20, 30, 40, 50, 60]);
        assert_eq!(frame.len(), 12);

        let (raw, params) = decode::<Dyn1>(&frame, 5, 12).unwrap();
        assert_eq!(raw, frame);
        assert_eq!(params.as_ref(), &[10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn resyncs_past_leading_noise() {
        let frame = build_frame::<Dyn1>(5, 0x00, &[1, 2]);
        for noise in [
            &[0x12u8][..],
            &[0x12, 0x9A],
            &[0xFF, 0x01], // lone marker, then garbage
            &[0x00, 0xFF, 0x03],
            &[0x7F, 0x00, 0xFF, 0x20, 0x31],
        ] {
            let mut stream = noise.to_vec();
            stream.extend_from_slice(&frame);

            let (_, params) = decode::<Dyn1>(&stream, 5, frame.len()).unwrap();
            assert_eq!(params.as_ref(), &[1, 2]);
            // The batch extractor must find the same frame.
            assert_eq!(extract_params(&stream), Some(&[1u8, 2][..]));
        }
    }

    #[test]
    fn absorbs_redundant_header_markers() {
        let frame = build_frame::<Dyn1>(5, 0x00, &[7]);
        let mut stream = vec![0xFF, 0xFF]; // doubled header ahead of the real one
        stream.extend_from_slice(&frame[2..]);

        let mut long = frame[..2].to_vec();
        long.extend_from_slice(&stream); // FF FF FF FF id ...
        let (raw, params) = decode::<Dyn1>(&long, 5, frame.len()).unwrap();
        assert_eq!(raw.len(), frame.len());
        assert_eq!(params.as_ref(), &[7]);
    }

    #[test]
    fn wrong_device_id_aborts_immediately() {
        let frame = build_frame::<Dyn1>(6, 0x00, &[]);
        assert_eq!(
            decode::<Dyn1>(&frame, 5, frame.len()),
            Err(FailureKind::MismatchedDeviceId)
        );
    }

    #[test]
    fn length_mismatch_aborts() {
        let frame = build_frame::<Dyn1>(5, 0x00, &[1, 2, 3]);
        // Expecting a 12-byte reply but the frame declares 5 params short.
        assert_eq!(decode::<Dyn1>(&frame, 5, 12), Err(FailureKind::InvalidLength));
    }

    #[test]
    fn corrupted_param_fails_checksum() {
        let frame = build_frame::<Dyn1>(5, 0x00, &[1, 2, 3]);
        let mut corrupted = frame.to_vec();
        corrupted[PARAMS_OFFSET] ^= 0x40;
        assert_eq!(
            decode::<Dyn1>(&corrupted, 5, frame.len()),
            Err(FailureKind::InvalidChecksum)
        );
    }

    #[test]
    fn wrong_salt_fails_checksum() {
        // A frame checksummed with the SCW salt never validates as DYN1.
        let frame = build_frame::<Scw>(5, 0x00, &[1, 2, 3]);
        assert_eq!(
            decode::<Dyn1>(&frame, 5, frame.len()),
            Err(FailureKind::InvalidChecksum)
        );
    }

    #[test]
    fn scw_nack_is_negative_acknowledged() {
        let frame = build_frame::<Scw>(3, scw::REPLY_NACK, &[]);
        assert_eq!(
            decode::<Scw>(&frame, 3, REPLY_SIZE_GET_SRAM),
            Err(FailureKind::NegativeAcknowledged)
        );
    }

    #[test]
    fn scw_unexpected_opcode_aborts() {
        let frame = build_frame::<Scw>(3, 0x77, &[]);
        assert_eq!(
            decode::<Scw>(&frame, 3, REPLY_SIZE_ACK_NACK),
            Err(FailureKind::UnexpectedOpcode)
        );
    }

    #[test]
    fn scw_ack_roundtrip() {
        let frame = build_frame::<Scw>(3, scw::REPLY_ACK, &[]);
        let (raw, params) = decode::<Scw>(&frame, 3, REPLY_SIZE_ACK_NACK).unwrap();
        assert_eq!(raw[crate::frame::OPCODE_OFFSET], scw::REPLY_ACK);
        assert!(params.is_empty());
    }

    #[test]
    fn scw_short_ack_accepted_for_long_expectation() {
        // A masked write expecting a GET-sized reply can still be answered
        // by the fixed six-byte ACK frame.
        let frame = build_frame::<Scw>(3, scw::REPLY_ACK, &[]);
        let (raw, _) = decode::<Scw>(&frame, 3, REPLY_SIZE_GET_SRAM).unwrap();
        assert_eq!(raw.len(), REPLY_SIZE_ACK_NACK);
    }

    #[test]
    fn read_reply_from_port() {
        let mut port = MemoryPort::new();
        let frame = build_frame::<Dyn1>(5, 0x00, &[0x24, 0x01]);
        port.queue_reply(&frame);

        let reply = read_reply::<Dyn1, _>(&mut port, 5, frame.len(), TIMEOUT).unwrap();
        assert_eq!(reply.params.as_ref(), &[0x24, 0x01]);
        assert_eq!(reply.word_value(), Some(0x0124));
        assert!(reply.elapsed > Duration::ZERO);
    }

    #[test]
    fn sustained_garbage_still_times_out() {
        // Non-marker noise arriving on every poll: discarded
        // bytes never reach the frame buffer, so only the absolute
        // deadline can end the attempt.
        let mut port = ChatterPort(0x5A);
        let timeout = Duration::from_millis(10);

        let err = read_reply::<Dyn1, _>(&mut port, 5, 12, timeout).unwrap_err();
        match err {
            DecodeError::Reply(reply_err) => {
                assert_eq!(reply_err.kind, FailureKind::Timeout);
                assert!(reply_err.elapsed >= timeout);
            }
            other => panic!("expected reply error, got {other:?}"),
        }
    }

    #[test]
    fn endless_marker_flood_still_times_out() {
        // 0xFF forever: the header never ends, and absorbed extra markers
        // are not buffered either.
        let mut port = ChatterPort(0xFF);

        let err =
            read_reply::<Dyn1, _>(&mut port, 5, 12, Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::Timeout));
    }

    #[test]
    fn read_reply_trickling_port() {
        // One byte visible per poll; a slow but steady reply completes
        // well inside the deadline.
        let mut port = MemoryPort::new();
        port.trickle(true);
        let frame = dyn1::ping_packet(1);
        port.queue_reply(&frame);

        let reply = read_reply::<Dyn1, _>(&mut port, 1, dyn1::REPLY_SIZE_PING, TIMEOUT).unwrap();
        assert!(reply.params.is_empty());
    }

    #[test]
    fn truncated_reply_times_out() {
        let mut port = MemoryPort::new();
        let frame = build_frame::<Dyn1>(5, 0x00, &[1, 2, 3]);
        port.queue_reply(&frame[..frame.len() - 2]);

        let err = read_reply::<Dyn1, _>(&mut port, 5, frame.len(), Duration::from_millis(5))
            .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::Timeout));
    }

    #[test]
    fn silent_port_times_out_and_reports_elapsed() {
        let mut port = MemoryPort::new();
        let err = read_reply::<Dyn1, _>(&mut port, 5, 12, Duration::from_millis(5)).unwrap_err();
        match err {
            DecodeError::Reply(reply_err) => {
                assert_eq!(reply_err.kind, FailureKind::Timeout);
                assert!(reply_err.elapsed >= Duration::from_millis(5));
            }
            other => panic!("expected reply error, got {other:?}"),
        }
    }

    #[test]
    fn failure_carries_elapsed() {
        let mut port = MemoryPort::new();
        port.queue_reply(&build_frame::<Dyn1>(9, 0x00, &[]));

        let err = read_reply::<Dyn1, _>(&mut port, 5, MIN_FRAME_SIZE, TIMEOUT).unwrap_err();
        match err {
            DecodeError::Reply(reply_err) => {
                assert_eq!(reply_err.kind, FailureKind::MismatchedDeviceId);
            }
            other => panic!("expected reply error, got {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "below minimum frame size")]
    fn undersized_expectation_is_a_contract_violation() {
        let _ = ReplyDecoder::<Dyn1>::new(1, 4);
    }
}
