//! # Transfer Engine
//!
//! Runs logical register reads and writes as a strict sequence of single
//! packet round trips over a [`RegisterBus`].
//!
//! Reads wider than one packet are split into 32-register chunks and
//! reassembled in order. The first failing chunk aborts the whole read.
//! Requests always go out as full 68-byte buffers.
//! Nothing is retried here; every failure reaches the caller as an
//! [`RcioError`](crate::error::RcioError).

pub mod response;

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{RcioError, Result};
use crate::px4io::decoder::decode_packet;
use crate::px4io::encoder::encode_packet_padded;
use crate::px4io::protocol::{Packet, MAX_REGISTERS, PACKET_SIZE, TRANSFER_PACING_DELAY};
use crate::serial::RegisterBus;
pub use response::validate_response;

/// Register transfer engine bound to one exclusive bus
#[derive(Debug)]
pub struct TransferEngine<B: RegisterBus> {
    bus: B,
    pacing: Duration,
}

impl<B: RegisterBus> TransferEngine<B> {
    /// Create an engine with the default 150µs pacing delay
    pub fn new(bus: B) -> Self {
        Self::with_pacing(bus, TRANSFER_PACING_DELAY)
    }

    /// Create an engine with a custom pacing delay
    pub fn with_pacing(bus: B, pacing: Duration) -> Self {
        Self { bus, pacing }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// One request/response round trip
    ///
    /// Drops stale input, sleeps for the pacing delay, writes the request
    /// padded to 68 bytes, sleeps again, then reads one full 68-byte
    /// buffer. The decoded response is returned without validation.
    ///
    /// # Errors
    ///
    /// Returns `Transport` on bus failures and decoder errors for a
    /// response whose count bits are out of range.
    pub async fn transfer(&mut self, request: &Packet) -> Result<Packet> {
        let encoded = encode_packet_padded(request);
        trace!(page = request.page, offset = request.offset, "tx {:02X?}", &encoded[..request.encoded_len()]);

        self.bus.clear_input().await.map_err(RcioError::Transport)?;

        self.pause().await;
        self.bus.write_all(&encoded).await.map_err(RcioError::Transport)?;
        self.bus.flush().await.map_err(RcioError::Transport)?;

        self.pause().await;
        let mut buffer = [0u8; PACKET_SIZE];
        self.bus.read_exact(&mut buffer).await.map_err(RcioError::Transport)?;
        trace!(page = request.page, offset = request.offset, "rx {:02X?}", &buffer[..]);

        decode_packet(&buffer)
    }

    /// Read `count` registers starting at `offset`
    ///
    /// Chunk offsets saturate at 255 instead of wrapping. When
    /// `require_exact` is false a short chunk ends the read and whatever
    /// was received so far is returned; otherwise it is a `CountMismatch`.
    /// A chunk carrying more registers than requested is always a
    /// `CountMismatch`, and a reply for a different page or offset is a
    /// `CorruptResponse`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rcio_bridge::config::SerialConfig;
    /// use rcio_bridge::px4io::pages::Page;
    /// use rcio_bridge::serial::SerialBus;
    /// use rcio_bridge::transfer::TransferEngine;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut engine = TransferEngine::new(SerialBus::open(&SerialConfig::default())?);
    ///     let config = engine.read(Page::Config.into(), 0, 9, true).await?;
    ///     println!("protocol version {}", config[0]);
    ///     Ok(())
    /// }
    /// ```
    pub async fn read(
        &mut self,
        page: u8,
        offset: u8,
        count: usize,
        require_exact: bool,
    ) -> Result<Vec<u16>> {
        let mut registers = Vec::with_capacity(count.min(MAX_REGISTERS * 8));
        let mut produced = 0;

        if count > MAX_REGISTERS {
            debug!(page, offset, count, "chunked read of {} packets", count.div_ceil(MAX_REGISTERS));
        }

        while produced < count {
            let request_offset = (offset as usize + produced).min(u8::MAX as usize) as u8;
            let request_count = (count - produced).min(MAX_REGISTERS);

            let request = Packet::read_request(page, request_offset, request_count)?;
            let response = self.transfer(&request).await?;
            self.check(&request, &response)?;

            let received = response.registers.len();
            if received > request_count || (require_exact && received < request_count) {
                warn!(page, offset = request_offset, request_count, received, "register count mismatch");
                return Err(RcioError::CountMismatch {
                    requested: request_count,
                    received,
                });
            }

            registers.extend_from_slice(&response.registers);

            if received < request_count {
                debug!(page, offset = request_offset, request_count, received, "short read, stopping");
                break;
            }
            produced += request_count;
        }

        Ok(registers)
    }

    /// Write `values` starting at `offset` in a single packet
    ///
    /// # Errors
    ///
    /// Returns `TooManyRegisters` without touching the bus if more than 32
    /// values are given.
    pub async fn write(&mut self, page: u8, offset: u8, values: &[u16]) -> Result<()> {
        let request = Packet::write_request(page, offset, values)?;
        let response = self.transfer(&request).await?;
        self.check(&request, &response)
    }

    /// Read a single register
    pub async fn read_register(&mut self, page: u8, offset: u8) -> Result<u16> {
        let registers = self.read(page, offset, 1, true).await?;
        registers.first().copied().ok_or(RcioError::CountMismatch {
            requested: 1,
            received: 0,
        })
    }

    /// Write a single register
    pub async fn write_register(&mut self, page: u8, offset: u8, value: u16) -> Result<()> {
        self.write(page, offset, &[value]).await
    }

    fn check(&self, request: &Packet, response: &Packet) -> Result<()> {
        validate_response(response).inspect_err(|e| {
            warn!(page = response.page, offset = response.offset, "response rejected: {}", e);
        })?;

        // The board echoes the request's address in its reply
        if (response.page, response.offset) != (request.page, request.offset) {
            warn!(
                page = request.page,
                offset = request.offset,
                reply_page = response.page,
                reply_offset = response.offset,
                "reply for another request"
            );
            return Err(RcioError::CorruptResponse(format!(
                "reply addressed to page {} offset {}, expected page {} offset {}",
                response.page, response.offset, request.page, request.offset
            )));
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::px4io::protocol::ResponseCode;
    use crate::serial::port_trait::mocks::{ScriptedBus, SimulatedBoard};
    use crate::serial::port_trait::MockRegisterBus;
    use std::io;

    fn scripted() -> (ScriptedBus, TransferEngine<ScriptedBus>) {
        let bus = ScriptedBus::new();
        (bus.clone(), TransferEngine::with_pacing(bus, Duration::ZERO))
    }

    fn board(page: u8, values: &[u16]) -> (SimulatedBoard, TransferEngine<SimulatedBoard>) {
        let board = SimulatedBoard::new().with_page(page, values);
        (board.clone(), TransferEngine::with_pacing(board, Duration::ZERO))
    }

    fn ramp(len: usize) -> Vec<u16> {
        (0..len).map(|i| 1000 + i as u16).collect()
    }

    fn config_fixture() -> [u8; PACKET_SIZE] {
        let mut buffer = [0u8; PACKET_SIZE];
        buffer[..22].copy_from_slice(&[
            0x09, 0x64, 0x00, 0x00, 0x04, 0x00, 0x02, 0x00, 0x03, 0x00, 0x40, 0x00,
            0x08, 0x00, 0x0E, 0x00, 0x10, 0x00, 0x02, 0x00, 0x00, 0x00,
        ]);
        buffer
    }

    #[test]
    fn test_default_pacing() {
        let engine = TransferEngine::new(ScriptedBus::new());
        assert_eq!(engine.pacing(), Duration::from_micros(150));
    }

    #[tokio::test]
    async fn test_config_page_end_to_end() {
        let (bus, mut engine) = scripted();
        bus.push_response(config_fixture());

        let registers = engine.read(0, 0, 9, true).await.unwrap();
        assert_eq!(registers, vec![4, 2, 3, 64, 8, 14, 16, 2, 0]);

        let requests = bus.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), PACKET_SIZE);
        assert_eq!(requests[0][0] & 0x3F, 9);
        assert_eq!(requests[0][0] & 0xC0, 0x00);
        assert_eq!(requests[0][1], 0xCC);
        assert_eq!(&requests[0][2..4], &[0, 0]);
        assert!(requests[0][4..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_response_code_taxonomy() {
        let (bus, mut engine) = scripted();

        bus.push_packet(ResponseCode::Success, 4, 0, &[1500, 1501]);
        assert_eq!(engine.read(4, 0, 2, true).await.unwrap(), vec![1500, 1501]);

        let mut bad_crc = config_fixture();
        bad_crc[1] ^= 0x10;
        bus.push_response(bad_crc);
        assert!(matches!(engine.read(0, 0, 9, true).await, Err(RcioError::CorruptResponse(_))));

        bus.push_packet(ResponseCode::Corrupt, 4, 0, &[]);
        assert!(matches!(engine.read(4, 0, 2, true).await, Err(RcioError::RequestRejectedCorrupt)));

        bus.push_packet(ResponseCode::Error, 4, 0, &[]);
        assert!(matches!(engine.read(4, 0, 2, true).await, Err(RcioError::RequestRejectedError)));

        let mut reserved = Packet::new(0xC0, 4, 0, vec![]).unwrap();
        reserved.seal();
        bus.push_response(encode_packet_padded(&reserved));
        assert!(matches!(engine.read(4, 0, 2, true).await, Err(RcioError::CorruptResponse(_))));
    }

    #[tokio::test]
    async fn test_exact_chunking_boundary() {
        let (board, mut engine) = board(51, &ramp(65));

        let registers = engine.read(51, 0, 64, true).await.unwrap();
        assert_eq!(registers, ramp(64));
        let requests = board.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests.iter().map(|r| (r.offset, r.count())).collect::<Vec<_>>(),
            vec![(0, 32), (32, 32)]
        );
    }

    #[tokio::test]
    async fn test_chunking_with_remainder() {
        let (board, mut engine) = board(51, &ramp(65));

        let registers = engine.read(51, 0, 65, true).await.unwrap();
        assert_eq!(registers, ramp(65));
        assert_eq!(
            board.requests().iter().map(|r| (r.offset, r.count())).collect::<Vec<_>>(),
            vec![(0, 32), (32, 32), (64, 1)]
        );
    }

    #[tokio::test]
    async fn test_offset_saturates_instead_of_wrapping() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Success, 0, 250, &ramp(32));
        bus.push_packet(ResponseCode::Success, 0, 255, &ramp(8));

        let registers = engine.read(0, 250, 40, true).await.unwrap();
        assert_eq!(registers.len(), 40);

        let requests = bus.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!((requests[0][3], requests[0][0] & 0x3F), (250, 32));
        assert_eq!((requests[1][3], requests[1][0] & 0x3F), (255, 8));
        assert_eq!(requests[0][1], 0x6E);
        assert_eq!(requests[1][1], 0x86);
    }

    #[tokio::test]
    async fn test_short_read_tolerated() {
        let (board, mut engine) = board(5, &ramp(40));

        let registers = engine.read(5, 0, 64, false).await.unwrap();
        assert_eq!(registers, ramp(40));
        assert_eq!(board.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_short_read_stops_iterating() {
        let (board, mut engine) = board(5, &ramp(10));

        let registers = engine.read(5, 0, 80, false).await.unwrap();
        assert_eq!(registers, ramp(10));
        assert_eq!(board.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_short_read_rejected_when_exact() {
        let (_board, mut engine) = board(5, &ramp(40));

        match engine.read(5, 0, 64, true).await {
            Err(RcioError::CountMismatch { requested, received }) => {
                assert_eq!(requested, 32);
                assert_eq!(received, 8);
            }
            other => panic!("Expected CountMismatch, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extra_registers_always_rejected() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Success, 4, 0, &[1, 2, 3]);

        assert!(matches!(
            engine.read(4, 0, 2, false).await,
            Err(RcioError::CountMismatch { requested: 2, received: 3 })
        ));
    }

    #[tokio::test]
    async fn test_failed_chunk_discards_partial_result() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Success, 51, 0, &ramp(32));
        bus.push_packet(ResponseCode::Error, 51, 32, &[]);

        assert!(matches!(
            engine.read(51, 0, 65, true).await,
            Err(RcioError::RequestRejectedError)
        ));
        // The third chunk is never requested
        assert_eq!(bus.get_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_count_read_skips_bus() {
        let (bus, mut engine) = scripted();
        assert!(engine.read(4, 0, 0, true).await.unwrap().is_empty());
        assert!(bus.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_write_wire_format() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Success, 50, 14, &[]);

        engine.write(50, 14, &[22027]).await.unwrap();
        let requests = bus.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), PACKET_SIZE);
        assert_eq!(&requests[0][..6], &[0x41, 0xC4, 50, 14, 0x0B, 0x56]);
        assert!(requests[0][6..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_every_request_uses_full_buffer() {
        let (bus, mut engine) = scripted();
        bus.push_response(config_fixture());
        bus.push_packet(ResponseCode::Success, 50, 14, &[]);
        bus.push_packet(ResponseCode::Success, 51, 0, &ramp(32));
        bus.push_packet(ResponseCode::Success, 51, 32, &ramp(8));

        engine.read(0, 0, 9, true).await.unwrap();
        engine.write(50, 14, &[22027]).await.unwrap();
        engine.read(51, 0, 40, true).await.unwrap();

        let sizes: Vec<usize> = bus.get_requests().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![PACKET_SIZE; 4]);
    }

    #[tokio::test]
    async fn test_reply_for_other_page_rejected() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Success, 4, 0, &[4000, 4001]);

        match engine.read(5, 0, 2, true).await {
            Err(RcioError::CorruptResponse(msg)) => assert!(msg.contains("page 4")),
            other => panic!("Expected CorruptResponse, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reply_for_other_offset_rejected() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Success, 50, 12, &[]);

        assert!(matches!(
            engine.write(50, 14, &[22027]).await,
            Err(RcioError::CorruptResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_late_reply_discarded_before_next_request() {
        let board = SimulatedBoard::new()
            .with_page(4u8, &[4000, 4001])
            .with_page(5u8, &[5000, 5001]);
        let mut engine = TransferEngine::with_pacing(board.clone(), Duration::ZERO);

        board.stall_next_reply();
        assert!(matches!(
            engine.read(4, 0, 2, true).await,
            Err(RcioError::Transport(e)) if e.kind() == io::ErrorKind::TimedOut
        ));

        assert_eq!(engine.read(5, 0, 2, true).await.unwrap(), vec![5000, 5001]);
    }

    #[tokio::test]
    async fn test_input_cleared_before_each_write() {
        let mut seq = mockall::Sequence::new();
        let mut bus = MockRegisterBus::new();
        bus.expect_clear_input().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        bus.expect_write_all()
            .withf(|data| data.len() == PACKET_SIZE)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        bus.expect_flush().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        bus.expect_read_exact()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|buffer| {
                let mut reply = Packet::new(0x00, 50, 14, vec![]).unwrap();
                reply.seal();
                buffer.copy_from_slice(&encode_packet_padded(&reply));
                Ok(())
            });

        let mut engine = TransferEngine::with_pacing(bus, Duration::ZERO);
        tokio_test::assert_ok!(engine.write(50, 14, &[22027]).await);
    }

    #[tokio::test]
    async fn test_huge_count_fails_on_bus_not_allocation() {
        let (bus, mut engine) = scripted();
        assert!(matches!(
            engine.read(4, 0, usize::MAX, true).await,
            Err(RcioError::Transport(e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
        assert_eq!(bus.get_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_write_stores_values() {
        let (board, mut engine) = board(54, &[0; 8]);

        engine.write(54, 2, &[1100, 1200, 1300]).await.unwrap();
        assert_eq!(board.page(54).unwrap(), vec![0, 0, 1100, 1200, 1300, 0, 0, 0]);
        assert_eq!(engine.read(54, 3, 1, true).await.unwrap(), vec![1200]);
    }

    #[tokio::test]
    async fn test_write_too_many_registers() {
        let (bus, mut engine) = scripted();

        assert!(matches!(
            engine.write(54, 0, &[1500; 33]).await,
            Err(RcioError::TooManyRegisters { count: 33 })
        ));
        assert!(bus.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_write_rejected() {
        let (board, mut engine) = board(50, &[0; 15]);
        board.reject_page(50u8);

        assert!(matches!(
            engine.write(50, 14, &[22027]).await,
            Err(RcioError::RequestRejectedError)
        ));
    }

    #[tokio::test]
    async fn test_write_response_crc_checked() {
        let (bus, mut engine) = scripted();
        let mut reply = Packet::new(0x00, 50, 14, vec![]).unwrap();
        reply.seal();
        let mut buffer = encode_packet_padded(&reply);
        buffer[1] ^= 0x80;
        bus.push_response(buffer);

        assert!(matches!(
            engine.write(50, 14, &[22027]).await,
            Err(RcioError::CorruptResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_single_register_helpers() {
        let (board, mut engine) = board(127, &[0]);

        engine.write_register(127, 0, 1).await.unwrap();
        assert_eq!(engine.read_register(127, 0).await.unwrap(), 1);
        assert_eq!(board.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_page_is_an_error_reply() {
        let (_board, mut engine) = board(0, &ramp(9));
        assert!(matches!(
            engine.read(99, 0, 4, false).await,
            Err(RcioError::RequestRejectedError)
        ));
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_as_transport() {
        let mut bus = MockRegisterBus::new();
        bus.expect_clear_input().returning(|| Ok(()));
        bus.expect_write_all()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
        bus.expect_read_exact().never();

        let mut engine = TransferEngine::with_pacing(bus, Duration::ZERO);
        match engine.read(0, 0, 9, true).await {
            Err(RcioError::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_timeout_surfaces_as_transport() {
        let mut bus = MockRegisterBus::new();
        bus.expect_clear_input().returning(|| Ok(()));
        bus.expect_write_all().returning(|_| Ok(()));
        bus.expect_flush().returning(|| Ok(()));
        bus.expect_read_exact()
            .returning(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "no response")));

        let mut engine = TransferEngine::with_pacing(bus, Duration::ZERO);
        let result = engine.write(50, 14, &[22027]).await;
        assert!(matches!(result, Err(RcioError::Transport(e)) if e.kind() == io::ErrorKind::TimedOut));
    }

    #[tokio::test]
    async fn test_transfer_returns_unvalidated_response() {
        let (bus, mut engine) = scripted();
        bus.push_packet(ResponseCode::Error, 4, 0, &[]);

        let request = Packet::read_request(4, 0, 2).unwrap();
        let response = tokio_test::assert_ok!(engine.transfer(&request).await);
        assert_eq!(response.code(), u8::from(ResponseCode::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_on_both_sides_of_transfer() {
        let bus = ScriptedBus::new();
        bus.push_packet(ResponseCode::Success, 4, 0, &[1500]);
        let mut engine = TransferEngine::with_pacing(bus, Duration::from_millis(5));

        let start = tokio::time::Instant::now();
        engine.read(4, 0, 1, true).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
