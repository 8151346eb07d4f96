//! Single-transaction bus client.

use std::time::Duration;

use bytes::Bytes;
use servobus_codec::{
    dyn1::{self, BulkReadEntry, Dyn1},
    read_reply,
    scw::{self, Scw},
    Reply,
};
use servobus_transport::BusPort;
use tracing::{debug, trace};

use crate::error::{BusError, Result};

/// Tunables for bus transactions.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Maximum total time allowed for one reply decode attempt, measured
    /// from the start of the attempt. Bounds the attempt even when a noisy
    /// bus keeps delivering bytes.
    pub reply_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            // Comfortable at 1 Mbaud and still snappy on a stalled bus.
            reply_timeout: Duration::from_millis(40),
        }
    }
}

/// One servo bus: a port plus the transaction discipline.
///
/// The bus is half duplex with exactly one outstanding transaction, so
/// every method purges stale bytes, transmits one packet, and (when the
/// instruction produces a reply) decodes exactly one response before
/// returning. There is no retry and no pipelining; callers own both.
#[derive(Debug)]
pub struct Bus<P: BusPort> {
    port: P,
    config: BusConfig,
}

impl<P: BusPort> Bus<P> {
    /// Wrap a port with the default configuration.
    pub fn new(port: P) -> Self {
        Self::with_config(port, BusConfig::default())
    }

    /// Wrap a port with an explicit configuration.
    pub fn with_config(port: P, config: BusConfig) -> Self {
        Self { port, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Borrow the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Tear down the bus and recover the port.
    pub fn into_port(self) -> P {
        self.port
    }

    fn transmit(&mut self, packet: &Bytes) -> Result<()> {
        // Stale bytes from an earlier timed-out reply would desync the
        // next decode, so the buffer is dropped before every transmit.
        self.port.purge()?;
        trace!(len = packet.len(), "transmitting");
        self.port.write_all(packet)?;
        Ok(())
    }

    fn transact_dyn1(&mut self, packet: Bytes, id: u8, expected_reply_size: usize) -> Result<Reply> {
        self.transmit(&packet)?;
        let reply = read_reply::<Dyn1, _>(&mut self.port, id, expected_reply_size, self.config.reply_timeout)?;
        Ok(reply)
    }

    fn transact_scw(&mut self, packet: Bytes, id: u8, expected_reply_size: usize) -> Result<Reply> {
        self.transmit(&packet)?;
        let reply = read_reply::<Scw, _>(&mut self.port, id, expected_reply_size, self.config.reply_timeout)?;
        Ok(reply)
    }

    /// Ping one device. The reply's opcode byte carries the device's
    /// current error mask.
    pub fn ping(&mut self, id: u8) -> Result<Reply> {
        self.transact_dyn1(dyn1::ping_packet(id), id, dyn1::REPLY_SIZE_PING)
    }

    /// Read `read_len` bytes of the control table starting at `start_addr`.
    pub fn read(&mut self, id: u8, start_addr: u8, read_len: u8) -> Result<Reply> {
        self.transact_dyn1(
            dyn1::read_packet(id, start_addr, read_len),
            id,
            dyn1::read_reply_size(read_len),
        )
    }

    /// Write `data` to the control table starting at `start_addr` and wait
    /// for the status reply.
    pub fn write(&mut self, id: u8, start_addr: u8, data: &[u8]) -> Result<Reply> {
        self.transact_dyn1(dyn1::write_packet(id, start_addr, data), id, dyn1::REPLY_SIZE_WRITE)
    }

    /// Write without a status reply. Returns as soon as the packet is on
    /// the wire; the device stays silent.
    pub fn write_no_reply(&mut self, id: u8, start_addr: u8, data: &[u8]) -> Result<()> {
        self.transmit(&dyn1::write_no_reply_packet(id, start_addr, data))
    }

    /// Reboot one device and wait for the status reply.
    pub fn reboot(&mut self, id: u8) -> Result<Reply> {
        self.transact_dyn1(dyn1::reboot_packet(id), id, dyn1::REPLY_SIZE_WRITE)
    }

    /// Send the device into its bootloader and wait for the status reply.
    pub fn jump_to_bootloader(
        &mut self,
        id: u8,
        delay_ms: u16,
        baud_register: u16,
        jump_address: u16,
    ) -> Result<Reply> {
        self.transact_dyn1(
            dyn1::jump_to_bootloader_packet(id, delay_ms, baud_register, jump_address),
            id,
            dyn1::REPLY_SIZE_WRITE,
        )
    }

    /// Bulk read: one broadcast request, then one reply per entry, decoded
    /// strictly in request order.
    ///
    /// The first decode failure aborts the sequence (the remaining devices
    /// may still transmit; the next transaction's purge discards them) and
    /// names the device whose reply broke down.
    pub fn bulk_read(&mut self, entries: &[BulkReadEntry]) -> Result<Vec<Reply>> {
        self.transmit(&dyn1::bulk_read_packet(entries))?;

        let mut replies = Vec::with_capacity(entries.len());
        for entry in entries {
            let reply = read_reply::<Dyn1, _>(
                &mut self.port,
                entry.device_id,
                entry.reply_size(),
                self.config.reply_timeout,
            )
            .map_err(|source| {
                debug!(device_id = entry.device_id, "bulk read aborted");
                BusError::BulkRead {
                    device_id: entry.device_id,
                    source,
                }
            })?;
            replies.push(reply);
        }
        Ok(replies)
    }

    /// Delegated aggregate read: the delegate device fans the read out to
    /// `device_ids` and answers with one frame.
    ///
    /// The reply payload is the per-device blocks concatenated in
    /// `device_ids` order with no boundary markers; callers slice it by
    /// `read_len`.
    pub fn dsync_read(
        &mut self,
        delegate_id: u8,
        device_ids: &[u8],
        start_addr: u8,
        read_len: u8,
    ) -> Result<Reply> {
        self.transact_dyn1(
            dyn1::dsync_read_packet(delegate_id, device_ids, start_addr, read_len),
            delegate_id,
            dyn1::dsync_read_reply_size(device_ids.len(), read_len),
        )
    }

    /// Read an SCW device's whole EEPROM map.
    pub fn get_eeprom(&mut self, id: u8) -> Result<Reply> {
        self.transact_scw(scw::get_eeprom_packet(id), id, scw::REPLY_SIZE_GET_EEPROM)
    }

    /// Read an SCW device's whole SRAM map.
    pub fn get_sram(&mut self, id: u8) -> Result<Reply> {
        self.transact_scw(scw::get_sram_packet(id), id, scw::REPLY_SIZE_GET_SRAM)
    }

    /// Masked write into an SCW device's EEPROM map, waiting for ACK.
    pub fn write_eeprom(&mut self, id: u8, write_mask: u16, values: &[u8]) -> Result<Reply> {
        self.transact_scw(
            scw::write_eeprom_packet(id, write_mask, values, true),
            id,
            scw::REPLY_SIZE_ACK_NACK,
        )
    }

    /// Masked write into an SCW device's SRAM map, waiting for ACK.
    pub fn write_sram(&mut self, id: u8, write_mask: u16, values: &[u8]) -> Result<Reply> {
        self.transact_scw(
            scw::write_sram_packet(id, write_mask, values, true),
            id,
            scw::REPLY_SIZE_ACK_NACK,
        )
    }

    /// Commit an SCW device's EEPROM map to non-volatile storage, waiting
    /// for ACK.
    pub fn burn_eeprom(&mut self, id: u8) -> Result<Reply> {
        self.transact_scw(scw::burn_eeprom_packet(id), id, scw::REPLY_SIZE_ACK_NACK)
    }
}
