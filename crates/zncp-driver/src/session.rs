//! The blocking command dispatcher.
//!
//! A [`Session`] owns the transport, a single frame buffer, and the
//! outgoing transaction sequence. Every operation follows the same
//! shape: validate arguments locally (no bus traffic on bad input),
//! build the request payload, run the exchange, check the response's
//! status byte, and for some operations block until a matching
//! asynchronous indication arrives.
//!
//! The frame buffer is single-slot: each operation overwrites the
//! previous response. Exactly one exchange is ever in flight.

use std::time::Duration;

use bytes::BufMut;
use log::{debug, info};
use zncp_protocol::*;

use crate::config::{ApplicationConfig, ModuleConfig};
use crate::transport::Transport;
use crate::{Bus, WaitStrategy};

/// Pause between polls while waiting for an asynchronous indication.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const POLL_INTERVAL_MS: u64 = 100;

/// How long a data request gets to produce its delivery confirm.
const DATA_CONFIRM_WAIT: Duration = Duration::from_secs(2);

/// How long remote ZDO queries get to answer over the air.
const ZDO_RESPONSE_WAIT: Duration = Duration::from_secs(10);

/// How long the module gets to announce itself after a reset.
const RESET_INDICATION_WAIT: Duration = Duration::from_secs(5);

/// How long network formation or joining may take during startup.
const STARTUP_WAIT: Duration = Duration::from_secs(15);

/// Longest text a user descriptor can hold.
const USER_DESCRIPTOR_LEN: usize = 16;

fn poll_count(timeout: Duration) -> u64 {
    (timeout.as_millis() as u64).div_ceil(POLL_INTERVAL_MS).max(1)
}

// ============================================================================
// Response types
// ============================================================================

/// Firmware identification from SYS_VERSION.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub transport_revision: u8,
    pub product_id: u8,
    /// major, minor, maintenance
    pub firmware: (u8, u8, u8),
}

/// Result of an IEEE- or network-address lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResponse {
    pub ieee_address: IeeeAddress,
    pub short_address: ShortAddress,
    /// Index of the first entry of `associated` in the device's full
    /// child table.
    pub start_index: u8,
    /// Short addresses of associated devices, when the request asked
    /// for them.
    pub associated: Vec<ShortAddress>,
}

/// A remote device's node descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// Device that answered the query.
    pub source: ShortAddress,
    /// Device the descriptor describes.
    pub network_address: ShortAddress,
    /// 0 coordinator, 1 router, 2 end device.
    pub logical_type: u8,
    pub frequency_band: u8,
    pub mac_capabilities: u8,
    pub manufacturer_code: u16,
    pub max_buffer_size: u8,
    pub max_incoming_transfer: u16,
    pub server_mask: u16,
    pub max_outgoing_transfer: u16,
    pub descriptor_capabilities: u8,
}

// ============================================================================
// Session
// ============================================================================

/// A blocking command session with the module.
pub struct Session<B, W> {
    transport: Transport<B, W>,
    frame: Frame,
    sequence: u8,
    ack_mode: AckMode,
}

impl<B: Bus, W: WaitStrategy> Session<B, W> {
    pub fn new(bus: B, wait: W) -> Self {
        Session {
            transport: Transport::new(bus, wait),
            frame: Frame::new(),
            sequence: 0,
            ack_mode: AckMode::Mac,
        }
    }

    /// Acknowledgement policy applied to subsequent data requests.
    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub fn set_ack_mode(&mut self, mode: AckMode) {
        self.ack_mode = mode;
    }

    // ===== internals =====

    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn request(&mut self, command: u16, payload: &[u8]) -> Result<(), ModuleError> {
        self.frame.set(command, payload)?;
        self.transport.send(&mut self.frame)
    }

    /// Request whose response leads with a status byte.
    fn request_ok(&mut self, command: u16, payload: &[u8]) -> Result<(), ModuleError> {
        self.request(command, payload)?;
        self.check_status()
    }

    fn check_status(&self) -> Result<(), ModuleError> {
        match self.frame.status() {
            Some(STATUS_SUCCESS) | None => Ok(()),
            Some(code) => Err(ModuleError::Status(code)),
        }
    }

    /// The response payload, or [`ModuleError::MalformedResponse`] if the module
    /// returned fewer bytes than the response type requires.
    fn payload_at_least(&self, len: usize) -> Result<&[u8], ModuleError> {
        let payload = self.frame.payload();
        if payload.len() < len {
            return Err(ModuleError::MalformedResponse);
        }
        Ok(payload)
    }

    // ===== receive path =====

    /// Whether the module is signalling a queued indication.
    pub fn message_waiting(&mut self) -> bool {
        self.transport.message_waiting()
    }

    /// Fetch and classify one queued indication, without blocking.
    /// Returns [`Incoming::None`] when nothing is pending.
    pub fn receive(&mut self) -> Result<Incoming, ModuleError> {
        if !self.transport.message_waiting() {
            return Ok(Incoming::None);
        }
        self.transport.poll(&mut self.frame)?;
        Ok(Incoming::classify(&self.frame))
    }

    /// Block until an indication with the given command id arrives.
    ///
    /// Polls at [`POLL_INTERVAL`]; unrelated indications arriving in
    /// the meantime are classified, logged, and discarded; they never
    /// terminate the wait. Returns [`ModuleError::Timeout`] once
    /// `ceil(timeout / POLL_INTERVAL)` polls have elapsed without a
    /// match.
    pub fn wait_for(&mut self, command: u16, timeout: Duration) -> Result<Incoming, ModuleError> {
        for _ in 0..poll_count(timeout) {
            if self.transport.message_waiting() {
                self.transport.poll(&mut self.frame)?;
                if self.frame.command() == command {
                    return Ok(Incoming::classify(&self.frame));
                }
                debug!(
                    "discarding {:?} while waiting for 0x{command:04X}",
                    Incoming::classify(&self.frame)
                );
            }
            self.transport.sleep(POLL_INTERVAL);
        }
        Err(ModuleError::Timeout)
    }

    /// Block until the network reaches the given state.
    pub fn wait_for_state(
        &mut self,
        target: DeviceState,
        timeout: Duration,
    ) -> Result<(), ModuleError> {
        for _ in 0..poll_count(timeout) {
            if self.transport.message_waiting() {
                self.transport.poll(&mut self.frame)?;
                if let Incoming::StateChange(state) = Incoming::classify(&self.frame) {
                    debug!("network state: {state}");
                    if state == target {
                        return Ok(());
                    }
                }
            }
            self.transport.sleep(POLL_INTERVAL);
        }
        Err(ModuleError::Timeout)
    }

    // ============================================================================
    // SYS interface
    // ============================================================================

    /// Firmware version and product identification.
    pub fn version(&mut self) -> Result<VersionInfo, ModuleError> {
        self.request(SYS_VERSION, &[])?;
        let payload = self.payload_at_least(5)?;
        Ok(VersionInfo {
            transport_revision: payload[0],
            product_id: payload[1],
            firmware: (payload[2], payload[3], payload[4]),
        })
    }

    /// A random number from the module's hardware generator.
    pub fn random(&mut self) -> Result<u16, ModuleError> {
        self.request(SYS_RANDOM, &[])?;
        let payload = self.payload_at_least(2)?;
        Ok(u16::from_le_bytes([payload[0], payload[1]]))
    }

    /// Sample one module ADC channel.
    pub fn adc_read(&mut self, channel: u8, resolution: u8) -> Result<u16, ModuleError> {
        if channel > 0x0F || resolution > 0x03 {
            return Err(ModuleError::InvalidParameter);
        }
        self.request(SYS_ADC_READ, &[channel, resolution])?;
        let payload = self.payload_at_least(2)?;
        Ok(u16::from_le_bytes([payload[0], payload[1]]))
    }

    /// Operate on the module's own GPIO pins. `operation` is one of
    /// the module's six pin operations (set direction, set input mode,
    /// set, clear, toggle, read); the returned byte is the pin state.
    pub fn gpio(&mut self, operation: u8, value: u8) -> Result<u8, ModuleError> {
        if operation > 5 {
            return Err(ModuleError::InvalidParameter);
        }
        self.request(SYS_GPIO, &[operation, value])?;
        Ok(self.payload_at_least(1)?[0])
    }

    /// Read a non-volatile memory item.
    pub fn nv_read(&mut self, item: u16) -> Result<Vec<u8>, ModuleError> {
        let mut payload = Vec::with_capacity(3);
        payload.put_u16_le(item);
        payload.put_u8(0); // offset
        self.request(SYS_NV_READ, &payload)?;
        self.check_status()?;
        let payload = self.payload_at_least(2)?;
        let len = payload[1] as usize;
        if payload.len() < 2 + len {
            return Err(ModuleError::MalformedResponse);
        }
        Ok(payload[2..2 + len].to_vec())
    }

    /// Write a non-volatile memory item.
    pub fn nv_write(&mut self, item: u16, data: &[u8]) -> Result<(), ModuleError> {
        let max = MAX_FRAME_PAYLOAD - 4;
        if data.len() > max {
            return Err(ModuleError::InvalidLength {
                max,
                actual: data.len(),
            });
        }
        let mut payload = Vec::with_capacity(4 + data.len());
        payload.put_u16_le(item);
        payload.put_u8(0); // offset
        payload.put_u8(data.len() as u8);
        payload.put_slice(data);
        self.request_ok(SYS_NV_WRITE, &payload)
    }

    /// Set the module clock, seconds since the Zigbee epoch.
    pub fn set_time(&mut self, utc_seconds: u32) -> Result<(), ModuleError> {
        let mut payload = Vec::with_capacity(11);
        payload.put_u32_le(utc_seconds);
        payload.put_bytes(0, 7); // broken-down time unused when UTC is set
        self.request_ok(SYS_SET_TIME, &payload)
    }

    /// Read the module clock.
    pub fn get_time(&mut self) -> Result<u32, ModuleError> {
        self.request(SYS_GET_TIME, &[])?;
        let payload = self.payload_at_least(4)?;
        Ok(u32::from_le_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]))
    }

    /// Request a radio transmit power. Returns the power actually
    /// applied, which the radio may round.
    pub fn set_tx_power(&mut self, dbm: i8) -> Result<i8, ModuleError> {
        self.request(SYS_SET_TX_POWER, &[dbm as u8])?;
        Ok(self.payload_at_least(1)?[0] as i8)
    }

    /// Hardware-reset the module and consume its reset indication.
    pub fn reset_module(&mut self) -> Result<ResetIndication, ModuleError> {
        self.transport.reset_module();
        match self.wait_for(SYS_RESET_IND, RESET_INDICATION_WAIT)? {
            Incoming::Reset(reset) => {
                info!(
                    "module reset ({:?}), firmware {}.{}.{}",
                    reset.reason, reset.firmware.0, reset.firmware.1, reset.firmware.2
                );
                Ok(reset)
            }
            _ => Err(ModuleError::MalformedResponse),
        }
    }

    // ============================================================================
    // Configuration
    // ============================================================================

    /// Write a raw configuration item. Higher-level setters below are
    /// preferred; this is exposed for items the driver has no setter
    /// for.
    pub fn write_configuration(&mut self, item: u8, data: &[u8]) -> Result<(), ModuleError> {
        let max = MAX_FRAME_PAYLOAD - 2;
        if data.len() > max {
            return Err(ModuleError::InvalidLength {
                max,
                actual: data.len(),
            });
        }
        let mut payload = Vec::with_capacity(2 + data.len());
        payload.put_u8(item);
        payload.put_u8(data.len() as u8);
        payload.put_slice(data);
        self.request_ok(ZB_WRITE_CONFIGURATION, &payload)
    }

    /// Read back a configuration item.
    pub fn read_configuration(&mut self, item: u8) -> Result<Vec<u8>, ModuleError> {
        self.request(ZB_READ_CONFIGURATION, &[item])?;
        self.check_status()?;
        let payload = self.payload_at_least(3)?;
        let len = payload[2] as usize;
        if payload[1] != item || payload.len() < 3 + len {
            return Err(ModuleError::MalformedResponse);
        }
        Ok(payload[3..3 + len].to_vec())
    }

    /// PAN to form or join; [`ANY_PAN`] joins whatever is found.
    pub fn set_pan_id(&mut self, pan_id: u16) -> Result<(), ModuleError> {
        if pan_id > MAX_PAN_ID && pan_id != ANY_PAN {
            return Err(ModuleError::InvalidParameter);
        }
        self.write_configuration(ZCD_NV_PANID, &pan_id.to_le_bytes())
    }

    /// Restrict the module to a single RF channel.
    pub fn set_channel(&mut self, channel: u8) -> Result<(), ModuleError> {
        if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
            return Err(ModuleError::InvalidParameter);
        }
        self.set_channel_mask(1 << channel)
    }

    /// Channels to form on or scan, as a bitmask of channels 11–25.
    pub fn set_channel_mask(&mut self, mask: u32) -> Result<(), ModuleError> {
        if mask == 0 || mask & !ANY_CHANNEL_MASK != 0 {
            return Err(ModuleError::InvalidParameter);
        }
        self.write_configuration(ZCD_NV_CHANLIST, &mask.to_le_bytes())
    }

    pub fn set_device_type(&mut self, device_type: DeviceType) -> Result<(), ModuleError> {
        self.write_configuration(ZCD_NV_LOGICAL_TYPE, &[device_type.to_wire()])
    }

    /// STARTOPT_* bits applied at the next reset.
    pub fn set_startup_options(&mut self, options: u8) -> Result<(), ModuleError> {
        if options & !(STARTOPT_CLEAR_CONFIG | STARTOPT_CLEAR_STATE) != 0 {
            return Err(ModuleError::InvalidParameter);
        }
        self.write_configuration(ZCD_NV_STARTUP_OPTION, &[options])
    }

    /// Route ZDO indications to the host instead of handling them on
    /// the module. Required for the driver to see announce/leave
    /// indications and ZDO responses.
    pub fn set_callbacks(&mut self, enabled: bool) -> Result<(), ModuleError> {
        self.write_configuration(ZCD_NV_ZDO_DIRECT_CB, &[enabled as u8])
    }

    /// Data-request poll interval for end devices.
    pub fn set_poll_rate(&mut self, milliseconds: u16) -> Result<(), ModuleError> {
        if milliseconds == 0 {
            return Err(ModuleError::InvalidParameter);
        }
        self.write_configuration(ZCD_NV_POLL_RATE, &milliseconds.to_le_bytes())
    }

    pub fn set_security_mode(&mut self, mode: SecurityMode) -> Result<(), ModuleError> {
        let enabled = mode != SecurityMode::Off;
        self.write_configuration(ZCD_NV_SECURITY_MODE, &[enabled as u8])?;
        let preconfigured = mode == SecurityMode::PreconfiguredKeys;
        self.write_configuration(ZCD_NV_PRECFGKEYS_ENABLE, &[preconfigured as u8])
    }

    pub fn set_security_key(&mut self, key: &[u8; SECURITY_KEY_LEN]) -> Result<(), ModuleError> {
        self.write_configuration(ZCD_NV_PRECFGKEY, key)
    }

    /// Read one device information property as its raw 8-byte value.
    pub fn device_info(&mut self, property: DeviceInfoProperty) -> Result<[u8; 8], ModuleError> {
        self.request(ZB_GET_DEVICE_INFO, &[property.to_wire()])?;
        let payload = self.payload_at_least(9)?;
        let mut value = [0u8; 8];
        value.copy_from_slice(&payload[1..9]);
        Ok(value)
    }

    /// The module's current network state.
    pub fn device_state(&mut self) -> Result<DeviceState, ModuleError> {
        let value = self.device_info(DeviceInfoProperty::State)?;
        Ok(DeviceState::from(value[0]))
    }

    // ============================================================================
    // Application framework
    // ============================================================================

    /// Register an application endpoint with the module.
    pub fn register_application(&mut self, app: &ApplicationConfig) -> Result<(), ModuleError> {
        app.validate()?;
        let clusters = app.input_clusters.len() + app.output_clusters.len();
        let mut payload = Vec::with_capacity(9 + 2 * clusters);
        payload.put_u8(app.endpoint);
        payload.put_u16_le(app.profile_id);
        payload.put_u16_le(app.device_id);
        payload.put_u8(app.device_version);
        payload.put_u8(app.latency.to_wire());
        payload.put_u8(app.input_clusters.len() as u8);
        for &cluster in &app.input_clusters {
            payload.put_u16_le(cluster);
        }
        payload.put_u8(app.output_clusters.len() as u8);
        for &cluster in &app.output_clusters {
            payload.put_u16_le(cluster);
        }
        self.request_ok(AF_REGISTER, &payload)
    }

    /// Register the generic data-pipe endpoint.
    pub fn register_default_application(&mut self) -> Result<(), ModuleError> {
        self.register_application(&ApplicationConfig::default())
    }

    /// Send a data message to a short address and block for its
    /// delivery confirm.
    pub fn send_data(
        &mut self,
        destination: ShortAddress,
        destination_endpoint: u8,
        source_endpoint: u8,
        cluster: u16,
        data: &[u8],
    ) -> Result<(), ModuleError> {
        if cluster == 0 {
            return Err(ModuleError::InvalidCluster);
        }
        if data.len() > MAX_PAYLOAD_LENGTH {
            return Err(ModuleError::InvalidLength {
                max: MAX_PAYLOAD_LENGTH,
                actual: data.len(),
            });
        }
        let sequence = self.next_sequence();
        let mut payload = Vec::with_capacity(10 + data.len());
        payload.put_u16_le(destination.0);
        payload.put_u8(destination_endpoint);
        payload.put_u8(source_endpoint);
        payload.put_u16_le(cluster);
        payload.put_u8(sequence);
        payload.put_u8(self.ack_mode.to_wire());
        payload.put_u8(DEFAULT_RADIUS);
        payload.put_u8(data.len() as u8);
        payload.put_slice(data);
        self.request_ok(AF_DATA_REQUEST, &payload)?;
        self.wait_for_confirm(sequence)
    }

    /// Send a data message with extended addressing. Payloads beyond
    /// the inline maximum are staged on the module in chunks before
    /// transmission; delivery is still confirmed as one message.
    pub fn send_data_extended(
        &mut self,
        destination: Destination,
        destination_endpoint: u8,
        source_endpoint: u8,
        cluster: u16,
        data: &[u8],
    ) -> Result<(), ModuleError> {
        if cluster == 0 {
            return Err(ModuleError::InvalidCluster);
        }
        if data.is_empty() || data.len() > MAX_EXT_TOTAL_PAYLOAD_LENGTH {
            return Err(ModuleError::InvalidLength {
                max: MAX_EXT_TOTAL_PAYLOAD_LENGTH,
                actual: data.len(),
            });
        }
        let sequence = self.next_sequence();
        let inline = data.len() <= MAX_EXT_INLINE_PAYLOAD_LENGTH;
        let mut payload = Vec::with_capacity(20 + if inline { data.len() } else { 0 });
        payload.put_u8(destination.mode());
        payload.put_slice(&destination.address_field());
        payload.put_u8(destination_endpoint);
        payload.put_u16_le(0); // destination PAN: this network
        payload.put_u8(source_endpoint);
        payload.put_u16_le(cluster);
        payload.put_u8(sequence);
        payload.put_u8(self.ack_mode.to_wire());
        payload.put_u8(DEFAULT_RADIUS);
        payload.put_u16_le(data.len() as u16);
        if inline {
            payload.put_slice(data);
        }
        self.request_ok(AF_DATA_REQUEST_EXT, &payload)?;

        if !inline {
            debug!("staging {} bytes for extended send", data.len());
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + MAX_CHUNK_LENGTH).min(data.len());
                self.data_store(offset as u16, &data[offset..end])?;
                offset = end;
            }
            // a zero-length store means "all staged, transmit"
            self.data_store(data.len() as u16, &[])?;
        }
        self.wait_for_confirm(sequence)
    }

    fn data_store(&mut self, offset: u16, chunk: &[u8]) -> Result<(), ModuleError> {
        let mut payload = Vec::with_capacity(3 + chunk.len());
        payload.put_u16_le(offset);
        payload.put_u8(chunk.len() as u8);
        payload.put_slice(chunk);
        self.request_ok(AF_DATA_STORE, &payload)
    }

    fn wait_for_confirm(&mut self, sequence: u8) -> Result<(), ModuleError> {
        match self.wait_for(AF_DATA_CONFIRM, DATA_CONFIRM_WAIT)? {
            Incoming::DataConfirm(confirm) => {
                if confirm.sequence != sequence {
                    debug!(
                        "confirm for transaction {} while {sequence} in flight",
                        confirm.sequence
                    );
                }
                if confirm.status == STATUS_SUCCESS {
                    Ok(())
                } else {
                    Err(ModuleError::Status(confirm.status))
                }
            }
            _ => Err(ModuleError::MalformedResponse),
        }
    }

    /// Pull the payload of an oversized incoming message off the
    /// module, chunk by chunk. `timestamp` and `length` come from the
    /// [`IncomingMessageExt`] header that announced the message; the
    /// final zero-length retrieve releases the module's buffer.
    pub fn retrieve_extended_message(
        &mut self,
        timestamp: u32,
        length: u16,
    ) -> Result<Vec<u8>, ModuleError> {
        if length as usize > MAX_EXT_TOTAL_PAYLOAD_LENGTH {
            return Err(ModuleError::InvalidLength {
                max: MAX_EXT_TOTAL_PAYLOAD_LENGTH,
                actual: length as usize,
            });
        }
        let mut data = Vec::with_capacity(length as usize);
        while data.len() < length as usize {
            let chunk = (length as usize - data.len()).min(MAX_CHUNK_LENGTH) as u8;
            self.data_retrieve(timestamp, data.len() as u16, chunk)?;
            let payload = self.payload_at_least(2)?;
            let received = payload[1] as usize;
            if received == 0 || payload.len() < 2 + received {
                return Err(ModuleError::MalformedResponse);
            }
            data.extend_from_slice(&payload[2..2 + received]);
        }
        self.data_retrieve(timestamp, length, 0)?;
        Ok(data)
    }

    fn data_retrieve(&mut self, timestamp: u32, offset: u16, length: u8) -> Result<(), ModuleError> {
        let mut payload = Vec::with_capacity(7);
        payload.put_u32_le(timestamp);
        payload.put_u16_le(offset);
        payload.put_u8(length);
        self.request_ok(AF_DATA_RETRIEVE, &payload)
    }

    // ============================================================================
    // Zigbee Device Objects
    // ============================================================================

    /// Start the network stack with whatever has been configured and
    /// registered. Joining progress arrives as state-change
    /// indications; see [`Session::wait_for_state`].
    pub fn start_application(&mut self) -> Result<(), ModuleError> {
        // single byte: start with no delay. The response byte
        // distinguishes restored from newly formed network state;
        // neither is an error
        self.request(ZDO_STARTUP_FROM_APP, &[0])
    }

    /// Look up a device's IEEE address by its short address.
    pub fn ieee_address(
        &mut self,
        address: ShortAddress,
        request_type: u8,
        start_index: u8,
    ) -> Result<AddressResponse, ModuleError> {
        if request_type != SINGLE_DEVICE_RESPONSE && request_type != INCLUDE_ASSOCIATED_DEVICES {
            return Err(ModuleError::InvalidParameter);
        }
        let mut payload = Vec::with_capacity(4);
        payload.put_u16_le(address.0);
        payload.put_u8(request_type);
        payload.put_u8(start_index);
        self.request_ok(ZDO_IEEE_ADDR_REQ, &payload)?;
        self.wait_for(ZDO_IEEE_ADDR_RSP, ZDO_RESPONSE_WAIT)?;
        self.decode_address_response()
    }

    /// Look up a device's short address by its IEEE address.
    pub fn network_address(
        &mut self,
        address: IeeeAddress,
        request_type: u8,
        start_index: u8,
    ) -> Result<AddressResponse, ModuleError> {
        if request_type != SINGLE_DEVICE_RESPONSE && request_type != INCLUDE_ASSOCIATED_DEVICES {
            return Err(ModuleError::InvalidParameter);
        }
        let mut payload = Vec::with_capacity(10);
        payload.put_slice(address.as_bytes());
        payload.put_u8(request_type);
        payload.put_u8(start_index);
        self.request_ok(ZDO_NWK_ADDR_REQ, &payload)?;
        self.wait_for(ZDO_NWK_ADDR_RSP, ZDO_RESPONSE_WAIT)?;
        self.decode_address_response()
    }

    fn decode_address_response(&self) -> Result<AddressResponse, ModuleError> {
        let payload = self.payload_at_least(13)?;
        if payload[0] != STATUS_SUCCESS {
            return Err(ModuleError::Status(payload[0]));
        }
        let ieee_address = IeeeAddress::from_slice(&payload[1..9]).ok_or(ModuleError::MalformedResponse)?;
        let count = payload[12] as usize;
        if payload.len() < 13 + 2 * count {
            return Err(ModuleError::MalformedResponse);
        }
        let associated = payload[13..13 + 2 * count]
            .chunks_exact(2)
            .map(|pair| ShortAddress(u16::from_le_bytes([pair[0], pair[1]])))
            .collect();
        Ok(AddressResponse {
            ieee_address,
            short_address: ShortAddress(u16::from_le_bytes([payload[9], payload[10]])),
            start_index: payload[11],
            associated,
        })
    }

    /// Query a remote device's node descriptor.
    pub fn node_descriptor(
        &mut self,
        destination: ShortAddress,
        interest: ShortAddress,
    ) -> Result<NodeDescriptor, ModuleError> {
        let mut payload = Vec::with_capacity(4);
        payload.put_u16_le(destination.0);
        payload.put_u16_le(interest.0);
        self.request_ok(ZDO_NODE_DESC_REQ, &payload)?;
        self.wait_for(ZDO_NODE_DESC_RSP, ZDO_RESPONSE_WAIT)?;
        let payload = self.payload_at_least(18)?;
        if payload[2] != STATUS_SUCCESS {
            return Err(ModuleError::Status(payload[2]));
        }
        Ok(NodeDescriptor {
            source: ShortAddress(u16::from_le_bytes([payload[0], payload[1]])),
            network_address: ShortAddress(u16::from_le_bytes([payload[3], payload[4]])),
            logical_type: payload[5] & 0x07,
            frequency_band: payload[6] >> 3,
            mac_capabilities: payload[7],
            manufacturer_code: u16::from_le_bytes([payload[8], payload[9]]),
            max_buffer_size: payload[10],
            max_incoming_transfer: u16::from_le_bytes([payload[11], payload[12]]),
            server_mask: u16::from_le_bytes([payload[13], payload[14]]),
            max_outgoing_transfer: u16::from_le_bytes([payload[15], payload[16]]),
            descriptor_capabilities: payload[17],
        })
    }

    /// Read a remote device's free-form user descriptor.
    pub fn user_descriptor(
        &mut self,
        destination: ShortAddress,
        interest: ShortAddress,
    ) -> Result<Vec<u8>, ModuleError> {
        let mut payload = Vec::with_capacity(4);
        payload.put_u16_le(destination.0);
        payload.put_u16_le(interest.0);
        self.request_ok(ZDO_USER_DESC_REQ, &payload)?;
        self.wait_for(ZDO_USER_DESC_RSP, ZDO_RESPONSE_WAIT)?;
        let payload = self.payload_at_least(6)?;
        if payload[2] != STATUS_SUCCESS {
            return Err(ModuleError::Status(payload[2]));
        }
        let len = payload[5] as usize;
        if len > USER_DESCRIPTOR_LEN || payload.len() < 6 + len {
            return Err(ModuleError::MalformedResponse);
        }
        Ok(payload[6..6 + len].to_vec())
    }

    /// Set a remote device's user descriptor.
    pub fn set_user_descriptor(
        &mut self,
        destination: ShortAddress,
        interest: ShortAddress,
        text: &[u8],
    ) -> Result<(), ModuleError> {
        if text.len() > USER_DESCRIPTOR_LEN {
            return Err(ModuleError::InvalidLength {
                max: USER_DESCRIPTOR_LEN,
                actual: text.len(),
            });
        }
        let mut payload = Vec::with_capacity(5 + text.len());
        payload.put_u16_le(destination.0);
        payload.put_u16_le(interest.0);
        payload.put_u8(text.len() as u8);
        payload.put_slice(text);
        self.request_ok(ZDO_USER_DESC_SET, &payload)
    }

    /// Open or close the network for joining on the addressed device.
    /// Duration is in seconds; [`PERMIT_JOIN_INDEFINITELY`] leaves it
    /// open until further notice.
    pub fn permit_join(
        &mut self,
        destination: ShortAddress,
        duration: u8,
    ) -> Result<(), ModuleError> {
        let mut payload = Vec::with_capacity(4);
        payload.put_u16_le(destination.0);
        payload.put_u8(duration);
        payload.put_u8(0); // trust-center significance, unused
        self.request_ok(ZDO_MGMT_PERMIT_JOIN_REQ, &payload)?;
        self.wait_for(ZDO_MGMT_PERMIT_JOIN_RSP, ZDO_RESPONSE_WAIT)?;
        self.zdo_status()
    }

    /// Kick off an active scan for nearby networks. Results arrive as
    /// unsolicited indications.
    pub fn network_discovery(
        &mut self,
        channel_mask: u32,
        scan_duration: u8,
    ) -> Result<(), ModuleError> {
        if channel_mask == 0 || channel_mask & !ANY_CHANNEL_MASK != 0 || scan_duration > 14 {
            return Err(ModuleError::InvalidParameter);
        }
        let mut payload = Vec::with_capacity(5);
        payload.put_u32_le(channel_mask);
        payload.put_u8(scan_duration);
        self.request_ok(ZDO_NWK_DISCOVERY_REQ, &payload)
    }

    /// Ask a device to leave the network.
    pub fn management_leave(
        &mut self,
        destination: ShortAddress,
        device: IeeeAddress,
    ) -> Result<(), ModuleError> {
        let mut payload = Vec::with_capacity(11);
        payload.put_u16_le(destination.0);
        payload.put_slice(device.as_bytes());
        payload.put_u8(0); // no rejoin, no children removal
        self.request_ok(ZDO_MGMT_LEAVE_REQ, &payload)?;
        self.wait_for(ZDO_MGMT_LEAVE_RSP, ZDO_RESPONSE_WAIT)?;
        self.zdo_status()
    }

    /// Bind a cluster between two endpoints.
    #[allow(clippy::too_many_arguments)]
    pub fn bind(
        &mut self,
        destination: ShortAddress,
        source: IeeeAddress,
        source_endpoint: u8,
        cluster: u16,
        target: IeeeAddress,
        target_endpoint: u8,
    ) -> Result<(), ModuleError> {
        self.bind_request(
            ZDO_BIND_REQ,
            ZDO_BIND_RSP,
            destination,
            source,
            source_endpoint,
            cluster,
            target,
            target_endpoint,
        )
    }

    /// Remove a binding created with [`Session::bind`].
    #[allow(clippy::too_many_arguments)]
    pub fn unbind(
        &mut self,
        destination: ShortAddress,
        source: IeeeAddress,
        source_endpoint: u8,
        cluster: u16,
        target: IeeeAddress,
        target_endpoint: u8,
    ) -> Result<(), ModuleError> {
        self.bind_request(
            ZDO_UNBIND_REQ,
            ZDO_UNBIND_RSP,
            destination,
            source,
            source_endpoint,
            cluster,
            target,
            target_endpoint,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_request(
        &mut self,
        request: u16,
        response: u16,
        destination: ShortAddress,
        source: IeeeAddress,
        source_endpoint: u8,
        cluster: u16,
        target: IeeeAddress,
        target_endpoint: u8,
    ) -> Result<(), ModuleError> {
        if cluster == 0 {
            return Err(ModuleError::InvalidCluster);
        }
        if source_endpoint == 0 || target_endpoint == 0 {
            return Err(ModuleError::InvalidParameter);
        }
        let mut payload = Vec::with_capacity(23);
        payload.put_u16_le(destination.0);
        payload.put_slice(source.as_bytes());
        payload.put_u8(source_endpoint);
        payload.put_u16_le(cluster);
        payload.put_u8(Destination::Long(target).mode());
        payload.put_slice(target.as_bytes());
        payload.put_u8(target_endpoint);
        self.request_ok(request, &payload)?;
        self.wait_for(response, ZDO_RESPONSE_WAIT)?;
        self.zdo_status()
    }

    /// Status of a ZDO management response: source address then the
    /// status byte.
    fn zdo_status(&self) -> Result<(), ModuleError> {
        let payload = self.payload_at_least(3)?;
        match payload[2] {
            STATUS_SUCCESS => Ok(()),
            code => Err(ModuleError::Status(code)),
        }
    }

    // ============================================================================
    // Startup sequence
    // ============================================================================

    /// Bring the module from power-on to a joined network: reset,
    /// clear stale state, verify the firmware is the expected product,
    /// write the network configuration, register the application, and
    /// block until the stack reports the target state.
    pub fn start(
        &mut self,
        module: &ModuleConfig,
        app: &ApplicationConfig,
    ) -> Result<(), ModuleError> {
        module.validate()?;
        app.validate()?;
        info!("starting module as {}", module.device_type);

        let first = self.reset_module()?;
        self.set_startup_options(STARTOPT_CLEAR_CONFIG | STARTOPT_CLEAR_STATE)?;
        self.reset_module()?;

        let version = self.version()?;
        if version.product_id != first.product_id {
            return Err(ModuleError::InvalidModuleConfiguration);
        }

        if let Some(dbm) = module.tx_power_dbm {
            self.set_tx_power(dbm)?;
        }
        self.set_device_type(module.device_type)?;
        self.set_channel_mask(module.channel_mask)?;
        self.set_pan_id(module.pan_id)?;
        self.set_callbacks(true)?;
        if module.device_type == DeviceType::EndDevice {
            self.set_poll_rate(module.poll_rate_ms)?;
        }
        self.set_security_mode(module.security_mode)?;
        if let Some(key) = &module.security_key {
            self.set_security_key(key)?;
        }
        self.register_application(app)?;
        self.start_application()?;
        self.wait_for_state(module.device_type.joined_state(), STARTUP_WAIT)?;
        info!("network up as {}", module.device_type);
        Ok(())
    }
}
