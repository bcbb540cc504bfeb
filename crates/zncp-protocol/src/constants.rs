//! Protocol constants
//!
//! Command ids are listed MSB-first, the way the two id bytes travel
//! down the wire (everything else in a frame is little-endian). This
//! is not the module's complete command catalog, only what the driver
//! uses or can receive.

// ============================================================================
// SYS interface (host → module)
// ============================================================================

/// Retrieve firmware version information.
pub const SYS_VERSION: u16 = 0x2102;
/// Retrieve a hardware-generated random number.
pub const SYS_RANDOM: u16 = 0x210C;
/// Read the module ADC (temperature / supply voltage channels).
pub const SYS_ADC_READ: u16 = 0x210D;
/// General-purpose I/O pin operation on the module's own pins.
pub const SYS_GPIO: u16 = 0x210E;
/// Read a non-volatile memory item.
pub const SYS_NV_READ: u16 = 0x2108;
/// Write a non-volatile memory item.
pub const SYS_NV_WRITE: u16 = 0x2109;
/// Set the module's clock.
pub const SYS_SET_TIME: u16 = 0x2110;
/// Read the module's clock.
pub const SYS_GET_TIME: u16 = 0x2111;
/// Set radio transmit power (firmware 2.5.1+).
pub const SYS_SET_TX_POWER: u16 = 0x2114;

// ============================================================================
// Configuration (host → module)
// ============================================================================

/// Write a configuration item to module NV storage.
pub const ZB_WRITE_CONFIGURATION: u16 = 0x2605;
/// Read back a configuration item.
pub const ZB_READ_CONFIGURATION: u16 = 0x2604;
/// Retrieve a device information property (state, addresses, channel).
pub const ZB_GET_DEVICE_INFO: u16 = 0x2606;

// ============================================================================
// Application Framework (AF)
// ============================================================================

/// Register an application endpoint.
pub const AF_REGISTER: u16 = 0x2400;
/// Send a data message to a short address.
pub const AF_DATA_REQUEST: u16 = 0x2401;
/// Send a data message with extended (long/broadcast) addressing
/// and optional fragmentation.
pub const AF_DATA_REQUEST_EXT: u16 = 0x2402;
/// Store one chunk of an oversized outgoing message.
pub const AF_DATA_STORE: u16 = 0x2411;
/// Retrieve one chunk of an oversized incoming message.
pub const AF_DATA_RETRIEVE: u16 = 0x2412;

// ============================================================================
// Zigbee Device Objects (ZDO)
// ============================================================================

/// Start the network stack with the registered application.
pub const ZDO_STARTUP_FROM_APP: u16 = 0x2540;
/// Look up a device's IEEE (MAC) address by short address.
pub const ZDO_IEEE_ADDR_REQ: u16 = 0x2501;
pub const ZDO_IEEE_ADDR_RSP: u16 = 0x4581;
/// Look up a device's short address by IEEE address.
pub const ZDO_NWK_ADDR_REQ: u16 = 0x2500;
pub const ZDO_NWK_ADDR_RSP: u16 = 0x4580;
/// Query a remote node descriptor.
pub const ZDO_NODE_DESC_REQ: u16 = 0x2502;
pub const ZDO_NODE_DESC_RSP: u16 = 0x4582;
/// Query a remote user descriptor (16 bytes of free-form text).
pub const ZDO_USER_DESC_REQ: u16 = 0x2508;
pub const ZDO_USER_DESC_RSP: u16 = 0x4588;
/// Set a remote user descriptor.
pub const ZDO_USER_DESC_SET: u16 = 0x250B;
/// Enable or disable joining on a device.
pub const ZDO_MGMT_PERMIT_JOIN_REQ: u16 = 0x2536;
pub const ZDO_MGMT_PERMIT_JOIN_RSP: u16 = 0x45B6;
/// Active network scan.
pub const ZDO_NWK_DISCOVERY_REQ: u16 = 0x2526;
/// Ask a device to leave the network.
pub const ZDO_MGMT_LEAVE_REQ: u16 = 0x2534;
pub const ZDO_MGMT_LEAVE_RSP: u16 = 0x45B4;
/// Create a binding between two endpoints.
pub const ZDO_BIND_REQ: u16 = 0x2521;
pub const ZDO_BIND_RSP: u16 = 0x45A1;
/// Remove a binding.
pub const ZDO_UNBIND_REQ: u16 = 0x2522;
pub const ZDO_UNBIND_RSP: u16 = 0x45A2;

// ============================================================================
// Asynchronous indications (module → host)
// ============================================================================

/// Module restarted (hard or soft reset).
pub const SYS_RESET_IND: u16 = 0x4180;
/// Network state changed (joining progress).
pub const ZDO_STATE_CHANGE_IND: u16 = 0x45C0;
/// A device announced itself on the network.
pub const ZDO_END_DEVICE_ANNCE_IND: u16 = 0x45C1;
/// A device left the network.
pub const ZDO_LEAVE_IND: u16 = 0x45C9;
/// Delivery report for a previously sent data request.
pub const AF_DATA_CONFIRM: u16 = 0x4480;
/// An application data message arrived.
pub const AF_INCOMING_MSG: u16 = 0x4481;
/// An oversized application data message arrived; its payload must be
/// retrieved chunk-wise with AF_DATA_RETRIEVE.
pub const AF_INCOMING_MSG_EXT: u16 = 0x4482;

/// SRSP returned when the module does not recognize a request.
pub const ERROR_SRSP: u16 = 0x6000;

// ============================================================================
// Framing
// ============================================================================

/// A synchronous response carries the request's command id with this
/// bit set (e.g. request 0x2605 → response 0x6605).
pub const SRSP_OFFSET: u16 = 0x4000;

/// Status byte meaning success, in SRSPs and data confirms alike.
pub const STATUS_SUCCESS: u8 = 0x00;

// ============================================================================
// Configuration item ids (ZCD) and lengths
// ============================================================================

pub const ZCD_NV_STARTUP_OPTION: u8 = 0x03;
pub const ZCD_NV_POLL_RATE: u8 = 0x24;
pub const ZCD_NV_PRECFGKEY: u8 = 0x62;
pub const ZCD_NV_PRECFGKEYS_ENABLE: u8 = 0x63;
pub const ZCD_NV_SECURITY_MODE: u8 = 0x64;
pub const ZCD_NV_USERDESC: u8 = 0x81;
pub const ZCD_NV_PANID: u8 = 0x83;
pub const ZCD_NV_CHANLIST: u8 = 0x84;
pub const ZCD_NV_LOGICAL_TYPE: u8 = 0x87;
pub const ZCD_NV_ZDO_DIRECT_CB: u8 = 0x8F;

/// Length of the pre-configured network security key.
pub const SECURITY_KEY_LEN: usize = 16;

// ============================================================================
// Addressing and payload limits
// ============================================================================

/// Broadcast short address reaching every device.
pub const ALL_DEVICES: u16 = 0xFFFF;
/// Broadcast short address reaching routers and the coordinator only.
pub const ALL_ROUTERS_AND_COORDINATORS: u16 = 0xFFFC;

/// Largest payload of a plain AF_DATA_REQUEST (81 bytes with network
/// security enabled, the module's worst case).
pub const MAX_PAYLOAD_LENGTH: usize = 81;
/// Largest payload carried inline in an AF_DATA_REQUEST_EXT.
pub const MAX_EXT_INLINE_PAYLOAD_LENGTH: usize = 230;
/// Largest total payload of a fragmented extended message.
pub const MAX_EXT_TOTAL_PAYLOAD_LENGTH: usize = 600;
/// Largest chunk accepted by AF_DATA_STORE / returned by AF_DATA_RETRIEVE.
pub const MAX_CHUNK_LENGTH: usize = 247;

/// Default maximum hop count for outgoing data requests.
pub const DEFAULT_RADIUS: u8 = 0x0F;

/// Lowest and highest usable RF channels. Channel 26 is excluded
/// because modules with a range extender may not use it under FCC
/// radiated-power limits.
pub const CHANNEL_MIN: u8 = 11;
pub const CHANNEL_MAX: u8 = 25;

/// Channel mask covering every permitted channel.
pub const ANY_CHANNEL_MASK: u32 = 0x03FF_F800;
/// Smallest valid channel mask (channel 11 only).
pub const MIN_CHANNEL_MASK: u32 = 0x0000_0800;

/// Join any PAN (the default).
pub const ANY_PAN: u16 = 0xFFFF;
/// Largest assignable PAN id.
pub const MAX_PAN_ID: u16 = 0xFFF7;

/// Permit-join duration meaning "disabled".
pub const PERMIT_JOIN_OFF: u8 = 0x00;
/// Permit-join duration meaning "enabled until further notice".
pub const PERMIT_JOIN_INDEFINITELY: u8 = 0xFF;

// Startup option bits (ZCD_NV_STARTUP_OPTION).
pub const STARTOPT_CLEAR_CONFIG: u8 = 0x01;
pub const STARTOPT_CLEAR_STATE: u8 = 0x02;

// Address-request scope for ZDO address lookups.
pub const SINGLE_DEVICE_RESPONSE: u8 = 0;
pub const INCLUDE_ASSOCIATED_DEVICES: u8 = 1;

// Capability flags in an end-device announce.
pub const CAPABILITY_ROUTER: u8 = 0x02;
pub const CAPABILITY_MAINS_POWERED: u8 = 0x04;
pub const CAPABILITY_RX_ON_WHEN_IDLE: u8 = 0x08;
pub const CAPABILITY_SECURITY: u8 = 0x40;
