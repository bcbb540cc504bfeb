//! Common types used in the protocol.

use std::fmt;

use crate::constants::*;

/// A 2-byte network-assigned device address. Little-endian on the
/// wire; the coordinator always holds address 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortAddress(pub u16);

impl ShortAddress {
    /// The coordinator's fixed address.
    pub const COORDINATOR: ShortAddress = ShortAddress(0x0000);
    /// Broadcast to every device.
    pub const BROADCAST: ShortAddress = ShortAddress(ALL_DEVICES);
    /// Broadcast to routers and the coordinator.
    pub const ROUTERS: ShortAddress = ShortAddress(ALL_ROUTERS_AND_COORDINATORS);

    /// Wire encoding, LSB first.
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<u16> for ShortAddress {
    fn from(addr: u16) -> Self {
        ShortAddress(addr)
    }
}

/// An 8-byte globally unique IEEE (MAC) address.
///
/// Stored LSB-first, exactly as it travels on the wire. Displayed
/// MSB-first, the way datasheets and sniffers print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IeeeAddress(pub [u8; 8]);

impl IeeeAddress {
    /// Create from wire bytes (LSB first).
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        IeeeAddress(bytes)
    }

    /// Create from a slice. Returns None if the slice is not 8 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 8 {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(slice);
            Some(IeeeAddress(bytes))
        } else {
            None
        }
    }

    /// The underlying bytes, LSB first.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for IeeeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Where an extended data request is headed.
///
/// The wire carries an address mode byte followed by an 8-byte address
/// field; for short and broadcast modes only the first two bytes of
/// that field are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A 2-byte network address.
    Short(ShortAddress),
    /// An 8-byte IEEE address.
    Long(IeeeAddress),
    /// Broadcast.
    Broadcast,
}

impl Destination {
    /// The wire address-mode byte.
    pub fn mode(&self) -> u8 {
        match self {
            Destination::Short(_) => 2,
            Destination::Long(_) => 3,
            Destination::Broadcast => 0xFF,
        }
    }

    /// The 8-byte wire address field. Unused trailing bytes are zero.
    pub fn address_field(&self) -> [u8; 8] {
        let mut field = [0u8; 8];
        match self {
            Destination::Short(addr) => field[..2].copy_from_slice(&addr.to_le_bytes()),
            Destination::Long(addr) => field.copy_from_slice(addr.as_bytes()),
            Destination::Broadcast => field[..2].copy_from_slice(&ALL_DEVICES.to_le_bytes()),
        }
        field
    }
}

/// Acknowledgement policy for outgoing data requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Acknowledged by the next hop only (less traffic, the default).
    #[default]
    Mac,
    /// Acknowledged end-to-end by the final destination.
    Aps,
}

impl AckMode {
    /// The wire options byte.
    pub fn to_wire(self) -> u8 {
        match self {
            AckMode::Mac => 0x00,
            AckMode::Aps => 0x10,
        }
    }
}

/// Logical role of a device on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
}

impl DeviceType {
    /// Wire value for ZCD_NV_LOGICAL_TYPE.
    pub fn to_wire(self) -> u8 {
        match self {
            DeviceType::Coordinator => 0x00,
            DeviceType::Router => 0x01,
            DeviceType::EndDevice => 0x02,
        }
    }

    /// The network state this device type reaches once joined.
    pub fn joined_state(self) -> DeviceState {
        match self {
            DeviceType::Coordinator => DeviceState::Coordinator,
            DeviceType::Router => DeviceState::Router,
            DeviceType::EndDevice => DeviceState::EndDevice,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Coordinator => "Coordinator",
            DeviceType::Router => "Router",
            DeviceType::EndDevice => "End Device",
        };
        f.write_str(name)
    }
}

/// Network state reported by state-change indications and the state
/// device-information property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Hold,
    Init,
    NetworkDiscovery,
    Joining,
    Rejoining,
    EndDeviceUnauthenticated,
    EndDevice,
    Router,
    CoordinatorStarting,
    Coordinator,
    Orphan,
    /// A state value this driver does not know about.
    Unknown(u8),
}

impl From<u8> for DeviceState {
    fn from(state: u8) -> Self {
        match state {
            0 => DeviceState::Hold,
            1 => DeviceState::Init,
            2 => DeviceState::NetworkDiscovery,
            3 => DeviceState::Joining,
            4 => DeviceState::Rejoining,
            5 => DeviceState::EndDeviceUnauthenticated,
            6 => DeviceState::EndDevice,
            7 => DeviceState::Router,
            8 => DeviceState::CoordinatorStarting,
            9 => DeviceState::Coordinator,
            10 => DeviceState::Orphan,
            other => DeviceState::Unknown(other),
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Hold => f.write_str("DEV_HOLD"),
            DeviceState::Init => f.write_str("DEV_INIT"),
            DeviceState::NetworkDiscovery => f.write_str("DEV_NWK_DISC"),
            DeviceState::Joining => f.write_str("DEV_NWK_JOINING"),
            DeviceState::Rejoining => f.write_str("DEV_NWK_REJOIN"),
            DeviceState::EndDeviceUnauthenticated => f.write_str("DEV_END_DEVICE_UNAUTH"),
            DeviceState::EndDevice => f.write_str("DEV_END_DEVICE"),
            DeviceState::Router => f.write_str("DEV_ROUTER"),
            DeviceState::CoordinatorStarting => f.write_str("DEV_COORD_STARTING"),
            DeviceState::Coordinator => f.write_str("DEV_ZB_COORD"),
            DeviceState::Orphan => f.write_str("DEV_NWK_ORPHAN"),
            DeviceState::Unknown(state) => write!(f, "Unknown({state})"),
        }
    }
}

/// Device information properties readable with ZB_GET_DEVICE_INFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInfoProperty {
    State,
    MacAddress,
    ShortAddress,
    ParentShortAddress,
    ParentMacAddress,
    Channel,
    PanId,
    ExtendedPanId,
}

impl DeviceInfoProperty {
    /// The wire property id.
    pub fn to_wire(self) -> u8 {
        match self {
            DeviceInfoProperty::State => 0x00,
            DeviceInfoProperty::MacAddress => 0x01,
            DeviceInfoProperty::ShortAddress => 0x02,
            DeviceInfoProperty::ParentShortAddress => 0x03,
            DeviceInfoProperty::ParentMacAddress => 0x04,
            DeviceInfoProperty::Channel => 0x05,
            DeviceInfoProperty::PanId => 0x06,
            DeviceInfoProperty::ExtendedPanId => 0x07,
        }
    }
}

/// Network security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    /// No link encryption.
    #[default]
    Off,
    /// All devices are provisioned with the same key out of band.
    PreconfiguredKeys,
    /// The coordinator distributes its key over the air at join time.
    CoordinatorDistributesKeys,
}

/// Why the module last restarted, from a reset indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    PowerUp,
    External,
    Watchdog,
    Unknown(u8),
}

impl From<u8> for ResetReason {
    fn from(reason: u8) -> Self {
        match reason {
            0 => ResetReason::PowerUp,
            1 => ResetReason::External,
            2 => ResetReason::Watchdog,
            other => ResetReason::Unknown(other),
        }
    }
}

/// Beacon latency requested when registering an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latency {
    #[default]
    Normal,
    FastBeacons,
    SlowBeacons,
}

impl Latency {
    pub fn to_wire(self) -> u8 {
        match self {
            Latency::Normal => 0,
            Latency::FastBeacons => 1,
            Latency::SlowBeacons => 2,
        }
    }
}
