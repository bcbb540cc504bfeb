//! Classification of frames received from the module.
//!
//! Polling the bus yields whatever the module has queued: nothing at
//! all, an asynchronous indication, or (mid-exchange) a synchronous
//! response. [`Incoming::classify`] turns the raw frame into a typed
//! view so callers can match on what arrived instead of on offsets.

use crate::constants::*;
use crate::frame::Frame;
use crate::types::{DeviceState, IeeeAddress, ResetReason, ShortAddress};

/// An application data message delivered to a registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Group address the message was sent to, zero for unicast.
    pub group: u16,
    /// Application cluster id.
    pub cluster: u16,
    /// Sender's network address.
    pub source: ShortAddress,
    /// Sender's endpoint.
    pub source_endpoint: u8,
    /// Receiving endpoint on this device.
    pub destination_endpoint: u8,
    /// Whether the message arrived as a broadcast.
    pub was_broadcast: bool,
    /// Link quality of the last hop.
    pub link_quality: u8,
    /// Whether the message was secured in transit.
    pub security_used: bool,
    /// Module timestamp of reception.
    pub timestamp: u32,
    /// Sender's transaction sequence number.
    pub sequence: u8,
    /// Application payload.
    pub data: Vec<u8>,
}

/// Header of an oversized incoming message. The payload stays buffered
/// on the module; `length` says how much is waiting to be retrieved
/// chunk-wise, keyed by `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessageExt {
    pub group: u16,
    pub cluster: u16,
    /// Sender's IEEE address (address mode 3) or short address padded
    /// into the low bytes (mode 2).
    pub source_mode: u8,
    pub source: IeeeAddress,
    pub source_endpoint: u8,
    /// PAN the sender is on; zero means this network.
    pub source_pan: u16,
    pub destination_endpoint: u8,
    pub was_broadcast: bool,
    pub link_quality: u8,
    pub security_used: bool,
    /// Retrieval key for AF_DATA_RETRIEVE.
    pub timestamp: u32,
    pub sequence: u8,
    /// Total buffered payload length.
    pub length: u16,
}

/// Delivery report for an earlier data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConfirm {
    /// Zero for delivered; otherwise the stack's failure code.
    pub status: u8,
    /// Endpoint the original request was sent from.
    pub endpoint: u8,
    /// Transaction sequence number of the original request.
    pub sequence: u8,
}

/// A device announced itself after joining or rejoining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAnnounce {
    /// Address the announce was relayed from.
    pub from: ShortAddress,
    /// The announcing device's network address.
    pub short_address: ShortAddress,
    /// The announcing device's IEEE address.
    pub ieee_address: IeeeAddress,
    /// CAPABILITY_* bit flags.
    pub capabilities: u8,
}

/// A device left the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveIndication {
    pub source: ShortAddress,
    pub ieee_address: IeeeAddress,
    /// Whether the device intends to rejoin.
    pub rejoin: bool,
}

/// The module restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetIndication {
    pub reason: ResetReason,
    /// Transport protocol revision.
    pub transport_revision: u8,
    /// Product id; identifies the module variant.
    pub product_id: u8,
    /// Firmware version, major.minor.maintenance.
    pub firmware: (u8, u8, u8),
}

/// A classified frame from the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// The module had nothing queued (an all-zero frame).
    None,
    /// A synchronous response, only seen mid-exchange.
    SyncResponse { command: u16 },
    /// Network state changed.
    StateChange(DeviceState),
    /// A device joined or rejoined.
    DeviceAnnounce(DeviceAnnounce),
    /// A device left.
    Leave(LeaveIndication),
    /// An application message, payload inline.
    Message(IncomingMessage),
    /// An oversized application message, payload held on the module.
    MessageExt(IncomingMessageExt),
    /// Delivery report.
    DataConfirm(DataConfirm),
    /// The module restarted.
    Reset(ResetIndication),
    /// A known command id whose payload was too short to decode.
    Malformed { command: u16 },
    /// An indication this driver does not decode.
    Unknown { command: u16 },
}

impl Incoming {
    /// Classify a received frame.
    pub fn classify(frame: &Frame) -> Incoming {
        let payload = frame.payload();
        match frame.command() {
            0 if frame.length() == 0 => Incoming::None,
            command if command >> 12 == 0x6 => Incoming::SyncResponse { command },
            ZDO_STATE_CHANGE_IND => match payload.first() {
                Some(&state) => Incoming::StateChange(DeviceState::from(state)),
                None => Incoming::Malformed {
                    command: ZDO_STATE_CHANGE_IND,
                },
            },
            ZDO_END_DEVICE_ANNCE_IND => decode_announce(payload),
            ZDO_LEAVE_IND => decode_leave(payload),
            AF_INCOMING_MSG => decode_message(payload),
            AF_INCOMING_MSG_EXT => decode_message_ext(payload),
            AF_DATA_CONFIRM => decode_data_confirm(payload),
            SYS_RESET_IND => decode_reset(payload),
            command => Incoming::Unknown { command },
        }
    }
}

fn le_u16(payload: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([payload[at], payload[at + 1]])
}

fn le_u32(payload: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([
        payload[at],
        payload[at + 1],
        payload[at + 2],
        payload[at + 3],
    ])
}

fn decode_announce(payload: &[u8]) -> Incoming {
    if payload.len() < 13 {
        return Incoming::Malformed {
            command: ZDO_END_DEVICE_ANNCE_IND,
        };
    }
    let ieee_address = match IeeeAddress::from_slice(&payload[4..12]) {
        Some(addr) => addr,
        None => {
            return Incoming::Malformed {
                command: ZDO_END_DEVICE_ANNCE_IND,
            }
        }
    };
    Incoming::DeviceAnnounce(DeviceAnnounce {
        from: ShortAddress(le_u16(payload, 0)),
        short_address: ShortAddress(le_u16(payload, 2)),
        ieee_address,
        capabilities: payload[12],
    })
}

fn decode_leave(payload: &[u8]) -> Incoming {
    if payload.len() < 13 {
        return Incoming::Malformed {
            command: ZDO_LEAVE_IND,
        };
    }
    let ieee_address = match IeeeAddress::from_slice(&payload[2..10]) {
        Some(addr) => addr,
        None => {
            return Incoming::Malformed {
                command: ZDO_LEAVE_IND,
            }
        }
    };
    Incoming::Leave(LeaveIndication {
        source: ShortAddress(le_u16(payload, 0)),
        ieee_address,
        rejoin: payload[12] != 0,
    })
}

fn decode_message(payload: &[u8]) -> Incoming {
    if payload.len() < 17 {
        return Incoming::Malformed {
            command: AF_INCOMING_MSG,
        };
    }
    let data_len = payload[16] as usize;
    if payload.len() < 17 + data_len {
        return Incoming::Malformed {
            command: AF_INCOMING_MSG,
        };
    }
    Incoming::Message(IncomingMessage {
        group: le_u16(payload, 0),
        cluster: le_u16(payload, 2),
        source: ShortAddress(le_u16(payload, 4)),
        source_endpoint: payload[6],
        destination_endpoint: payload[7],
        was_broadcast: payload[8] != 0,
        link_quality: payload[9],
        security_used: payload[10] != 0,
        timestamp: le_u32(payload, 11),
        sequence: payload[15],
        data: payload[17..17 + data_len].to_vec(),
    })
}

fn decode_message_ext(payload: &[u8]) -> Incoming {
    if payload.len() < 27 {
        return Incoming::Malformed {
            command: AF_INCOMING_MSG_EXT,
        };
    }
    let source = match IeeeAddress::from_slice(&payload[5..13]) {
        Some(addr) => addr,
        None => {
            return Incoming::Malformed {
                command: AF_INCOMING_MSG_EXT,
            }
        }
    };
    Incoming::MessageExt(IncomingMessageExt {
        group: le_u16(payload, 0),
        cluster: le_u16(payload, 2),
        source_mode: payload[4],
        source,
        source_endpoint: payload[13],
        source_pan: le_u16(payload, 14),
        destination_endpoint: payload[16],
        was_broadcast: payload[17] != 0,
        link_quality: payload[18],
        security_used: payload[19] != 0,
        timestamp: le_u32(payload, 20),
        sequence: payload[24],
        length: le_u16(payload, 25),
    })
}

fn decode_data_confirm(payload: &[u8]) -> Incoming {
    if payload.len() < 3 {
        return Incoming::Malformed {
            command: AF_DATA_CONFIRM,
        };
    }
    Incoming::DataConfirm(DataConfirm {
        status: payload[0],
        endpoint: payload[1],
        sequence: payload[2],
    })
}

fn decode_reset(payload: &[u8]) -> Incoming {
    if payload.len() < 6 {
        return Incoming::Malformed {
            command: SYS_RESET_IND,
        };
    }
    Incoming::Reset(ResetIndication {
        reason: ResetReason::from(payload[0]),
        transport_revision: payload[1],
        product_id: payload[2],
        firmware: (payload[3], payload[4], payload[5]),
    })
}
