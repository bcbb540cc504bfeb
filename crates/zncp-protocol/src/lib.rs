//! Zigbee Network Coprocessor Wire Protocol
//!
//! This crate provides types and utilities for the command/response
//! protocol spoken by a Zigbee network coprocessor over its synchronous
//! serial interface. Every exchange is a length-prefixed frame:
//!
//! ```text
//! +--------+---------+---------+-------------------+
//! | length | cmd MSB | cmd LSB | payload[0..length] |
//! +--------+---------+---------+-------------------+
//! ```
//!
//! Frames are either:
//!
//! - **Synchronous requests** (host → module, SREQ): always answered
//!   immediately by a paired synchronous response (SRSP) whose command
//!   id is the request id with bit 0x4000 set.
//! - **Asynchronous indications** (module → host, AREQ): unsolicited
//!   notifications such as incoming messages, data confirms, or device
//!   announcements, retrieved by polling.
//!
//! This crate is pure: it encodes and decodes frames and classifies
//! incoming ones, but performs no I/O. The companion `zncp-driver`
//! crate drives the handshake-gated bus and the blocking command
//! dispatch built on these types.

mod constants;
mod error;
mod frame;
mod incoming;
mod types;

pub use constants::*;
pub use error::*;
pub use frame::*;
pub use incoming::*;
pub use types::*;
