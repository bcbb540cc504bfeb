//! Blocking driver for a Zigbee network coprocessor on a synchronous
//! serial bus.
//!
//! The module does all the radio work; this crate drives it. A
//! [`Session`] turns logical operations (join a network, send a
//! message, bind two endpoints) into framed requests, runs each one
//! through the select/ready handshake, and blocks for the paired
//! response or the follow-up indication the operation requires.
//!
//! Hardware access goes through the [`Bus`] trait, so the whole stack
//! runs unmodified against a scripted fake in tests. Waiting policy is
//! pluggable through [`WaitStrategy`]: spin on bare metal, sleep on a
//! hosted target. Execution is single-threaded and cooperative; one
//! exchange is in flight at a time.
//!
//! ```no_run
//! use zncp_driver::{ApplicationConfig, ModuleConfig, Session, SleepWait};
//! use zncp_protocol::{Incoming, ShortAddress};
//!
//! # struct NullBus;
//! # impl zncp_driver::Bus for NullBus {
//! #     fn set_select(&mut self, _: bool) {}
//! #     fn ready(&mut self) -> bool { false }
//! #     fn transfer(&mut self, _: &mut [u8]) {}
//! #     fn reset(&mut self) {}
//! # }
//! # fn open_bus() -> NullBus { NullBus }
//! # fn main() -> Result<(), zncp_protocol::ModuleError> {
//! let mut session = Session::new(open_bus(), SleepWait::default());
//! session.start(&ModuleConfig::coordinator(), &ApplicationConfig::default())?;
//! session.send_data(ShortAddress(0x1234), 0xD7, 0xD7, 0x0007, b"hi")?;
//! if let Incoming::Message(msg) = session.receive()? {
//!     println!("{} says {:?}", msg.source, msg.data);
//! }
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod session;
mod transport;
mod wait;

pub use bus::Bus;
pub use config::{ApplicationConfig, ModuleConfig, MAX_BINDING_CLUSTERS, MAX_ENDPOINT};
pub use session::{
    AddressResponse, NodeDescriptor, Session, VersionInfo, POLL_INTERVAL,
};
pub use transport::Transport;
pub use wait::{SleepWait, SpinWait, WaitStrategy};
