//! The request/response exchange engine.
//!
//! One exchange moves exactly one frame each way:
//!
//! 1. assert select;
//! 2. wait for the module to assert ready (it will accept a frame);
//! 3. clock the request out, full duplex;
//! 4. zero the outgoing header so the next clocks read as a poll;
//! 5. wait for the module to deassert ready (response staged);
//! 6. clock the 3-byte response header in, then the declared payload;
//! 7. release select.
//!
//! A poll is the same exchange with the header pre-zeroed; the module
//! answers with whatever indication it has queued, or an all-zero
//! frame if nothing is pending.
//!
//! Any step that fails releases select and resets the bus exactly once
//! before the error is returned, so a single desynchronized exchange
//! cannot wedge every call after it.

use std::time::Duration;

use log::{trace, warn};
use zncp_protocol::{srsp_id, Frame, ModuleError};

use crate::bus::Bus;
use crate::wait::WaitStrategy;

/// How long the module gets to assert ready after select.
const SELECT_WAIT: Duration = Duration::from_millis(5);

/// How long the module gets to stage a synchronous response.
const RESPONSE_WAIT: Duration = Duration::from_secs(1);

/// Drives single frame exchanges over a [`Bus`].
pub struct Transport<B, W> {
    bus: B,
    wait: W,
}

impl<B: Bus, W: WaitStrategy> Transport<B, W> {
    pub fn new(bus: B, wait: W) -> Self {
        Transport { bus, wait }
    }

    /// Whether the module is signalling a queued unsolicited frame.
    pub fn message_waiting(&mut self) -> bool {
        self.bus.ready()
    }

    /// Pulse the module's hardware reset line.
    pub fn reset_module(&mut self) {
        self.bus.reset();
    }

    /// Pause the calling thread, using this transport's wait policy.
    pub fn sleep(&mut self, interval: Duration) {
        self.wait.sleep(interval);
    }

    /// Run one synchronous request. On success the frame holds the
    /// paired response; a response with any other command id fails as
    /// [`ModuleError::IncorrectSrsp`].
    pub fn send(&mut self, frame: &mut Frame) -> Result<(), ModuleError> {
        let expected = srsp_id(frame.command());
        trace!(
            "sreq 0x{:04X}, {} payload bytes",
            frame.command(),
            frame.length()
        );
        self.exchange(frame)?;
        if frame.command() != expected {
            warn!(
                "srsp mismatch: expected 0x{expected:04X}, received 0x{:04X}",
                frame.command()
            );
            self.recover();
            return Err(ModuleError::IncorrectSrsp {
                expected,
                received: frame.command(),
            });
        }
        Ok(())
    }

    /// Fetch one queued unsolicited frame. The frame is overwritten;
    /// an all-zero result means nothing was pending after all.
    pub fn poll(&mut self, frame: &mut Frame) -> Result<(), ModuleError> {
        frame.clear_header();
        self.exchange(frame)
    }

    fn exchange(&mut self, frame: &mut Frame) -> Result<(), ModuleError> {
        match self.run_exchange(frame) {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!("exchange failed: {error}");
                self.recover();
                Err(error)
            }
        }
    }

    fn run_exchange(&mut self, frame: &mut Frame) -> Result<(), ModuleError> {
        let Transport { bus, wait } = self;

        bus.set_select(true);
        if !wait.wait_until(SELECT_WAIT, &mut || bus.ready()) {
            return Err(ModuleError::ChipSelectTimeout);
        }

        bus.transfer(frame.wire_mut());
        frame.clear_header();

        if !wait.wait_until(RESPONSE_WAIT, &mut || !bus.ready()) {
            return Err(ModuleError::SrspTimeout);
        }

        bus.transfer(frame.header_mut());
        if frame.length() > 0 {
            bus.transfer(frame.payload_mut());
        }
        bus.set_select(false);
        trace!(
            "received 0x{:04X}, {} payload bytes",
            frame.command(),
            frame.length()
        );
        Ok(())
    }

    fn recover(&mut self) {
        self.bus.set_select(false);
        self.bus.reset();
    }
}
