//! The physical bus abstraction.
//!
//! The module hangs off a full-duplex synchronous serial bus with two
//! sideband signals: a *select* output the host drives and a *ready*
//! input the module drives. Pin and register access live behind this
//! trait so the transport can be exercised against a scripted fake.

/// Raw access to the serial bus and its handshake signals.
///
/// Ready-line convention: `ready()` reports whether the module is
/// asserting its handshake line. While idle, asserted means an
/// unsolicited frame is queued. During an exchange, the module asserts
/// the line to accept the request and *deasserts* it once the response
/// is staged, so the transport waits for `true` before transmitting
/// and for `false` before reading back.
pub trait Bus {
    /// Drive the select line. The module only talks while selected.
    fn set_select(&mut self, asserted: bool);

    /// Sample the module's ready line.
    fn ready(&mut self) -> bool;

    /// Full-duplex transfer: clock out `buf`, overwrite it with the
    /// bytes received in the same clocks.
    fn transfer(&mut self, buf: &mut [u8]);

    /// Reinitialize the bus peripheral and pulse the module's reset
    /// line, clearing any half-finished exchange on both sides.
    fn reset(&mut self);
}
