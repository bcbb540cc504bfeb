//! Error taxonomy for module operations.
//!
//! Every fallible operation in the driver resolves to a
//! [`ModuleError`]. Three families exist and callers may want to treat
//! them differently:
//!
//! - *validation* errors are detected before any bus activity and are
//!   always recoverable by fixing the arguments;
//! - *transport* errors mean the handshake with the module went wrong;
//!   the bus has already been reset by the time the error surfaces;
//! - *decode* errors ([`ModuleError::MalformedResponse`]) mean the
//!   exchange completed but the response was too short for its type;
//!   no reset is involved;
//! - [`ModuleError::Status`] carries the module's own nonzero status
//!   byte through unchanged; the driver never reinterprets it.

use thiserror::Error;

/// Errors surfaced by module operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// A parameter was out of range.
    #[error("invalid parameter")]
    InvalidParameter,

    /// A payload or field length was out of range.
    #[error("invalid length: maximum {max} bytes, got {actual}")]
    InvalidLength {
        /// Largest permitted length.
        max: usize,
        /// Length supplied by the caller.
        actual: usize,
    },

    /// The cluster id was not acceptable (zero is reserved).
    #[error("invalid cluster id")]
    InvalidCluster,

    /// The module never acknowledged chip select being asserted.
    #[error("module did not respond to chip select")]
    ChipSelectTimeout,

    /// The module accepted the request but no synchronous response
    /// arrived in time.
    #[error("synchronous response timed out")]
    SrspTimeout,

    /// A synchronous response arrived but its command id did not pair
    /// with the request.
    #[error("wrong synchronous response: expected 0x{expected:04X}, received 0x{received:04X}")]
    IncorrectSrsp {
        /// Command id the request implies.
        expected: u16,
        /// Command id actually received.
        received: u16,
    },

    /// The response paired correctly but carried fewer bytes than its
    /// type requires. A decode failure, not a transport failure: the
    /// exchange itself completed and the bus is not reset.
    #[error("malformed response payload")]
    MalformedResponse,

    /// The exchange succeeded but the awaited asynchronous
    /// notification never arrived before the deadline.
    #[error("timed out waiting for notification")]
    Timeout,

    /// The module reported a nonzero status byte. The value is the
    /// stack's own error code, passed through unchanged.
    #[error("module status 0x{0:02X}")]
    Status(u8),

    /// The module's reported build/product id failed the startup
    /// sanity check.
    #[error("invalid module configuration")]
    InvalidModuleConfiguration,

    /// A physical-interface failure that fits no other category.
    #[error("physical interface error")]
    Phy,
}

impl ModuleError {
    /// The one-byte result code this error occupies on the wire, for
    /// parity with the module interface specification. Codes 0x31–0x3B
    /// are reserved for the host-side driver and do not collide with
    /// the stack's status values. [`ModuleError::Status`] is already a
    /// wire code and passes through.
    pub fn code(&self) -> u8 {
        match self {
            ModuleError::InvalidParameter => 0x31,
            ModuleError::Timeout => 0x32,
            ModuleError::InvalidLength { .. } => 0x33,
            ModuleError::InvalidCluster => 0x34,
            ModuleError::MalformedResponse => 0x36,
            ModuleError::ChipSelectTimeout => 0x37,
            ModuleError::SrspTimeout => 0x38,
            ModuleError::IncorrectSrsp { .. } => 0x39,
            ModuleError::InvalidModuleConfiguration => 0x3A,
            ModuleError::Phy => 0x3B,
            ModuleError::Status(code) => *code,
        }
    }

    /// Whether this error came out of the transport layer (and the bus
    /// was therefore reset before it surfaced).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ModuleError::ChipSelectTimeout
                | ModuleError::SrspTimeout
                | ModuleError::IncorrectSrsp { .. }
                | ModuleError::Phy
        )
    }
}
