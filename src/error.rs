//! Unified error type for bt-macropad.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use crate::gatt::GattStatus;
use crate::hid::{ProtocolMode, ReportType};

/// Top-level error type used across the library and firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Service setup
    /// The profile has not been initialised with `init()` yet.
    NotInitialized,

    /// The stack rejected a profile registration.
    RegistrationFailed(GattStatus),

    /// The stack failed to instantiate an attribute table.
    TableCreationFailed(GattStatus),

    /// The stack returned a different number of handles than declared.
    HandleCountMismatch { expected: usize, actual: usize },

    // Report registry
    /// More report entries than the registry can hold.
    ReportTableFull,

    /// Two registry entries share the same (id, type, mode) key.
    DuplicateReport {
        id: u8,
        report_type: ReportType,
        mode: ProtocolMode,
    },

    // Report dispatch
    /// Handle outside the installed HID attribute range.
    InvalidHandle(u16),

    /// More simultaneous keys than a keyboard report can carry.
    TooManyKeys(usize),

    // Bonds
    /// No bond with the given master key id.
    UnknownBond,

    // Peripherals
    /// GPIO read/write on the key matrix failed.
    Gpio,

    /// Inter-MCU frame could not be decoded.
    InvalidFrame,

    // Generic
    /// The GATT/GAP backend returned an error.
    Transport(TransportError),

    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Subset of stack errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Raw error code from the BLE stack.
    Raw(u32),
    /// The connection the call referred to no longer exists.
    Disconnected,
    /// The backend cannot perform this operation.
    Unsupported,
    /// Attribute table, queue or buffer exhausted.
    NoResources,
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}
