//! HID report types shared by the GATT tables and the report dispatcher.

pub mod consumer;
pub mod descriptor;
pub mod keyboard;
pub mod mouse;


pub use consumer::{ConsumerCmd, ConsumerReport};
pub use keyboard::KeyboardReport;
pub use mouse::MouseReport;

/// Report type as carried in a report reference descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

/// HID protocol mode (value of the Protocol Mode characteristic).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ProtocolMode {
    Boot = 0,
    #[default]
    Report = 1,
}

impl ProtocolMode {
    /// Decode a Protocol Mode characteristic write.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ProtocolMode::Boot),
            1 => Some(ProtocolMode::Report),
            _ => None,
        }
    }
}

/// Report ids declared in the report map.
pub mod report_id {
    pub const MOUSE_IN: u8 = 1;
    pub const KEY_IN: u8 = 2;
    pub const CC_IN: u8 = 3;
    pub const VENDOR_OUT: u8 = 4;
    pub const LED_OUT: u8 = 0;
    pub const FEATURE: u8 = 0;
}
