//! 16-bit Bluetooth SIG UUIDs used by the HID and Battery services.

// Services
pub const HID_SERVICE: u16 = 0x1812;
pub const BATTERY_SERVICE: u16 = 0x180F;

// Declarations
pub const PRIMARY_SERVICE: u16 = 0x2800;
pub const INCLUDE: u16 = 0x2802;
pub const CHARACTERISTIC: u16 = 0x2803;

// HID characteristics
pub const HID_INFORMATION: u16 = 0x2A4A;
pub const REPORT_MAP: u16 = 0x2A4B;
pub const HID_CONTROL_POINT: u16 = 0x2A4C;
pub const REPORT: u16 = 0x2A4D;
pub const PROTOCOL_MODE: u16 = 0x2A4E;
pub const BOOT_KEYBOARD_INPUT: u16 = 0x2A22;
pub const BOOT_KEYBOARD_OUTPUT: u16 = 0x2A32;
pub const BOOT_MOUSE_INPUT: u16 = 0x2A33;

// Battery characteristics
pub const BATTERY_LEVEL: u16 = 0x2A19;

// Descriptors
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: u16 = 0x2902;
pub const PRESENTATION_FORMAT: u16 = 0x2904;
pub const EXTERNAL_REPORT_REFERENCE: u16 = 0x2907;
pub const REPORT_REFERENCE: u16 = 0x2908;

// Units
pub const UNIT_PERCENTAGE: u16 = 0x27AD;

/// Application ids used when registering the two profiles. They reuse the
/// service UUIDs so registration events can be attributed unambiguously.
pub const HID_APP_ID: u16 = HID_SERVICE;
pub const BATTERY_APP_ID: u16 = BATTERY_SERVICE;
