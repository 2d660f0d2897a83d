//! Mouse input report (report id 1).
//!
//! Layout (5 bytes):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left, Bit 1 = Right, Bit 2 = Middle
//! Byte 1: X displacement (signed, -127..127)
//! Byte 2: Y displacement (signed, -127..127)
//! Byte 3: Scroll wheel (always 0)
//! Byte 4: AC pan (always 0)
//! ```

/// Mouse report size in bytes.
pub const MOUSE_REPORT_SIZE: usize = 5;

pub const BUTTON_LEFT: u8 = 1 << 0;
pub const BUTTON_RIGHT: u8 = 1 << 1;
pub const BUTTON_MIDDLE: u8 = 1 << 2;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield (bit 0 = left, bit 1 = right, bit 2 = middle).
    pub buttons: u8,
    /// Relative X movement (signed).
    pub x: i8,
    /// Relative Y movement (signed).
    pub y: i8,
}

impl MouseReport {
    pub const fn new(buttons: u8, x: i8, y: i8) -> Self {
        Self { buttons, x, y }
    }

    /// Serialise into a byte slice.
    /// Returns the number of bytes written (always 5).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1] = self.x as u8;
        buf[2] = self.y as u8;
        buf[3] = 0;
        buf[4] = 0;
        MOUSE_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; MOUSE_REPORT_SIZE] {
        let mut buf = [0u8; MOUSE_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }

    /// Returns `true` when no buttons are pressed and there is no movement.
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0
    }
}
