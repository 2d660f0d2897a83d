//! Keyboard input report (report id 2, also the boot keyboard layout).
//!
//! Layout (8 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//!         Bit 0 = Left Ctrl,  Bit 1 = Left Shift,
//!         Bit 2 = Left Alt,   Bit 3 = Left GUI,
//!         Bit 4 = Right Ctrl, Bit 5 = Right Shift,
//!         Bit 6 = Right Alt,  Bit 7 = Right GUI
//! Byte 1: Reserved (0x00)
//! Byte 2-7: Up to 6 simultaneous key codes (USB HID usage codes)
//! ```

use crate::error::Error;

/// Keyboard report size in bytes.
pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Maximum simultaneous keys in one report.
pub const MAX_KEYS: usize = KEYBOARD_REPORT_SIZE - 2;

/// Modifier bit masks for byte 0.
pub mod modifier {
    pub const LEFT_CTRL: u8 = 1 << 0;
    pub const LEFT_SHIFT: u8 = 1 << 1;
    pub const LEFT_ALT: u8 = 1 << 2;
    pub const LEFT_GUI: u8 = 1 << 3;
    pub const RIGHT_CTRL: u8 = 1 << 4;
    pub const RIGHT_SHIFT: u8 = 1 << 5;
    pub const RIGHT_ALT: u8 = 1 << 6;
    pub const RIGHT_GUI: u8 = 1 << 7;
}

/// Keyboard page usages used by the macropad.
pub mod key {
    pub const RESERVED: u8 = 0;
    pub const A: u8 = 4;
    pub const B: u8 = 5;
    pub const C: u8 = 6;
    pub const D: u8 = 7;
    pub const E: u8 = 8;
    pub const F: u8 = 9;
    pub const G: u8 = 10;
    pub const H: u8 = 11;
    pub const I: u8 = 12;
    pub const J: u8 = 13;
    pub const K: u8 = 14;
    pub const L: u8 = 15;
    pub const M: u8 = 16;
    pub const N: u8 = 17;
    pub const O: u8 = 18;
    pub const P: u8 = 19;
    pub const Q: u8 = 20;
    pub const R: u8 = 21;
    pub const S: u8 = 22;
    pub const T: u8 = 23;
    pub const U: u8 = 24;
    pub const V: u8 = 25;
    pub const W: u8 = 26;
    pub const X: u8 = 27;
    pub const Y: u8 = 28;
    pub const Z: u8 = 29;
    pub const KEY_1: u8 = 30;
    pub const KEY_2: u8 = 31;
    pub const KEY_3: u8 = 32;
    pub const KEY_4: u8 = 33;
    pub const KEY_5: u8 = 34;
    pub const KEY_6: u8 = 35;
    pub const KEY_7: u8 = 36;
    pub const KEY_8: u8 = 37;
    pub const KEY_9: u8 = 38;
    pub const KEY_0: u8 = 39;
    pub const RETURN: u8 = 40;
    pub const ESCAPE: u8 = 41;
    pub const DELETE: u8 = 42;
    pub const TAB: u8 = 43;
    pub const SPACEBAR: u8 = 44;
    pub const CAPS_LOCK: u8 = 57;
    pub const F1: u8 = 58;
    pub const F12: u8 = 69;
    pub const RIGHT_ARROW: u8 = 79;
    pub const LEFT_ARROW: u8 = 80;
    pub const DOWN_ARROW: u8 = 81;
    pub const UP_ARROW: u8 = 82;
    pub const LEFT_CTRL: u8 = 224;
    pub const RIGHT_GUI: u8 = 231;
}

/// Keyboard input report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Reserved byte, always 0x00.
    pub reserved: u8,
    /// Up to 6 simultaneously pressed key codes, left-packed.
    pub keycodes: [u8; MAX_KEYS],
}

impl KeyboardReport {
    /// Create an empty (all-keys-released) report.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; MAX_KEYS],
        }
    }

    /// Build a report from a modifier mask and a key list.
    ///
    /// Keys are packed from offset 2; unused slots stay zero. More than
    /// [`MAX_KEYS`] keys is rejected rather than truncated.
    pub fn from_keys(modifier: u8, keys: &[u8]) -> Result<Self, Error> {
        if keys.len() > MAX_KEYS {
            error!(
                "keyboard report takes at most {} keys, got {}",
                MAX_KEYS,
                keys.len()
            );
            return Err(Error::TooManyKeys(keys.len()));
        }

        let mut report = Self::empty();
        report.modifier = modifier;
        report.keycodes[..keys.len()].copy_from_slice(keys);
        Ok(report)
    }

    /// Serialise into a byte slice.
    /// Returns the number of bytes written (always 8).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1] = self.reserved;
        buf[2..8].copy_from_slice(&self.keycodes);
        KEYBOARD_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; KEYBOARD_REPORT_SIZE] {
        let mut buf = [0u8; KEYBOARD_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }

    /// Returns `true` if no keys are pressed (release event).
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}
