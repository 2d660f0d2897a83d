//! Keyboard mode: who scans the key matrix.
//!
//! In Bluetooth mode this MCU drives the matrix columns and reports keys
//! over BLE. In USB mode the columns are released to high impedance and
//! the companion MCU scans instead.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum KeyboardMode {
    #[default]
    Bluetooth = 0,
    Usb = 1,
}

impl KeyboardMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Bluetooth),
            1 => Some(Self::Usb),
            _ => None,
        }
    }
}

/// Requested vs applied keyboard mode.
#[derive(Debug, Default)]
pub struct ModeSwitch {
    requested: KeyboardMode,
    current: KeyboardMode,
}

impl ModeSwitch {
    pub const fn new() -> Self {
        Self {
            requested: KeyboardMode::Bluetooth,
            current: KeyboardMode::Bluetooth,
        }
    }

    pub fn request(&mut self, mode: KeyboardMode) {
        self.requested = mode;
    }

    pub fn requested(&self) -> KeyboardMode {
        self.requested
    }

    /// Mode the hardware is currently configured for.
    pub fn current(&self) -> KeyboardMode {
        self.current
    }

    /// Apply a pending request. Returns the new mode once per change.
    pub fn poll(&mut self) -> Option<KeyboardMode> {
        if self.requested == self.current {
            return None;
        }
        info!("keyboard mode {:?} -> {:?}", self.current, self.requested);
        self.current = self.requested;
        Some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_bluetooth() {
        let mut sw = ModeSwitch::new();
        assert_eq!(sw.current(), KeyboardMode::Bluetooth);
        assert_eq!(sw.poll(), None);
    }

    #[test]
    fn transition_reported_once() {
        let mut sw = ModeSwitch::new();
        sw.request(KeyboardMode::Usb);
        assert_eq!(sw.current(), KeyboardMode::Bluetooth);
        assert_eq!(sw.poll(), Some(KeyboardMode::Usb));
        assert_eq!(sw.poll(), None);
        assert_eq!(sw.current(), KeyboardMode::Usb);
    }

    #[test]
    fn request_and_revert_before_poll_is_no_change() {
        let mut sw = ModeSwitch::new();
        sw.request(KeyboardMode::Usb);
        sw.request(KeyboardMode::Bluetooth);
        assert_eq!(sw.poll(), None);
    }

    #[test]
    fn from_u8() {
        assert_eq!(KeyboardMode::from_u8(0), Some(KeyboardMode::Bluetooth));
        assert_eq!(KeyboardMode::from_u8(1), Some(KeyboardMode::Usb));
        assert_eq!(KeyboardMode::from_u8(2), None);
    }
}
