//! Host-testable core of the bt-macropad firmware.
//!
//! Everything that does not touch the radio or the pins directly lives
//! here: HID reports, the HID-over-GATT service engine, the GAP link
//! handler, input decoding, the inter-MCU codec and bond records.
//!
//! Usage: `cargo test` runs all of it on the host.
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and drives [`profile::ServiceEngine`] with the SoftDevice.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod bond;
pub mod config;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod hid;
pub mod input;
pub mod intermcu;
pub mod mode;
pub mod power_logic;
pub mod profile;

pub use error::{Error, TransportError};
pub use gap::{GapEvent, GapLayer, LinkHandler};
pub use gatt::{GattEvent, GattEventKind, GattTransport, SecurityLayer};
pub use mode::{KeyboardMode, ModeSwitch};
pub use profile::{HidEvent, HidEventHandler, ServiceEngine};

// ═══════════════════════════════════════════════════════════════════════════
// Cross-module Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use crate::hid::keyboard::{key, KeyboardReport, MAX_KEYS};
    use crate::hid::{ConsumerCmd, ConsumerReport};
    use crate::input::matrix::{key_bit, pressed_keys, EdgeLatch, SWITCH_BIT};
    use crate::input::VolumeKnob;
    use crate::intermcu::{command, handle_command, Frame, FrameDecoder};
    use crate::mode::{KeyboardMode, ModeSwitch};
    use crate::power_logic::scaled_battery;

    // ════════════════════════════════════════════════════════════════════════
    // Matrix → Keyboard Report
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn three_buttons_make_one_report() {
        let status = key_bit(0, 0) | key_bit(0, 1) | key_bit(0, 2);
        let keys = pressed_keys(status);
        let report = KeyboardReport::from_keys(0, &keys).unwrap();
        assert_eq!(
            report.to_bytes(),
            [0, 0, key::KEY_1, key::KEY_2, key::KEY_3, 0, 0, 0]
        );
    }

    #[test]
    fn all_nine_buttons_truncate_to_six() {
        let keys = pressed_keys(0x3FE);
        assert!(KeyboardReport::from_keys(0, &keys).is_err());

        let n = keys.len().min(MAX_KEYS);
        let report = KeyboardReport::from_keys(0, &keys[..n]).unwrap();
        assert_eq!(report.keycodes[5], key::KEY_6);
    }

    #[test]
    fn push_switch_is_mute_not_a_key() {
        let mut latch = EdgeLatch::new();
        let status = SWITCH_BIT;
        assert!(pressed_keys(status).is_empty());

        let pressed = latch.update(status & SWITCH_BIT != 0).unwrap();
        assert_eq!(
            ConsumerReport::new(ConsumerCmd::Mute, pressed).to_bytes(),
            ConsumerReport::new(ConsumerCmd::Mute, true).to_bytes()
        );
        assert_eq!(latch.update(false), Some(false));
        assert!(ConsumerReport::new(ConsumerCmd::Mute, false).is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Encoder → Consumer Report
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn knob_turn_produces_volume_reports() {
        let mut knob = VolumeKnob::new();
        let step = knob.step(3);
        let bytes: heapless::Vec<[u8; 2], 2> = step
            .actions
            .iter()
            .map(|a| ConsumerReport::new(a.cmd, a.pressed).to_bytes())
            .collect();
        assert_eq!(bytes.as_slice(), &[[0x40, 0x00]]);

        let step = knob.step(0);
        assert!(ConsumerReport::new(step.actions[0].cmd, step.actions[0].pressed).is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Inter-MCU Link
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn battery_update_frame() {
        let frame = Frame::new(command::BATT_UPDATE, scaled_battery(2914));
        assert_eq!(frame.encode(), [0x2B, 0x2B, 0x06, 185, 0x00]);
    }

    #[test]
    fn usb_mode_request_reaches_mode_switch() {
        let mut decoder = FrameDecoder::new();
        let mut mode = ModeSwitch::new();
        let mut replies = 0;
        let bytes = [
            0x2B, 0x2B, command::KB_MODE, 1, 0, 0x2B, 0x2B, command::ACK_REQ, 0, 0,
        ];
        decoder.extend(&bytes, |frame| {
            if let Some(reply) = handle_command(frame, &mut mode) {
                assert_eq!(reply.command, command::IMCU_ACK);
                replies += 1;
            }
        });
        assert_eq!(replies, 1);
        assert_eq!(mode.poll(), Some(KeyboardMode::Usb));
    }
}
