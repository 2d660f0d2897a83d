//! Serial link to the companion (USB) microcontroller.
//!
//! Frames are five bytes: `+ + command data 0`. The two `+` bytes mark the
//! start of a frame; the trailing byte is reserved and always zero.

use crate::error::Error;
use crate::mode::{KeyboardMode, ModeSwitch};

/// Start-of-frame byte, sent twice.
pub const PATTERN: u8 = 0x2B;
pub const PATTERN_LEN: usize = 2;
pub const FRAME_LEN: usize = 5;

pub mod command {
    pub const HOST_USB_CONN: u8 = 0x01;
    pub const HOST_USB_DISCONN: u8 = 0x02;
    pub const TEST_MESSAGE: u8 = 0x03;
    pub const ACK_REQ: u8 = 0x04;
    pub const KB_MODE: u8 = 0x05;
    pub const BATT_UPDATE: u8 = 0x06;
    pub const ROT_SW_UPDATE: u8 = 0x07;
    pub const ROT_POS_POSITIVE: u8 = 0x08;
    pub const ROT_POS_NEGATIVE: u8 = 0x09;
    pub const IMCU_ACK: u8 = 0xFF;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub command: u8,
    pub data: u8,
}

impl Frame {
    pub const fn new(command: u8, data: u8) -> Self {
        Self { command, data }
    }

    pub const fn encode(&self) -> [u8; FRAME_LEN] {
        [PATTERN, PATTERN, self.command, self.data, 0]
    }

    /// Parse a complete frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        match bytes {
            [PATTERN, PATTERN, command, data, _] => Ok(Self::new(*command, *data)),
            _ => Err(Error::InvalidFrame),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Hunt,
    Pattern,
    Command,
    Data { command: u8 },
    Reserved { command: u8, data: u8 },
}

/// Incremental frame parser. Bytes outside a frame are skipped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: State,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { state: State::Hunt }
    }

    /// Feed one byte; returns a frame when one completes.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        let (next, frame) = match (self.state, byte) {
            (State::Hunt, PATTERN) => (State::Pattern, None),
            (State::Hunt, _) => (State::Hunt, None),
            (State::Pattern, PATTERN) => (State::Command, None),
            (State::Pattern, _) => (State::Hunt, None),
            (State::Command, command) => (State::Data { command }, None),
            (State::Data { command }, data) => (State::Reserved { command, data }, None),
            (State::Reserved { command, data }, _) => (State::Hunt, Some(Frame::new(command, data))),
        };
        self.state = next;
        frame
    }

    /// Feed a buffer, calling `f` for every completed frame.
    pub fn extend<F: FnMut(Frame)>(&mut self, bytes: &[u8], mut f: F) {
        for &b in bytes {
            if let Some(frame) = self.push(b) {
                f(frame);
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Hunt;
    }
}

/// Act on a frame from the companion MCU. Returns the reply to send, if any.
pub fn handle_command(frame: Frame, mode: &mut ModeSwitch) -> Option<Frame> {
    debug!("imcu command {} data {}", frame.command, frame.data);
    match frame.command {
        command::ACK_REQ => Some(Frame::new(command::IMCU_ACK, 0)),
        command::KB_MODE => {
            match KeyboardMode::from_u8(frame.data) {
                Some(m) => mode.request(m),
                None => warn!("ignoring keyboard mode {}", frame.data),
            }
            None
        }
        command::HOST_USB_CONN => {
            info!("USB host connected");
            None
        }
        command::HOST_USB_DISCONN => {
            info!("USB host disconnected");
            None
        }
        command::TEST_MESSAGE => None,
        _ => {
            trace!("unhandled imcu command {}", frame.command);
            None
        }
    }
}
