//! Consumer Control input report (report id 3).
//!
//! The report map packs several small fields into two bytes rather than
//! carrying a 16-bit usage:
//! ```text
//! Byte 0: bits 0..3 numeric key pad, bits 4..5 channel, bit 6 volume up,
//!         bit 7 volume down
//! Byte 1: bits 0..3 button (1..=12), bits 4..5 selection
//! ```
//! An all-zero report means "no command" and doubles as key release.

/// Consumer control report size in bytes.
pub const CONSUMER_REPORT_SIZE: usize = 2;

// Field masks: bits that survive when the field is overwritten.
const CHANNEL_KEEP: u8 = 0xCF;
const VOLUME_KEEP: u8 = 0x3F;
const BUTTON_KEEP: u8 = 0xF0;
const SELECTION_KEEP: u8 = 0xCF;

const CHANNEL_SHIFT: u8 = 4;
const SELECTION_SHIFT: u8 = 4;

pub const CHANNEL_UP: u8 = 0x01;
pub const CHANNEL_DOWN: u8 = 0x03;
pub const VOLUME_UP: u8 = 0x40;
pub const VOLUME_DOWN: u8 = 0x80;

/// Values of the 4-bit button field, in report map order.
pub mod button {
    pub const MUTE: u8 = 1;
    pub const POWER: u8 = 2;
    pub const LAST: u8 = 3;
    pub const ASSIGN_SEL: u8 = 4;
    pub const PLAY: u8 = 5;
    pub const PAUSE: u8 = 6;
    pub const RECORD: u8 = 7;
    pub const FAST_FWD: u8 = 8;
    pub const REWIND: u8 = 9;
    pub const SCAN_NEXT_TRK: u8 = 10;
    pub const SCAN_PREV_TRK: u8 = 11;
    pub const STOP: u8 = 12;
}

/// Consumer commands the report can express. Discriminants are the
/// Consumer page usage ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConsumerCmd {
    Power = 48,
    AssignSel = 129,
    RecallLast = 131,
    ChannelUp = 156,
    ChannelDown = 157,
    Play = 176,
    Pause = 177,
    Record = 178,
    FastForward = 179,
    Rewind = 180,
    ScanNextTrk = 181,
    ScanPrevTrk = 182,
    Stop = 183,
    Mute = 226,
    VolumeUp = 233,
    VolumeDown = 234,
}

impl ConsumerCmd {
    pub fn from_usage(usage: u8) -> Option<Self> {
        use ConsumerCmd::*;
        Some(match usage {
            48 => Power,
            129 => AssignSel,
            131 => RecallLast,
            156 => ChannelUp,
            157 => ChannelDown,
            176 => Play,
            177 => Pause,
            178 => Record,
            179 => FastForward,
            180 => Rewind,
            181 => ScanNextTrk,
            182 => ScanPrevTrk,
            183 => Stop,
            226 => Mute,
            233 => VolumeUp,
            234 => VolumeDown,
            _ => return None,
        })
    }
}

/// Consumer Control report bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerReport(pub [u8; CONSUMER_REPORT_SIZE]);

impl ConsumerReport {
    /// Create an empty (no command) report.
    pub const fn empty() -> Self {
        Self([0; CONSUMER_REPORT_SIZE])
    }

    /// Report for `cmd` while pressed; the empty report on release.
    pub fn new(cmd: ConsumerCmd, pressed: bool) -> Self {
        let mut report = Self::empty();
        if pressed {
            report.apply(cmd);
        }
        report
    }

    /// Encode `cmd` into its field, leaving the other fields untouched.
    pub fn apply(&mut self, cmd: ConsumerCmd) {
        use ConsumerCmd::*;
        match cmd {
            ChannelUp => self.set_channel(CHANNEL_UP),
            ChannelDown => self.set_channel(CHANNEL_DOWN),
            VolumeUp => self.set_volume(VOLUME_UP),
            VolumeDown => self.set_volume(VOLUME_DOWN),
            Mute => self.set_button(button::MUTE),
            Power => self.set_button(button::POWER),
            RecallLast => self.set_button(button::LAST),
            AssignSel => self.set_button(button::ASSIGN_SEL),
            Play => self.set_button(button::PLAY),
            Pause => self.set_button(button::PAUSE),
            Record => self.set_button(button::RECORD),
            FastForward => self.set_button(button::FAST_FWD),
            Rewind => self.set_button(button::REWIND),
            ScanNextTrk => self.set_button(button::SCAN_NEXT_TRK),
            ScanPrevTrk => self.set_button(button::SCAN_PREV_TRK),
            Stop => self.set_button(button::STOP),
        }
    }

    /// Numeric key pad value. Replaces all of byte 0, including the
    /// channel and volume fields.
    pub fn set_numeric(&mut self, value: u8) {
        self.0[0] = value;
    }

    pub fn set_channel(&mut self, value: u8) {
        self.0[0] &= CHANNEL_KEEP;
        self.0[0] |= (value & 0x03) << CHANNEL_SHIFT;
    }

    pub fn set_volume(&mut self, value: u8) {
        self.0[0] &= VOLUME_KEEP;
        self.0[0] |= value;
    }

    pub fn set_button(&mut self, value: u8) {
        self.0[1] &= BUTTON_KEEP;
        self.0[1] |= value;
    }

    pub fn set_selection(&mut self, value: u8) {
        self.0[1] &= SELECTION_KEEP;
        self.0[1] |= (value & 0x03) << SELECTION_SHIFT;
    }

    /// Serialise into a byte slice. Returns the number of bytes written.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < CONSUMER_REPORT_SIZE {
            return 0;
        }
        buf[..CONSUMER_REPORT_SIZE].copy_from_slice(&self.0);
        CONSUMER_REPORT_SIZE
    }

    pub const fn to_bytes(&self) -> [u8; CONSUMER_REPORT_SIZE] {
        self.0
    }

    /// Check if any command is set.
    pub fn is_empty(&self) -> bool {
        self.0 == [0; CONSUMER_REPORT_SIZE]
    }
}
