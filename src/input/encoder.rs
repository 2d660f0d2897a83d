//! Rotary encoder mapped to volume up/down.

use heapless::Vec;

use crate::config::ENCODER_MIN_PERIOD_MS;
use crate::hid::ConsumerCmd;
use crate::intermcu::{command, Frame};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Held {
    #[default]
    None,
    Up,
    Down,
}

/// Consumer key transition to send to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnobAction {
    pub cmd: ConsumerCmd,
    pub pressed: bool,
}

impl KnobAction {
    const fn press(cmd: ConsumerCmd) -> Self {
        Self { cmd, pressed: true }
    }

    const fn release(cmd: ConsumerCmd) -> Self {
        Self {
            cmd,
            pressed: false,
        }
    }
}

/// Outcome of one encoder poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnobStep {
    pub actions: Vec<KnobAction, 2>,
    /// Position update for the companion MCU.
    pub message: Frame,
    /// Wait before the next poll.
    pub delay_ms: u64,
}

/// Holds VOLUME_UP or VOLUME_DOWN while the knob keeps turning the same
/// way and releases it once the knob stops.
#[derive(Debug, Default)]
pub struct VolumeKnob {
    held: Held,
}

impl VolumeKnob {
    pub const fn new() -> Self {
        Self { held: Held::None }
    }

    /// Feed the counter change since the previous poll.
    pub fn step(&mut self, delta: i16) -> KnobStep {
        let mut actions = Vec::new();
        let magnitude = delta.unsigned_abs();

        let target = match delta {
            0 => Held::None,
            d if d > 0 => Held::Up,
            _ => Held::Down,
        };

        if target != self.held {
            match self.held {
                Held::Up => push(&mut actions, KnobAction::release(ConsumerCmd::VolumeUp)),
                Held::Down => push(&mut actions, KnobAction::release(ConsumerCmd::VolumeDown)),
                Held::None => {}
            }
            match target {
                Held::Up => push(&mut actions, KnobAction::press(ConsumerCmd::VolumeUp)),
                Held::Down => push(&mut actions, KnobAction::press(ConsumerCmd::VolumeDown)),
                Held::None => {}
            }
            debug!("volume knob {:?} -> {:?}", self.held, target);
            self.held = target;
        }

        let cmd = if delta < 0 {
            command::ROT_POS_NEGATIVE
        } else {
            command::ROT_POS_POSITIVE
        };
        let data = u8::try_from(magnitude).unwrap_or(u8::MAX);

        KnobStep {
            actions,
            message: Frame::new(cmd, data),
            delay_ms: u64::from(magnitude).max(ENCODER_MIN_PERIOD_MS),
        }
    }
}

fn push(actions: &mut Vec<KnobAction, 2>, action: KnobAction) {
    // At most one release and one press per step.
    let _ = actions.push(action);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(cmd: ConsumerCmd) -> KnobAction {
        KnobAction::press(cmd)
    }

    fn release(cmd: ConsumerCmd) -> KnobAction {
        KnobAction::release(cmd)
    }

    #[test]
    fn up_up_idle() {
        let mut knob = VolumeKnob::new();
        assert_eq!(knob.step(2).actions.as_slice(), &[press(ConsumerCmd::VolumeUp)]);
        assert!(knob.step(1).actions.is_empty());
        assert_eq!(knob.step(0).actions.as_slice(), &[release(ConsumerCmd::VolumeUp)]);
        assert!(knob.step(0).actions.is_empty());
    }

    #[test]
    fn reversing_releases_then_presses() {
        let mut knob = VolumeKnob::new();
        knob.step(1);
        assert_eq!(
            knob.step(-3).actions.as_slice(),
            &[release(ConsumerCmd::VolumeUp), press(ConsumerCmd::VolumeDown)]
        );
        assert_eq!(
            knob.step(4).actions.as_slice(),
            &[release(ConsumerCmd::VolumeDown), press(ConsumerCmd::VolumeUp)]
        );
    }

    #[test]
    fn position_message_carries_magnitude() {
        let mut knob = VolumeKnob::new();
        assert_eq!(knob.step(5).message, Frame::new(command::ROT_POS_POSITIVE, 5));
        assert_eq!(knob.step(-7).message, Frame::new(command::ROT_POS_NEGATIVE, 7));
        assert_eq!(knob.step(0).message, Frame::new(command::ROT_POS_POSITIVE, 0));
        assert_eq!(knob.step(-400).message.data, u8::MAX);
    }

    #[test]
    fn delay_has_a_floor() {
        let mut knob = VolumeKnob::new();
        assert_eq!(knob.step(0).delay_ms, 10);
        assert_eq!(knob.step(3).delay_ms, 10);
        assert_eq!(knob.step(25).delay_ms, 25);
        assert_eq!(knob.step(-40).delay_ms, 40);
    }
}
