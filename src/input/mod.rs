//! Physical inputs: the 3x3 key matrix with the encoder push switch, and
//! the volume knob.

pub mod encoder;
pub mod matrix;

pub use encoder::{KnobAction, KnobStep, VolumeKnob};
pub use matrix::{pressed_keys, ButtonMatrix, EdgeLatch, SWITCH_BIT};
