//! Key matrix scanning.
//!
//! Three driven columns, three sensed rows. A key at column `c`, row `r`
//! sets bit `1 + 3c + r` of the scan status; the encoder push switch sets
//! bit 10. Bit 0 is unused.

use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use crate::error::Error;
use crate::hid::keyboard::key;

pub const COLS: usize = 3;
pub const ROWS: usize = 3;

/// Status bit of the encoder push switch.
pub const SWITCH_BIT: u16 = 1 << 10;

/// Usages reported for matrix bits 1..=9.
const KEYMAP: [u8; COLS * ROWS] = [
    key::KEY_1,
    key::KEY_2,
    key::KEY_3,
    key::KEY_4,
    key::KEY_5,
    key::KEY_6,
    key::KEY_7,
    key::KEY_8,
    key::KEY_9,
];

/// Status bit for the key at `col`, `row`.
pub const fn key_bit(col: usize, row: usize) -> u16 {
    1 << (1 + col * ROWS + row)
}

pub struct ButtonMatrix<C, R, S> {
    cols: [C; COLS],
    rows: [R; ROWS],
    switch: S,
}

impl<C: OutputPin, R: InputPin, S: InputPin> ButtonMatrix<C, R, S> {
    pub fn new(cols: [C; COLS], rows: [R; ROWS], switch: S) -> Self {
        Self { cols, rows, switch }
    }

    /// Drive each column high in turn and sample the rows.
    pub fn scan(&mut self) -> Result<u16, Error> {
        let mut status = 0u16;
        for (c, col) in self.cols.iter_mut().enumerate() {
            col.set_high().map_err(|_| Error::Gpio)?;
            for (r, row) in self.rows.iter_mut().enumerate() {
                if row.is_high().map_err(|_| Error::Gpio)? {
                    status |= key_bit(c, r);
                }
            }
            col.set_low().map_err(|_| Error::Gpio)?;
        }
        if self.switch.is_high().map_err(|_| Error::Gpio)? {
            status |= SWITCH_BIT;
        }
        Ok(status)
    }

    /// Column pins, for reconfiguring them when the keyboard mode changes.
    pub fn columns_mut(&mut self) -> &mut [C; COLS] {
        &mut self.cols
    }
}

/// Key usages for the matrix bits set in `status`, in bit order.
pub fn pressed_keys(status: u16) -> Vec<u8, { COLS * ROWS }> {
    let mut keys = Vec::new();
    for (i, &usage) in KEYMAP.iter().enumerate() {
        if status & (1 << (i + 1)) != 0 {
            trace!("button {} pressed", i + 1);
            // Capacity equals KEYMAP length.
            let _ = keys.push(usage);
        }
    }
    keys
}

/// Press/release edge detector for a single status bit.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeLatch {
    held: bool,
}

impl EdgeLatch {
    pub const fn new() -> Self {
        Self { held: false }
    }

    /// Returns `Some(true)` on press, `Some(false)` on release.
    pub fn update(&mut self, pressed: bool) -> Option<bool> {
        if pressed == self.held {
            return None;
        }
        self.held = pressed;
        Some(pressed)
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Shared fake wiring: which column is driven and which keys are down.
    struct Board {
        driven: Cell<Option<usize>>,
        down: Cell<u16>,
        switch: Cell<bool>,
    }

    struct Col<'a>(&'a Board, usize);
    struct Row<'a>(&'a Board, usize);
    struct Switch<'a>(&'a Board);

    impl ErrorType for Col<'_> {
        type Error = Infallible;
    }
    impl ErrorType for Row<'_> {
        type Error = Infallible;
    }
    impl ErrorType for Switch<'_> {
        type Error = Infallible;
    }

    impl OutputPin for Col<'_> {
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.driven.set(Some(self.1));
            Ok(())
        }
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.driven.set(None);
            Ok(())
        }
    }

    impl InputPin for Row<'_> {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(match self.0.driven.get() {
                Some(c) => self.0.down.get() & key_bit(c, self.1) != 0,
                None => false,
            })
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|h| !h)
        }
    }

    impl InputPin for Switch<'_> {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.switch.get())
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.switch.get())
        }
    }

    fn board() -> Board {
        Board {
            driven: Cell::new(None),
            down: Cell::new(0),
            switch: Cell::new(false),
        }
    }

    fn matrix(b: &Board) -> ButtonMatrix<Col<'_>, Row<'_>, Switch<'_>> {
        ButtonMatrix::new(
            [Col(b, 0), Col(b, 1), Col(b, 2)],
            [Row(b, 0), Row(b, 1), Row(b, 2)],
            Switch(b),
        )
    }

    #[test]
    fn every_key_has_its_own_bit() {
        let b = board();
        let mut m = matrix(&b);
        let mut seen = 0u16;
        for c in 0..COLS {
            for r in 0..ROWS {
                b.down.set(key_bit(c, r));
                let status = m.scan().unwrap();
                assert_eq!(status, 1 << (1 + 3 * c + r));
                assert_eq!(seen & status, 0);
                seen |= status;
            }
        }
        assert_eq!(seen, 0b11_1111_1110);
    }

    #[test]
    fn columns_released_after_scan() {
        let b = board();
        let mut m = matrix(&b);
        b.down.set(key_bit(2, 2));
        m.scan().unwrap();
        assert_eq!(b.driven.get(), None);
    }

    #[test]
    fn switch_sets_bit_ten() {
        let b = board();
        let mut m = matrix(&b);
        b.switch.set(true);
        assert_eq!(m.scan().unwrap(), SWITCH_BIT);
    }

    #[test]
    fn pressed_keys_in_bit_order() {
        let status = key_bit(0, 0) | key_bit(1, 2) | key_bit(2, 2) | SWITCH_BIT;
        assert_eq!(
            pressed_keys(status).as_slice(),
            &[key::KEY_1, key::KEY_6, key::KEY_9]
        );
        assert!(pressed_keys(0).is_empty());
        assert_eq!(pressed_keys(0x3FE).len(), 9);
    }

    #[test]
    fn edge_latch_reports_transitions_once() {
        let mut latch = EdgeLatch::new();
        assert_eq!(latch.update(false), None);
        assert_eq!(latch.update(true), Some(true));
        assert_eq!(latch.update(true), None);
        assert!(latch.is_held());
        assert_eq!(latch.update(false), Some(false));
        assert_eq!(latch.update(false), None);
    }
}
