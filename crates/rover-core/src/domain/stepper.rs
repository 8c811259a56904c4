//! Half-step sequencing for the chassis' two 4-wire stepper motors.
//!
//! # How does a half-step sequence work? (for beginners)
//!
//! A unipolar stepper motor has four coils.  Energising them in a fixed
//! rotating pattern pulls the rotor around one small step at a time.  The
//! *half-step* pattern alternates between one coil and two adjacent coils,
//! which doubles the resolution compared to energising one coil at a time:
//!
//! ```text
//! row  A B C D
//!  0   1 0 0 0
//!  1   1 1 0 0
//!  2   0 1 0 0
//!  3   0 1 1 0
//!  4   0 0 1 0
//!  5   0 0 1 1
//!  6   0 0 0 1
//!  7   1 0 0 1
//! ```
//!
//! The two wheels are mounted facing each other, so for the robot to drive
//! straight the left motor must turn the opposite way.  The left table is
//! therefore the right table reversed.

use serde::{Deserialize, Serialize};

/// Number of rows in a half-step table.
pub const HALFSTEP_ROWS: usize = 8;

/// Number of control wires per motor.
pub const PINS_PER_WHEEL: usize = 4;

/// One row of pin values, in control-pin order.
pub type PinRow = [u8; PINS_PER_WHEEL];

/// The row emitted by a disabled wheel.
pub const ALL_LOW: PinRow = [0, 0, 0, 0];

/// Half-step table for the right wheel.
pub const RIGHT_HALFSTEP_SEQUENCE: [PinRow; HALFSTEP_ROWS] = [
    [1, 0, 0, 0],
    [1, 1, 0, 0],
    [0, 1, 0, 0],
    [0, 1, 1, 0],
    [0, 0, 1, 0],
    [0, 0, 1, 1],
    [0, 0, 0, 1],
    [1, 0, 0, 1],
];

/// Half-step table for the left wheel: the right table in reverse order.
pub const LEFT_HALFSTEP_SEQUENCE: [PinRow; HALFSTEP_ROWS] = reversed(RIGHT_HALFSTEP_SEQUENCE);

const fn reversed(table: [PinRow; HALFSTEP_ROWS]) -> [PinRow; HALFSTEP_ROWS] {
    let mut out = [ALL_LOW; HALFSTEP_ROWS];
    let mut i = 0;
    while i < HALFSTEP_ROWS {
        out[i] = table[HALFSTEP_ROWS - 1 - i];
        i += 1;
    }
    out
}

/// Which side of the chassis a wheel is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The half-step table that drives this side forward.
    pub fn halfstep_table(self) -> &'static [PinRow; HALFSTEP_ROWS] {
        match self {
            Side::Left => &LEFT_HALFSTEP_SEQUENCE,
            Side::Right => &RIGHT_HALFSTEP_SEQUENCE,
        }
    }
}

/// Stepping state of one wheel.
///
/// `step_index` only moves while the wheel is enabled and never resets
/// except by wrapping from 7 back to 0, so a wheel that is paused and resumed
/// continues from the coil pattern it stopped on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelState {
    side: Side,
    enabled: bool,
    step_index: usize,
}

impl WheelState {
    /// A disabled wheel at step 0.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            enabled: false,
            step_index: 0,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns the row to emit for this tick and advances the index.
    ///
    /// An enabled wheel emits `table[step_index]` and then moves to the next
    /// row modulo 8.  A disabled wheel emits [`ALL_LOW`] and stays put.
    pub fn tick(&mut self) -> PinRow {
        if !self.enabled {
            return ALL_LOW;
        }
        let row = self.side.halfstep_table()[self.step_index];
        self.step_index = (self.step_index + 1) % HALFSTEP_ROWS;
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_table_is_right_table_reversed() {
        let mut expected = RIGHT_HALFSTEP_SEQUENCE;
        expected.reverse();
        assert_eq!(LEFT_HALFSTEP_SEQUENCE, expected);
        assert_eq!(LEFT_HALFSTEP_SEQUENCE[0], [1, 0, 0, 1]);
    }

    #[test]
    fn test_new_wheel_is_disabled_at_step_zero() {
        let wheel = WheelState::new(Side::Right);
        assert!(!wheel.is_enabled());
        assert_eq!(wheel.step_index(), 0);
    }

    #[test]
    fn test_enabled_wheel_walks_the_table_and_wraps() {
        // Arrange
        let mut wheel = WheelState::new(Side::Right);
        wheel.set_enabled(true);

        // Act
        let rows: Vec<PinRow> = (0..HALFSTEP_ROWS + 1).map(|_| wheel.tick()).collect();

        // Assert – eight rows in table order, then row 0 again
        assert_eq!(&rows[..HALFSTEP_ROWS], &RIGHT_HALFSTEP_SEQUENCE[..]);
        assert_eq!(rows[HALFSTEP_ROWS], RIGHT_HALFSTEP_SEQUENCE[0]);
        assert_eq!(wheel.step_index(), 1);
    }

    #[test]
    fn test_disabled_wheel_emits_all_low_and_holds_index() {
        let mut wheel = WheelState::new(Side::Left);
        wheel.set_enabled(true);
        wheel.tick();
        wheel.tick();
        wheel.set_enabled(false);

        for _ in 0..20 {
            assert_eq!(wheel.tick(), ALL_LOW);
        }
        assert_eq!(wheel.step_index(), 2);
    }

    #[test]
    fn test_resumed_wheel_continues_where_it_paused() {
        let mut wheel = WheelState::new(Side::Left);
        wheel.set_enabled(true);
        for _ in 0..3 {
            wheel.tick();
        }
        wheel.set_enabled(false);
        wheel.tick();
        wheel.set_enabled(true);

        assert_eq!(wheel.tick(), LEFT_HALFSTEP_SEQUENCE[3]);
    }

    #[test]
    fn test_every_row_energises_at_least_one_coil() {
        for row in RIGHT_HALFSTEP_SEQUENCE {
            assert!(row.iter().any(|&v| v == 1));
        }
    }
}
