//! In-memory pin driver for unit tests and bench runs.
//!
//! # Why a recording driver?
//!
//! Real GPIO writes need a board with the motors attached and cannot be
//! observed from test code.  `RecordingPinDriver` records every call instead,
//! so assertions can check exactly which rows the stepping thread emitted and
//! in what order.
//!
//! Clones share one log.  Keep a clone in the test and hand the other to the
//! `ChassisController`:
//!
//! ```ignore
//! let driver = RecordingPinDriver::new();
//! let chassis = ChassisController::new(Box::new(driver.clone()), settings);
//! chassis.start().unwrap();
//! chassis.stop().unwrap();
//! assert_eq!(driver.release_count(), 1);
//! ```
//!
//! The stepping thread writes once per tick, so the write history is capped
//! at [`WRITE_HISTORY_LIMIT`] entries; older entries are dropped first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::application::drive_chassis::{PinDriver, PinError, PinMode};

/// Maximum number of writes kept in the history.
pub const WRITE_HISTORY_LIMIT: usize = 8192;

#[derive(Debug, Default)]
struct PinLog {
    configured: Vec<(Vec<u8>, PinMode)>,
    writes: VecDeque<(Vec<u8>, Vec<u8>)>,
    write_count: usize,
    released: usize,
}

/// A pin driver that records calls without touching hardware.
#[derive(Debug, Default, Clone)]
pub struct RecordingPinDriver {
    log: Arc<Mutex<PinLog>>,
    /// When `true`, every method returns `PinError::Pin` without recording.
    pub should_fail: bool,
}

impl RecordingPinDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn log(&self) -> MutexGuard<'_, PinLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, pins: &[u8]) -> Result<(), PinError> {
        if self.should_fail {
            Err(PinError::Pin {
                pin: pins.first().copied().unwrap_or(0),
                reason: "mock failure".into(),
            })
        } else {
            Ok(())
        }
    }

    /// Every `configure` call, oldest first.
    pub fn configured(&self) -> Vec<(Vec<u8>, PinMode)> {
        self.log().configured.clone()
    }

    /// The retained `write` history, oldest first.
    pub fn writes(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.log().writes.iter().cloned().collect()
    }

    /// Total `write` calls, including those dropped from the history.
    pub fn write_count(&self) -> usize {
        self.log().write_count
    }

    /// The most recent value written to `pin`, if any.
    pub fn level(&self, pin: u8) -> Option<u8> {
        self.log().writes.iter().rev().find_map(|(pins, values)| {
            pins.iter().position(|&p| p == pin).map(|i| values[i])
        })
    }

    pub fn release_count(&self) -> usize {
        self.log().released
    }
}

impl PinDriver for RecordingPinDriver {
    fn configure(&mut self, pins: &[u8], mode: PinMode) -> Result<(), PinError> {
        self.fail(pins)?;
        self.log().configured.push((pins.to_vec(), mode));
        Ok(())
    }

    fn write(&mut self, pins: &[u8], values: &[u8]) -> Result<(), PinError> {
        self.fail(pins)?;
        if pins.len() != values.len() {
            return Err(PinError::LengthMismatch {
                pins: pins.len(),
                values: values.len(),
            });
        }
        let mut log = self.log();
        if log.writes.len() == WRITE_HISTORY_LIMIT {
            log.writes.pop_front();
        }
        log.writes.push_back((pins.to_vec(), values.to_vec()));
        log.write_count += 1;
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), PinError> {
        self.fail(&[])?;
        self.log().released += 1;
        Ok(())
    }
}
