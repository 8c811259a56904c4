//! ChassisController: the two stepper wheels and the thread that steps them.
//!
//! # How the wheels move (for beginners)
//!
//! Each wheel is a four-wire stepper motor.  Energising the wires in the order
//! given by `rover_core::domain::stepper` moves the rotor one half-step per
//! row.  The endpoint does not schedule individual steps: a dedicated OS
//! thread wakes every tick (1 ms by default), asks each wheel for its next
//! pin row, and writes all eight pins in one call.
//!
//! `Move` commands never touch the pins directly.  They flip the atomics in
//! [`WheelFlags`], and the stepping thread picks the change up on its next
//! tick:
//!
//! ```text
//! session ── apply_move ──► WheelFlags (atomics) ◄── reads ── stepping thread
//!                                                              │
//!                                                    PinDriver::write(8 pins)
//! ```
//!
//! Direction is recorded in the flags but the stepping order is not reversed.
//!
//! The stepper is handed to the thread on `start` and handed back on `stop`,
//! so each wheel resumes from the row it stopped on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rover_core::domain::stepper::{PinRow, Side, WheelState, PINS_PER_WHEEL};
use rover_core::protocol::messages::MoveMessage;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Number of pins written per tick.
pub const CHASSIS_PINS: usize = 2 * PINS_PER_WHEEL;

// ── Pin driver port ───────────────────────────────────────────────────────────

/// Direction a GPIO pin is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output,
    Input,
}

/// Error type for GPIO access.
#[derive(Debug, Error)]
pub enum PinError {
    #[error("pin {pin}: {reason}")]
    Pin { pin: u8, reason: String },

    #[error("{pins} pins but {values} values")]
    LengthMismatch { pins: usize, values: usize },

    #[error("GPIO I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Low-level GPIO access.
///
/// `write` sets `pins[i]` to `values[i]` (0 = low, anything else = high).
#[cfg_attr(test, mockall::automock)]
pub trait PinDriver: Send {
    fn configure(&mut self, pins: &[u8], mode: PinMode) -> Result<(), PinError>;
    fn write(&mut self, pins: &[u8], values: &[u8]) -> Result<(), PinError>;
    /// Drives every pin this driver configured low and releases it.
    fn release_all(&mut self) -> Result<(), PinError>;
}

/// Error type for chassis lifecycle operations.
#[derive(Debug, Error)]
pub enum ChassisError {
    #[error("the stepping thread is already running")]
    AlreadyRunning,

    #[error("failed to spawn the stepping thread: {0}")]
    Spawn(std::io::Error),

    #[error("the stepping thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Pin(#[from] PinError),
}

// ── Shared flags ──────────────────────────────────────────────────────────────

/// On/off and direction per wheel, written by the session and read by the
/// stepping thread.
#[derive(Debug, Default)]
pub struct WheelFlags {
    left_enabled: AtomicBool,
    right_enabled: AtomicBool,
    left_backward: AtomicBool,
    right_backward: AtomicBool,
}

impl WheelFlags {
    fn enabled_flag(&self, side: Side) -> &AtomicBool {
        match side {
            Side::Left => &self.left_enabled,
            Side::Right => &self.right_enabled,
        }
    }

    fn backward_flag(&self, side: Side) -> &AtomicBool {
        match side {
            Side::Left => &self.left_backward,
            Side::Right => &self.right_backward,
        }
    }

    pub fn set(&self, side: Side, enabled: bool, backward: bool) {
        self.backward_flag(side).store(backward, Ordering::Release);
        self.enabled_flag(side).store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self, side: Side) -> bool {
        self.enabled_flag(side).load(Ordering::Acquire)
    }

    pub fn is_backward(&self, side: Side) -> bool {
        self.backward_flag(side).load(Ordering::Acquire)
    }
}

// ── Stepper ───────────────────────────────────────────────────────────────────

/// Both wheels' stepping state plus the pin layout.  Owned by the stepping
/// thread.
#[derive(Debug, Clone)]
pub struct Stepper {
    left: WheelState,
    right: WheelState,
    pins: [u8; CHASSIS_PINS],
}

impl Stepper {
    pub fn new(left_pins: [u8; PINS_PER_WHEEL], right_pins: [u8; PINS_PER_WHEEL]) -> Self {
        let mut pins = [0; CHASSIS_PINS];
        pins[..PINS_PER_WHEEL].copy_from_slice(&left_pins);
        pins[PINS_PER_WHEEL..].copy_from_slice(&right_pins);
        Self {
            left: WheelState::new(Side::Left),
            right: WheelState::new(Side::Right),
            pins,
        }
    }

    /// Left pins followed by right pins.
    pub fn pins(&self) -> &[u8; CHASSIS_PINS] {
        &self.pins
    }

    pub fn wheel(&self, side: Side) -> &WheelState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Syncs both wheels with `flags` and returns the eight pin values for
    /// this tick, in [`pins`](Self::pins) order.
    pub fn tick(&mut self, flags: &WheelFlags) -> [u8; CHASSIS_PINS] {
        self.left.set_enabled(flags.is_enabled(Side::Left));
        self.right.set_enabled(flags.is_enabled(Side::Right));

        let left: PinRow = self.left.tick();
        let right: PinRow = self.right.tick();

        let mut values = [0; CHASSIS_PINS];
        values[..PINS_PER_WHEEL].copy_from_slice(&left);
        values[PINS_PER_WHEEL..].copy_from_slice(&right);
        values
    }
}

// ── ChassisController ─────────────────────────────────────────────────────────

/// Pin layout and tick rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChassisSettings {
    pub left_pins: [u8; PINS_PER_WHEEL],
    pub right_pins: [u8; PINS_PER_WHEEL],
    pub tick_interval: Duration,
}

impl Default for ChassisSettings {
    fn default() -> Self {
        Self {
            left_pins: [3, 5, 7, 16],
            right_pins: [15, 19, 21, 23],
            tick_interval: Duration::from_millis(1),
        }
    }
}

type SharedDriver = Arc<Mutex<Box<dyn PinDriver>>>;

fn lock_driver(driver: &SharedDriver) -> MutexGuard<'_, Box<dyn PinDriver>> {
    driver.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the wheel flags, the pin driver, and the stepping thread.
pub struct ChassisController {
    settings: ChassisSettings,
    flags: Arc<WheelFlags>,
    stop: Arc<AtomicBool>,
    driver: SharedDriver,
    /// Parked while the thread is not running.
    stepper: Mutex<Stepper>,
    worker: Mutex<Option<JoinHandle<Stepper>>>,
}

impl ChassisController {
    /// Creates a controller with both wheels disabled.  No pin is touched
    /// until [`start`](Self::start).
    pub fn new(driver: Box<dyn PinDriver>, settings: ChassisSettings) -> Self {
        Self {
            settings,
            flags: Arc::new(WheelFlags::default()),
            stop: Arc::new(AtomicBool::new(false)),
            driver: Arc::new(Mutex::new(driver)),
            stepper: Mutex::new(Stepper::new(settings.left_pins, settings.right_pins)),
            worker: Mutex::new(None),
        }
    }

    /// Configures all eight pins as outputs, drives them low, and spawns the
    /// stepping thread.
    ///
    /// # Errors
    ///
    /// [`ChassisError::AlreadyRunning`] if the thread is alive, or any error
    /// from the pin driver or thread spawn.
    pub fn start(&self) -> Result<(), ChassisError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Err(ChassisError::AlreadyRunning);
        }

        let stepper = self.lock_stepper().clone();
        {
            let mut driver = lock_driver(&self.driver);
            driver.configure(stepper.pins(), PinMode::Output)?;
            driver.write(stepper.pins(), &[0; CHASSIS_PINS])?;
        }

        self.stop.store(false, Ordering::Release);
        let flags = Arc::clone(&self.flags);
        let stop = Arc::clone(&self.stop);
        let driver = Arc::clone(&self.driver);
        let interval = self.settings.tick_interval;

        let handle = thread::Builder::new()
            .name("chassis-stepper".into())
            .spawn(move || step_loop(stepper, &flags, &stop, &driver, interval))
            .map_err(ChassisError::Spawn)?;
        *worker = Some(handle);

        info!(
            "chassis started: left pins {:?}, right pins {:?}, tick {:?}",
            self.settings.left_pins, self.settings.right_pins, interval
        );
        Ok(())
    }

    /// Stops the stepping thread after its current tick, joins it, and
    /// releases every pin.  Does nothing when the thread is not running.
    pub fn stop(&self) -> Result<(), ChassisError> {
        let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Ok(());
        };

        self.stop.store(true, Ordering::Release);
        let joined = handle.join();
        lock_driver(&self.driver).release_all()?;
        info!("chassis stopped, pins released");

        *self.lock_stepper() = joined.map_err(|_| ChassisError::WorkerPanicked)?;
        Ok(())
    }

    /// Table row `side` emits on its next enabled tick.  Only meaningful
    /// while the thread is stopped.
    pub fn step_index(&self, side: Side) -> usize {
        self.lock_stepper().wheel(side).step_index()
    }

    fn lock_stepper(&self) -> MutexGuard<'_, Stepper> {
        self.stepper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enables a wheel when its speed is non-zero and records
    /// `backward = (dir == 0)`.
    pub fn apply_move(&self, command: &MoveMessage) {
        self.flags
            .set(Side::Left, command.left_speed != 0, command.left_dir == 0);
        self.flags
            .set(Side::Right, command.right_speed != 0, command.right_dir == 0);
        debug!(
            "move: left {} right {}",
            if command.left_speed != 0 { "on" } else { "off" },
            if command.right_speed != 0 { "on" } else { "off" },
        );
    }

    pub fn is_enabled(&self, side: Side) -> bool {
        self.flags.is_enabled(side)
    }

    pub fn is_backward(&self, side: Side) -> bool {
        self.flags.is_backward(side)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for ChassisController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("chassis shutdown: {e}");
        }
    }
}

fn step_loop(
    mut stepper: Stepper,
    flags: &WheelFlags,
    stop: &AtomicBool,
    driver: &SharedDriver,
    interval: Duration,
) -> Stepper {
    let mut next_tick = Instant::now();
    let mut failing = false;

    while !stop.load(Ordering::Acquire) {
        let values = stepper.tick(flags);
        match lock_driver(driver).write(stepper.pins(), &values) {
            Ok(()) if failing => {
                info!("pin writes recovered");
                failing = false;
            }
            Ok(()) => {}
            Err(e) if !failing => {
                warn!("pin write failed: {e}");
                failing = true;
            }
            Err(_) => {}
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            // Fell behind; do not try to catch up with a burst of ticks.
            next_tick = now;
        }
    }
    stepper
}

// ── Tests ─────────────────────────────────────────────────────────────────────
