//! Domain layer: pure logic with no OS or hardware dependencies.
//!
//! # What lives here?
//!
//! - **`stepper`** – the half-step tables for the two 4-wire stepper motors
//!   and [`stepper::WheelState`], which decides which pin row a wheel emits on
//!   every tick.  The endpoint's chassis controller owns the timing thread and
//!   the GPIO side; this module only answers "what comes next?".

pub mod stepper;
