//! GPIO pin driver implementations.
//!
//! The sysfs driver is compiled only on Linux via `#[cfg(target_os = ...)]`.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;
