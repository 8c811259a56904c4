//! Infrastructure layer for the endpoint.
//!
//! Contains the OS-facing adapters: the TCP session, frame sources, GPIO pin
//! drivers, and configuration loading.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rover_core`, but MUST NOT be imported by the `application` layer outside
//! of tests.
//!
//! # Sub-modules
//!
//! - **`network`** – Frame reading from any `AsyncRead`, the write-locked
//!   `FrameWriter`, and the `Session` that runs the command and capture loops.
//!
//! - **`frame_source`** – Colour reordering and PNG encoding helpers, plus a
//!   synthetic `MockFrameSource` used by tests and bench runs.
//!
//! - **`pin_driver`** – An in-memory `MockPinDriver` and, on Linux, a sysfs
//!   GPIO driver.
//!
//! - **`storage`** – TOML configuration file loading and validation.

pub mod frame_source;
pub mod network;
pub mod pin_driver;
pub mod storage;
