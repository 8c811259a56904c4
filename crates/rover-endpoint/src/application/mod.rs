//! Application layer use cases for the endpoint.
//!
//! # What use cases does the endpoint have?
//!
//! - **`manage_devices`** – Owns every open camera.  Each camera sits behind
//!   its own lock so a property change on camera 0 never waits for a capture
//!   on camera 2.  The actual capture hardware is reached through the
//!   `FrameSource` trait injected at construction time.
//!
//! - **`drive_chassis`** – Owns the two stepper wheels and the thread that
//!   steps them.  GPIO output goes through the `PinDriver` trait.
//!
//! - **`dispatch`** – The static table that maps each inbound message kind to
//!   a handler, and the handlers themselves.

pub mod dispatch;
pub mod drive_chassis;
pub mod manage_devices;
