//! rover-endpoint library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rover-endpoint do? (for beginners)
//!
//! The *endpoint* is the program running on the robot itself.  It:
//!
//! 1. Connects to the controller over TCP and completes the `Hello`/`Hello`
//!    handshake.
//! 2. Answers commands: enumerate cameras, report and change camera
//!    resolutions, capture a single image, move the wheels, stop.
//! 3. Streams an unsolicited `SendImage` frame for every open camera at that
//!    camera's frame rate, over the same socket, without ever interleaving two
//!    frames' bytes.
//! 4. Runs a dedicated stepping thread that drives the two stepper motors
//!    through their half-step tables while their wheels are enabled.
//!
//! Cameras and GPIO pins are reached through two small traits
//! ([`application::manage_devices::FrameSource`] and
//! [`application::drive_chassis::PinDriver`]), so the whole endpoint can run
//! against in-memory mocks on a development machine.

/// Application layer: dispatch, device registry, chassis controller.
pub mod application;

/// Infrastructure layer: network session, frame sources, pin drivers, config.
pub mod infrastructure;
