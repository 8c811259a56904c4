//! # rover-core
//!
//! Shared library for Rover Link containing the wire protocol, the frame
//! codec, and the stepper-motor sequencing tables.
//!
//! This crate is used by the endpoint (the robot) and by anything that wants
//! to speak to it, such as a controller or a test harness.
//! It has zero dependencies on OS APIs, GPIO, cameras, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! Rover Link is a remote-controlled robot: a small board with a couple of
//! cameras and two stepper-driven wheels connects to a controller over TCP.
//! The controller asks for camera lists, configures cameras, and sends
//! movement commands; the robot answers and continuously streams images.
//!
//! This crate (`rover-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Every message is a
//!   5-byte header (1-byte kind, 4-byte big-endian length) followed by a
//!   kind-specific payload.
//!
//! - **`domain`** – Pure logic with no OS dependencies.  The most important
//!   piece is the half-step table and the per-wheel stepping state used by the
//!   chassis controller.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rover_core::RoverMessage` instead of `rover_core::protocol::messages::RoverMessage`.
pub use domain::stepper::{Side, WheelState, LEFT_HALFSTEP_SEQUENCE, RIGHT_HALFSTEP_SEQUENCE};
pub use protocol::codec::{
    decode_header, decode_message, decode_payload, encode_frame, encode_message, FrameHeader,
    ProtocolError,
};
pub use protocol::messages::{MessageType, Resolution, RoverMessage};
