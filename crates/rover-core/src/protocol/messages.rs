//! All Rover Link protocol message types.
//!
//! Every message travels as a frame: a 1-byte kind, a 4-byte big-endian
//! payload length, and then exactly that many payload bytes.  Payload-less
//! kinds (`Hello`, `GetCameraList`, `Stop`) carry a length of zero and no
//! payload bytes at all.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Total size of the frame header in bytes: kind (1) + payload length (4).
pub const HEADER_SIZE: usize = 5;

/// Fixed portion of a `SendImage` payload before the image bytes:
/// camera id (1) + encoded flag (1) + channels (2) + width (2) + height (2).
pub const SEND_IMAGE_PREFIX_SIZE: usize = 8;

// ── Message kind codes ────────────────────────────────────────────────────────

/// All message kind codes understood by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0x01,
    CaptureImage = 0x02,
    SendImage = 0x03,
    GetCameraList = 0x04,
    SendCameraList = 0x05,
    Move = 0x06,
    GetCameraProp = 0x07,
    SendCameraProp = 0x08,
    SetCameraProp = 0x09,
    Stop = 0x0A,
}

impl MessageType {
    /// Every kind, in wire order.
    pub const ALL: [MessageType; 10] = [
        MessageType::Hello,
        MessageType::CaptureImage,
        MessageType::SendImage,
        MessageType::GetCameraList,
        MessageType::SendCameraList,
        MessageType::Move,
        MessageType::GetCameraProp,
        MessageType::SendCameraProp,
        MessageType::SetCameraProp,
        MessageType::Stop,
    ];
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::Hello),
            0x02 => Ok(MessageType::CaptureImage),
            0x03 => Ok(MessageType::SendImage),
            0x04 => Ok(MessageType::GetCameraList),
            0x05 => Ok(MessageType::SendCameraList),
            0x06 => Ok(MessageType::Move),
            0x07 => Ok(MessageType::GetCameraProp),
            0x08 => Ok(MessageType::SendCameraProp),
            0x09 => Ok(MessageType::SetCameraProp),
            0x0A => Ok(MessageType::Stop),
            _ => Err(()),
        }
    }
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// A camera resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

impl Resolution {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

/// CAPTURE_IMAGE (0x02): controller asks for one frame from a camera.
///
/// A non-zero `width`/`height` asks the endpoint to switch the camera to that
/// resolution before capturing; zero keeps the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureImageMessage {
    pub camera_id: u8,
    pub width: u16,
    pub height: u16,
}

/// SEND_IMAGE (0x03): one captured frame, either as a reply to
/// `CaptureImage` or pushed unsolicited by the streaming loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendImageMessage {
    pub camera_id: u8,
    /// `true` when `data` is a self-describing encoded image (PNG),
    /// `false` when it is raw interleaved RGB pixels.
    pub encoded: bool,
    pub channels: u16,
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

impl SendImageMessage {
    /// An image message with no pixels, returned when a capture fails.
    pub fn empty(camera_id: u8) -> Self {
        Self {
            camera_id,
            encoded: false,
            channels: 0,
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }
}

/// SEND_CAMERA_LIST (0x05): ids of every open camera, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendCameraListMessage {
    pub camera_ids: Vec<u8>,
}

/// MOVE (0x06): wheel enablement and direction.
///
/// A zero speed disables a wheel; any non-zero speed enables it.  A zero
/// direction byte means "backward".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveMessage {
    pub left_speed: u8,
    pub left_dir: u8,
    pub right_speed: u8,
    pub right_dir: u8,
}

/// GET_CAMERA_PROP (0x07): asks for the resolutions a camera supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCameraPropMessage {
    pub camera_id: u8,
}

/// SEND_CAMERA_PROP (0x08): supported resolutions of one camera.
///
/// On the wire the list is a 2-byte component count followed by alternating
/// width and height values, so the count is always twice the number of
/// resolutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCameraPropMessage {
    pub camera_id: u8,
    pub resolutions: Vec<Resolution>,
}

/// SET_CAMERA_PROP (0x09): reconfigures a camera.
///
/// Zero-valued `width`, `height`, or `fps` mean "leave unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCameraPropMessage {
    pub camera_id: u8,
    pub width: u16,
    pub height: u16,
    pub fps: u8,
    pub do_encode: bool,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// The top-level protocol message enum.
///
/// Each variant corresponds to exactly one [`MessageType`] code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoverMessage {
    Hello,
    CaptureImage(CaptureImageMessage),
    SendImage(SendImageMessage),
    GetCameraList,
    SendCameraList(SendCameraListMessage),
    Move(MoveMessage),
    GetCameraProp(GetCameraPropMessage),
    SendCameraProp(SendCameraPropMessage),
    SetCameraProp(SetCameraPropMessage),
    Stop,
}

impl RoverMessage {
    /// Returns the [`MessageType`] code for this message variant.
    pub fn message_type(&self) -> MessageType {
        match self {
            RoverMessage::Hello => MessageType::Hello,
            RoverMessage::CaptureImage(_) => MessageType::CaptureImage,
            RoverMessage::SendImage(_) => MessageType::SendImage,
            RoverMessage::GetCameraList => MessageType::GetCameraList,
            RoverMessage::SendCameraList(_) => MessageType::SendCameraList,
            RoverMessage::Move(_) => MessageType::Move,
            RoverMessage::GetCameraProp(_) => MessageType::GetCameraProp,
            RoverMessage::SendCameraProp(_) => MessageType::SendCameraProp,
            RoverMessage::SetCameraProp(_) => MessageType::SetCameraProp,
            RoverMessage::Stop => MessageType::Stop,
        }
    }
}
