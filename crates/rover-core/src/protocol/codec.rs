//! Binary codec for encoding and decoding Rover Link protocol messages.
//!
//! Wire format:
//! ```text
//! [kind:1][payload_len:4][payload:N]
//! ```
//! Total header size: 5 bytes. All multi-byte integers are big-endian.
//!
//! The codec works on byte slices only.  Reading frames off a socket (and
//! turning a short read into an error) is the job of the endpoint's network
//! layer, which reads the 5-byte header, then exactly `payload_len` bytes, and
//! hands both to the functions below.

use crate::protocol::messages::{
    CaptureImageMessage, GetCameraPropMessage, MessageType, MoveMessage, Resolution, RoverMessage,
    SendCameraListMessage, SendCameraPropMessage, SendImageMessage, SetCameraPropMessage,
    HEADER_SIZE, SEND_IMAGE_PREFIX_SIZE,
};
use thiserror::Error;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The kind byte in the header is not a recognized value.
    #[error("unknown message kind: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The payload could not be parsed or cannot be represented on the wire.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The header's payload length does not match the bytes available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The peer closed the stream part-way through a frame.
    #[error("stream closed mid-frame: needed {needed} bytes, received {received}")]
    Truncated { needed: usize, received: usize },
}

/// The decoded 5-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw kind byte.  Kept as `u8` so unknown kinds can still be skipped.
    pub kind: u8,
    /// Number of payload bytes that follow the header.
    pub payload_len: u32,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Frames an already-encoded payload: `1 + 4 + payload.len()` bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload is longer than
/// a `u32` length field can describe.
pub fn encode_frame(kind: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!("payload of {} bytes exceeds u32", payload.len()))
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(kind);
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encodes a [`RoverMessage`] into a byte vector including the 5-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if a count field cannot hold
/// the collection size (more than 255 camera ids, more than 65535 resolution
/// components).
///
/// # Examples
///
/// ```rust
/// use rover_core::protocol::{encode_message, decode_message};
/// use rover_core::RoverMessage;
///
/// let bytes = encode_message(&RoverMessage::Hello).unwrap();
/// assert_eq!(bytes, [0x01, 0, 0, 0, 0]);
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, RoverMessage::Hello);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &RoverMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    encode_frame(msg.message_type() as u8, &payload)
}

/// Decodes the 5-byte frame header at the start of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if fewer than 5 bytes are given.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    Ok(FrameHeader {
        kind: bytes[0],
        payload_len: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
    })
}

/// Decodes one [`RoverMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed, the kind is unknown,
/// or fewer payload bytes are present than the header declares.
pub fn decode_message(bytes: &[u8]) -> Result<(RoverMessage, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let kind = MessageType::try_from(header.kind)
        .map_err(|_| ProtocolError::UnknownMessageType(header.kind))?;

    let payload_len = header.payload_len as usize;
    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let msg = decode_payload(kind, &bytes[HEADER_SIZE..total_needed])?;
    Ok((msg, total_needed))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &RoverMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        RoverMessage::Hello | RoverMessage::GetCameraList | RoverMessage::Stop => {}
        RoverMessage::CaptureImage(m) => encode_capture_image(&mut buf, m),
        RoverMessage::SendImage(m) => encode_send_image(&mut buf, m),
        RoverMessage::SendCameraList(m) => encode_send_camera_list(&mut buf, m)?,
        RoverMessage::Move(m) => encode_move(&mut buf, m),
        RoverMessage::GetCameraProp(m) => buf.push(m.camera_id),
        RoverMessage::SendCameraProp(m) => encode_send_camera_prop(&mut buf, m)?,
        RoverMessage::SetCameraProp(m) => encode_set_camera_prop(&mut buf, m),
    }
    Ok(buf)
}

// ── Payload decoding ──────────────────────────────────────────────────────────

/// Decodes the payload of a frame whose kind has already been resolved.
///
/// Payload-less kinds ignore any trailing bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the payload is too short
/// for the kind's fixed layout or its counts do not add up.
pub fn decode_payload(kind: MessageType, payload: &[u8]) -> Result<RoverMessage, ProtocolError> {
    match kind {
        MessageType::Hello => Ok(RoverMessage::Hello),
        MessageType::GetCameraList => Ok(RoverMessage::GetCameraList),
        MessageType::Stop => Ok(RoverMessage::Stop),
        MessageType::CaptureImage => decode_capture_image(payload).map(RoverMessage::CaptureImage),
        MessageType::SendImage => decode_send_image(payload).map(RoverMessage::SendImage),
        MessageType::SendCameraList => {
            decode_send_camera_list(payload).map(RoverMessage::SendCameraList)
        }
        MessageType::Move => decode_move(payload).map(RoverMessage::Move),
        MessageType::GetCameraProp => {
            require_len(payload, 1, "GetCameraProp")?;
            Ok(RoverMessage::GetCameraProp(GetCameraPropMessage {
                camera_id: payload[0],
            }))
        }
        MessageType::SendCameraProp => {
            decode_send_camera_prop(payload).map(RoverMessage::SendCameraProp)
        }
        MessageType::SetCameraProp => decode_set_camera_prop(payload).map(RoverMessage::SetCameraProp),
    }
}

// ── Per-message encode helpers ────────────────────────────────────────────────

fn encode_capture_image(buf: &mut Vec<u8>, m: &CaptureImageMessage) {
    buf.push(m.camera_id);
    buf.extend_from_slice(&m.width.to_be_bytes());
    buf.extend_from_slice(&m.height.to_be_bytes());
}

fn encode_send_image(buf: &mut Vec<u8>, m: &SendImageMessage) {
    buf.reserve(SEND_IMAGE_PREFIX_SIZE + m.data.len());
    buf.push(m.camera_id);
    buf.push(if m.encoded { 0x01 } else { 0x00 });
    buf.extend_from_slice(&m.channels.to_be_bytes());
    buf.extend_from_slice(&m.width.to_be_bytes());
    buf.extend_from_slice(&m.height.to_be_bytes());
    buf.extend_from_slice(&m.data);
}

fn encode_send_camera_list(buf: &mut Vec<u8>, m: &SendCameraListMessage) -> Result<(), ProtocolError> {
    let count = u8::try_from(m.camera_ids.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!(
            "camera list of {} ids exceeds the 1-byte count",
            m.camera_ids.len()
        ))
    })?;
    buf.push(count);
    buf.extend_from_slice(&m.camera_ids);
    Ok(())
}

fn encode_move(buf: &mut Vec<u8>, m: &MoveMessage) {
    buf.extend_from_slice(&[m.left_speed, m.left_dir, m.right_speed, m.right_dir]);
}

fn encode_send_camera_prop(buf: &mut Vec<u8>, m: &SendCameraPropMessage) -> Result<(), ProtocolError> {
    let components = u16::try_from(m.resolutions.len() * 2).map_err(|_| {
        ProtocolError::MalformedPayload(format!(
            "{} resolutions exceed the 2-byte component count",
            m.resolutions.len()
        ))
    })?;
    buf.push(m.camera_id);
    buf.extend_from_slice(&components.to_be_bytes());
    for res in &m.resolutions {
        buf.extend_from_slice(&res.width.to_be_bytes());
        buf.extend_from_slice(&res.height.to_be_bytes());
    }
    Ok(())
}

fn encode_set_camera_prop(buf: &mut Vec<u8>, m: &SetCameraPropMessage) {
    buf.push(m.camera_id);
    buf.extend_from_slice(&m.width.to_be_bytes());
    buf.extend_from_slice(&m.height.to_be_bytes());
    buf.push(m.fps);
    buf.push(if m.do_encode { 0x01 } else { 0x00 });
}

// ── Per-message decode helpers ────────────────────────────────────────────────

fn decode_capture_image(p: &[u8]) -> Result<CaptureImageMessage, ProtocolError> {
    // 1 (id) + 2 (width) + 2 (height) = 5
    require_len(p, 5, "CaptureImage")?;
    Ok(CaptureImageMessage {
        camera_id: p[0],
        width: read_u16(p, 1),
        height: read_u16(p, 3),
    })
}

fn decode_send_image(p: &[u8]) -> Result<SendImageMessage, ProtocolError> {
    require_len(p, SEND_IMAGE_PREFIX_SIZE, "SendImage")?;
    Ok(SendImageMessage {
        camera_id: p[0],
        encoded: p[1] != 0,
        channels: read_u16(p, 2),
        width: read_u16(p, 4),
        height: read_u16(p, 6),
        data: p[SEND_IMAGE_PREFIX_SIZE..].to_vec(),
    })
}

fn decode_send_camera_list(p: &[u8]) -> Result<SendCameraListMessage, ProtocolError> {
    require_len(p, 1, "SendCameraList")?;
    let count = p[0] as usize;
    require_len(p, 1 + count, "SendCameraList ids")?;
    Ok(SendCameraListMessage {
        camera_ids: p[1..1 + count].to_vec(),
    })
}

fn decode_move(p: &[u8]) -> Result<MoveMessage, ProtocolError> {
    require_len(p, 4, "Move")?;
    Ok(MoveMessage {
        left_speed: p[0],
        left_dir: p[1],
        right_speed: p[2],
        right_dir: p[3],
    })
}

fn decode_send_camera_prop(p: &[u8]) -> Result<SendCameraPropMessage, ProtocolError> {
    // 1 (id) + 2 (component count)
    require_len(p, 3, "SendCameraProp")?;
    let camera_id = p[0];
    let components = read_u16(p, 1) as usize;
    if components % 2 != 0 {
        return Err(ProtocolError::MalformedPayload(format!(
            "SendCameraProp: odd component count {components}"
        )));
    }
    require_len(p, 3 + components * 2, "SendCameraProp components")?;
    let resolutions = p[3..3 + components * 2]
        .chunks_exact(4)
        .map(|c| Resolution::new(u16::from_be_bytes([c[0], c[1]]), u16::from_be_bytes([c[2], c[3]])))
        .collect();
    Ok(SendCameraPropMessage {
        camera_id,
        resolutions,
    })
}

fn decode_set_camera_prop(p: &[u8]) -> Result<SetCameraPropMessage, ProtocolError> {
    // 1 (id) + 2 (width) + 2 (height) + 1 (fps) + 1 (encode) = 7
    require_len(p, 7, "SetCameraProp")?;
    Ok(SetCameraPropMessage {
        camera_id: p[0],
        width: read_u16(p, 1),
        height: read_u16(p, 3),
        fps: p[5],
        do_encode: p[6] != 0,
    })
}

// ── Low-level read helpers ────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

/// Callers must have checked the length with [`require_len`] first.
fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
