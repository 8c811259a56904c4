//! Integration tests for the rover-core protocol codec.
//!
//! These tests verify complete round-trip encoding and decoding of every
//! message kind through the public API, plus the header/length contract on
//! concatenated frames.

use rover_core::{
    decode_header, decode_message,
    encode_message,
    protocol::messages::{
        CaptureImageMessage, GetCameraPropMessage, MoveMessage, SendCameraListMessage,
        SendCameraPropMessage, SendImageMessage, SetCameraPropMessage, HEADER_SIZE,
    },
    MessageType, ProtocolError, Resolution, RoverMessage,
};

/// Encodes a message and then decodes it, asserting that every byte is
/// consumed and the header length equals the payload size.
fn roundtrip(msg: RoverMessage) -> RoverMessage {
    let bytes = encode_message(&msg).expect("encode must succeed");
    let header = decode_header(&bytes).expect("header must decode");
    assert_eq!(header.payload_len as usize, bytes.len() - HEADER_SIZE);
    assert_eq!(header.kind, msg.message_type() as u8);
    let (decoded, consumed) = decode_message(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

fn one_of_each() -> Vec<RoverMessage> {
    vec![
        RoverMessage::Hello,
        RoverMessage::CaptureImage(CaptureImageMessage {
            camera_id: 0,
            width: 640,
            height: 480,
        }),
        RoverMessage::SendImage(SendImageMessage {
            camera_id: 2,
            encoded: true,
            channels: 3,
            width: 320,
            height: 240,
            data: vec![0x89, b'P', b'N', b'G'],
        }),
        RoverMessage::GetCameraList,
        RoverMessage::SendCameraList(SendCameraListMessage {
            camera_ids: vec![0, 2, 9],
        }),
        RoverMessage::Move(MoveMessage {
            left_speed: 255,
            left_dir: 0,
            right_speed: 1,
            right_dir: 1,
        }),
        RoverMessage::GetCameraProp(GetCameraPropMessage { camera_id: 7 }),
        RoverMessage::SendCameraProp(SendCameraPropMessage {
            camera_id: 7,
            resolutions: vec![Resolution::new(1920, 1080), Resolution::new(u16::MAX, 0)],
        }),
        RoverMessage::SetCameraProp(SetCameraPropMessage {
            camera_id: 1,
            width: 0,
            height: 0,
            fps: 255,
            do_encode: false,
        }),
        RoverMessage::Stop,
    ]
}

#[test]
fn test_roundtrip_every_message_kind() {
    let messages = one_of_each();
    assert_eq!(messages.len(), MessageType::ALL.len());

    for original in messages {
        assert_eq!(roundtrip(original.clone()), original);
    }
}

#[test]
fn test_roundtrip_empty_collections() {
    let list = RoverMessage::SendCameraList(SendCameraListMessage::default());
    assert_eq!(roundtrip(list.clone()), list);

    let props = RoverMessage::SendCameraProp(SendCameraPropMessage {
        camera_id: 0,
        resolutions: Vec::new(),
    });
    assert_eq!(roundtrip(props.clone()), props);

    let image = RoverMessage::SendImage(SendImageMessage::empty(5));
    assert_eq!(roundtrip(image.clone()), image);
}

#[test]
fn test_roundtrip_full_camera_list() {
    let original = RoverMessage::SendCameraList(SendCameraListMessage {
        camera_ids: (0..=254).collect(),
    });
    assert_eq!(roundtrip(original.clone()), original);
}

#[test]
fn test_payload_less_kinds_transmit_only_the_header() {
    for msg in [RoverMessage::Hello, RoverMessage::GetCameraList, RoverMessage::Stop] {
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[1..], &[0, 0, 0, 0]);
    }
}

#[test]
fn test_concatenated_frames_decode_in_sequence() {
    // Arrange – three frames back to back, as they would sit in a socket buffer
    let messages = one_of_each();
    let mut stream = Vec::new();
    for msg in &messages {
        stream.extend(encode_message(msg).unwrap());
    }

    // Act – walk the buffer using the consumed count
    let mut offset = 0;
    let mut decoded = Vec::new();
    while offset < stream.len() {
        let (msg, n) = decode_message(&stream[offset..]).expect("frame must decode");
        decoded.push(msg);
        offset += n;
    }

    // Assert
    assert_eq!(decoded, messages);
}

#[test]
fn test_every_truncation_of_a_frame_is_rejected() {
    let bytes = encode_message(&RoverMessage::SetCameraProp(SetCameraPropMessage {
        camera_id: 0,
        width: 640,
        height: 480,
        fps: 30,
        do_encode: true,
    }))
    .unwrap();

    for cut in 0..bytes.len() {
        let err = decode_message(&bytes[..cut]).unwrap_err();
        assert!(
            matches!(
                err,
                ProtocolError::InsufficientData { .. } | ProtocolError::PayloadLengthMismatch { .. }
            ),
            "cut at {cut} gave {err:?}"
        );
    }
}
