//! Message registry: maps each inbound message kind to its handler.
//!
//! The table is built once at startup and never changes.  Handlers are plain
//! `fn` pointers that receive the shared [`EndpointContext`] and the decoded
//! message, and return a [`Dispatch`] telling the session what to send.
//!
//! Handlers do blocking device I/O, so the session calls
//! [`MessageRegistry::dispatch`] on the blocking thread pool.

use std::collections::HashMap;
use std::sync::Arc;

use rover_core::protocol::messages::{
    CaptureImageMessage, GetCameraPropMessage, MessageType, RoverMessage, SendCameraListMessage,
    SendCameraPropMessage, SendImageMessage, SetCameraPropMessage,
};
use tracing::{debug, info, warn};

use super::drive_chassis::ChassisController;
use super::manage_devices::{CapturedImage, DeviceRegistry};

/// State every handler may touch.
#[derive(Clone)]
pub struct EndpointContext {
    pub devices: Arc<DeviceRegistry>,
    pub chassis: Arc<ChassisController>,
}

/// What the session should do after a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Send this message and keep serving.
    Reply(RoverMessage),
    /// Send nothing and keep serving.
    NoReply,
    /// Send this message, then end the command loop.
    Final(RoverMessage),
}

/// Result of looking up a raw kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Known(MessageType),
    Unknown(u8),
}

pub type Handler = fn(&EndpointContext, RoverMessage) -> Dispatch;

/// Static `MessageType -> Handler` table.
pub struct MessageRegistry {
    handlers: HashMap<MessageType, Handler>,
}

impl MessageRegistry {
    /// The table the endpoint serves with.
    ///
    /// Outbound-only kinds (`SendImage`, `SendCameraList`, `SendCameraProp`)
    /// have no handler.
    pub fn with_default_handlers() -> Self {
        let mut handlers: HashMap<MessageType, Handler> = HashMap::new();
        handlers.insert(MessageType::Hello, handle_hello);
        handlers.insert(MessageType::GetCameraList, handle_get_camera_list);
        handlers.insert(MessageType::CaptureImage, handle_capture_image);
        handlers.insert(MessageType::GetCameraProp, handle_get_camera_prop);
        handlers.insert(MessageType::SetCameraProp, handle_set_camera_prop);
        handlers.insert(MessageType::Move, handle_move);
        handlers.insert(MessageType::Stop, handle_stop);
        Self { handlers }
    }

    pub fn resolve(&self, kind: u8) -> Resolved {
        match MessageType::try_from(kind) {
            Ok(message_type) => Resolved::Known(message_type),
            Err(()) => Resolved::Unknown(kind),
        }
    }

    pub fn has_handler(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Runs the handler for `message`.  A kind without a handler is logged
    /// and answered with [`Dispatch::NoReply`].
    pub fn dispatch(&self, ctx: &EndpointContext, message: RoverMessage) -> Dispatch {
        let message_type = message.message_type();
        match self.handlers.get(&message_type) {
            Some(handler) => handler(ctx, message),
            None => {
                warn!("no handler for inbound {message_type:?}, ignoring");
                Dispatch::NoReply
            }
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

fn handle_hello(_ctx: &EndpointContext, _message: RoverMessage) -> Dispatch {
    debug!("late Hello answered");
    Dispatch::Reply(RoverMessage::Hello)
}

fn handle_get_camera_list(ctx: &EndpointContext, _message: RoverMessage) -> Dispatch {
    let camera_ids = ctx.devices.enumerate();
    info!("camera list: {camera_ids:?}");
    Dispatch::Reply(RoverMessage::SendCameraList(SendCameraListMessage {
        camera_ids,
    }))
}

fn handle_capture_image(ctx: &EndpointContext, message: RoverMessage) -> Dispatch {
    let RoverMessage::CaptureImage(CaptureImageMessage {
        camera_id,
        width,
        height,
    }) = message
    else {
        return Dispatch::NoReply;
    };

    if width != 0 || height != 0 {
        if let Err(e) = ctx.devices.set_resolution(camera_id, width, height) {
            warn!("capture {camera_id}: {e}");
            return Dispatch::Reply(RoverMessage::SendImage(SendImageMessage::empty(camera_id)));
        }
    }

    match ctx.devices.capture(camera_id) {
        Ok(image) => Dispatch::Reply(RoverMessage::SendImage(send_image(camera_id, image))),
        Err(e) => {
            warn!("capture {camera_id}: {e}");
            Dispatch::Reply(RoverMessage::SendImage(SendImageMessage::empty(camera_id)))
        }
    }
}

fn handle_get_camera_prop(ctx: &EndpointContext, message: RoverMessage) -> Dispatch {
    let RoverMessage::GetCameraProp(GetCameraPropMessage { camera_id }) = message else {
        return Dispatch::NoReply;
    };
    let resolutions = ctx.devices.get_properties(camera_id).unwrap_or_else(|e| {
        warn!("camera properties {camera_id}: {e}");
        Vec::new()
    });
    Dispatch::Reply(RoverMessage::SendCameraProp(SendCameraPropMessage {
        camera_id,
        resolutions,
    }))
}

fn handle_set_camera_prop(ctx: &EndpointContext, message: RoverMessage) -> Dispatch {
    let RoverMessage::SetCameraProp(SetCameraPropMessage {
        camera_id,
        width,
        height,
        fps,
        do_encode,
    }) = message
    else {
        return Dispatch::NoReply;
    };
    match ctx
        .devices
        .set_properties(camera_id, width, height, fps, do_encode)
    {
        Ok(config) => info!(
            "camera {camera_id} now {}x{} @ {} fps, encoding {}",
            config.width, config.height, config.fps, config.encoding_enabled
        ),
        Err(e) => warn!("set camera properties {camera_id}: {e}"),
    }
    Dispatch::NoReply
}

fn handle_move(ctx: &EndpointContext, message: RoverMessage) -> Dispatch {
    if let RoverMessage::Move(command) = message {
        ctx.chassis.apply_move(&command);
    }
    Dispatch::NoReply
}

fn handle_stop(ctx: &EndpointContext, _message: RoverMessage) -> Dispatch {
    let released = ctx.devices.release_all();
    info!("stop requested, {released} cameras released");
    Dispatch::Final(RoverMessage::Stop)
}

/// Builds the wire message for a captured image.
pub fn send_image(camera_id: u8, image: CapturedImage) -> SendImageMessage {
    SendImageMessage {
        camera_id,
        encoded: image.encoded,
        channels: image.channels,
        width: image.width,
        height: image.height,
        data: image.data,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
