//! One controller connection, from handshake to teardown.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! Handshaking ──► Serving ──────────────────────────► Closing ──► Closed
//!   write Hello     ├─ command loop (this task):        stop capture loop
//!   read Hello      │    read → resolve → decode →      stop chassis
//!                   │    dispatch (blocking pool) →     release cameras
//!                   │    write reply                    shut down writer
//!                   └─ capture loop (spawned task):
//!                        every camera, every 1/fps:
//!                        capture (blocking pool) → write SendImage
//! ```
//!
//! Both loops write through the same [`FrameWriter`], whose lock spans one
//! whole frame.  The device locks live inside `DeviceRegistry` and are only
//! taken on the blocking pool, never across an `.await`.
//!
//! [`Session::run_until`] also watches a shutdown future.  When it resolves
//! the command loop returns and the Closing stage runs as usual.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rover_core::protocol::codec::{decode_payload, ProtocolError};
use rover_core::protocol::messages::{MessageType, RoverMessage};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{read_frame, FrameWriter};
use crate::application::dispatch::{send_image, Dispatch, EndpointContext, MessageRegistry, Resolved};
use crate::application::drive_chassis::ChassisError;
use crate::application::manage_devices::DeviceRegistry;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The controller's first frame was not `Hello`.
    #[error("handshake failed: expected Hello, received kind {kind:#04x}")]
    HandshakeMismatch { kind: u8 },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chassis error: {0}")]
    Chassis(#[from] ChassisError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The controller sent `Stop`.
    Stopped,
    /// The controller closed the connection.
    ConnectionClosed,
    /// The shutdown future passed to [`Session::run_until`] resolved.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Capture loop sleep when no camera is registered, and the upper bound
    /// on any capture loop sleep.
    pub idle_poll: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(100),
        }
    }
}

enum Handshake {
    Complete,
    Closed,
}

/// Why the command loop returned.
enum Ended {
    /// A handler asked to finish; the reply goes out after the capture loop
    /// has stopped so it is the last frame on the wire.
    Final(RoverMessage),
    Closed,
    Shutdown,
}

pub struct Session {
    id: Uuid,
    ctx: EndpointContext,
    registry: Arc<MessageRegistry>,
    settings: SessionSettings,
}

impl Session {
    pub fn new(ctx: EndpointContext, registry: Arc<MessageRegistry>, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            ctx,
            registry,
            settings,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the session to completion over `stream`.
    ///
    /// Everything logged here, including by the capture task, is inside a
    /// `session` span carrying the session id.
    pub async fn run<S>(self, stream: S) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.run_until(stream, std::future::pending::<()>()).await
    }

    /// Like [`run`](Self::run), but ends with [`SessionOutcome::Interrupted`]
    /// once `shutdown` resolves.  Cameras and pins are released either way.
    pub async fn run_until<S, F>(self, stream: S, shutdown: F) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let span = info_span!("session", id = %self.id);
        self.serve(stream, shutdown).instrument(span).await
    }

    async fn serve<S, F>(self, stream: S, shutdown: F) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        F: Future<Output = ()> + Send,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let writer = FrameWriter::new(writer);
        tokio::pin!(shutdown);

        // ── Handshaking ──
        let greeted = tokio::select! {
            greeted = handshake(&mut reader, &writer) => greeted,
            () = shutdown.as_mut() => {
                info!("shutdown requested during handshake");
                close_writer(&writer).await;
                return Ok(SessionOutcome::Interrupted);
            }
        };
        match greeted {
            Ok(Handshake::Complete) => info!("handshake complete"),
            Ok(Handshake::Closed) => {
                info!("controller closed the connection during handshake");
                close_writer(&writer).await;
                return Ok(SessionOutcome::ConnectionClosed);
            }
            Err(e) => {
                error!("handshake failed: {e}");
                close_writer(&writer).await;
                return Err(e);
            }
        }

        // ── Serving ──
        if let Err(e) = self.ctx.chassis.start() {
            error!("chassis failed to start: {e}");
            close_writer(&writer).await;
            return Err(e.into());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let capture = tokio::spawn(
            capture_loop(
                Arc::clone(&self.ctx.devices),
                writer.clone(),
                Arc::clone(&stop),
                self.settings.idle_poll,
            )
            .in_current_span(),
        );

        let ended = self.command_loop(&mut reader, &writer, &mut shutdown).await;

        // ── Closing ──
        stop.store(true, Ordering::Release);
        let captured = capture.await;

        let served = match ended {
            Ok(Ended::Final(reply)) => writer.send(&reply).await.map(|()| {
                info!("stop acknowledged");
                SessionOutcome::Stopped
            }),
            Ok(Ended::Closed) => Ok(SessionOutcome::ConnectionClosed),
            Ok(Ended::Shutdown) => Ok(SessionOutcome::Interrupted),
            Err(e) => Err(e),
        };

        let chassis = Arc::clone(&self.ctx.chassis);
        let chassis_stopped = tokio::task::spawn_blocking(move || chassis.stop()).await;

        let devices = Arc::clone(&self.ctx.devices);
        let released = tokio::task::spawn_blocking(move || devices.release_all()).await;
        match &released {
            Ok(count) => info!("session closing, {count} cameras released"),
            Err(e) => warn!("camera release task failed: {e}"),
        }

        close_writer(&writer).await;

        let outcome = served?;
        captured?;
        chassis_stopped??;
        released?;
        info!("session closed: {outcome:?}");
        Ok(outcome)
    }

    async fn command_loop<R, W, F>(
        &self,
        reader: &mut R,
        writer: &FrameWriter<W>,
        shutdown: &mut Pin<&mut F>,
    ) -> Result<Ended, SessionError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send,
        F: Future<Output = ()>,
    {
        loop {
            let read = tokio::select! {
                read = read_frame(reader) => read,
                () = shutdown.as_mut() => {
                    info!("shutdown requested");
                    return Ok(Ended::Shutdown);
                }
            };
            let frame = match read {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("controller closed the connection");
                    return Ok(Ended::Closed);
                }
                Err(SessionError::Protocol(ProtocolError::Truncated { needed, received })) => {
                    warn!("connection closed mid-frame ({received} of {needed} bytes)");
                    return Ok(Ended::Closed);
                }
                Err(e) => {
                    error!("read failed: {e}");
                    return Err(e);
                }
            };

            let message_type = match self.registry.resolve(frame.header.kind) {
                Resolved::Known(message_type) => message_type,
                Resolved::Unknown(kind) => {
                    warn!(
                        "unknown message kind {kind:#04x} ({} byte payload), ignoring",
                        frame.header.payload_len
                    );
                    continue;
                }
            };
            let message = decode_payload(message_type, &frame.payload).map_err(|e| {
                error!("malformed {message_type:?}: {e}");
                e
            })?;
            debug!("received {message_type:?}");

            let registry = Arc::clone(&self.registry);
            let ctx = self.ctx.clone();
            let dispatched =
                tokio::task::spawn_blocking(move || registry.dispatch(&ctx, message)).await?;

            match dispatched {
                Dispatch::Reply(reply) => {
                    debug!("replying {:?}", reply.message_type());
                    writer.send(&reply).await?;
                }
                Dispatch::NoReply => {}
                Dispatch::Final(reply) => return Ok(Ended::Final(reply)),
            }
        }
    }
}

async fn handshake<R, W>(reader: &mut R, writer: &FrameWriter<W>) -> Result<Handshake, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    writer.send(&RoverMessage::Hello).await?;
    match read_frame(reader).await {
        Ok(Some(frame)) if frame.header.kind == MessageType::Hello as u8 => Ok(Handshake::Complete),
        Ok(Some(frame)) => Err(SessionError::HandshakeMismatch {
            kind: frame.header.kind,
        }),
        Ok(None) | Err(SessionError::Protocol(ProtocolError::Truncated { .. })) => {
            Ok(Handshake::Closed)
        }
        Err(e) => Err(e),
    }
}

async fn close_writer<W>(writer: &FrameWriter<W>)
where
    W: AsyncWrite + Unpin + Send,
{
    if let Err(e) = writer.shutdown().await {
        debug!("writer shutdown: {e}");
    }
}

/// Streams every registered camera at its own frame rate until `stop` is set
/// or the connection fails.
async fn capture_loop<W>(
    devices: Arc<DeviceRegistry>,
    writer: FrameWriter<W>,
    stop: Arc<AtomicBool>,
    idle_poll: Duration,
) where
    W: AsyncWrite + Unpin + Send,
{
    let mut next_due: HashMap<u8, Instant> = HashMap::new();

    while !stop.load(Ordering::Acquire) {
        let registry = Arc::clone(&devices);
        let ids = match tokio::task::spawn_blocking(move || registry.ids()).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("camera list task failed: {e}");
                tokio::time::sleep(idle_poll).await;
                continue;
            }
        };
        next_due.retain(|id, _| ids.contains(id));

        for id in ids {
            let now = Instant::now();
            let due = *next_due.entry(id).or_insert(now);
            if due > now {
                continue;
            }

            let registry = Arc::clone(&devices);
            let captured = tokio::task::spawn_blocking(move || {
                let fps = registry.config(id)?.fps;
                registry.capture(id).map(|image| (fps, image))
            })
            .await;

            let (fps, image) = match captured {
                Ok(Ok(captured)) => captured,
                Ok(Err(e)) => {
                    warn!("stream capture failed: {e}");
                    next_due.insert(id, now + idle_poll);
                    continue;
                }
                Err(e) => {
                    warn!("stream capture task failed: {e}");
                    next_due.insert(id, now + idle_poll);
                    continue;
                }
            };

            let interval = Duration::from_secs(1) / u32::from(fps.max(1));
            // Keep a steady cadence, but never schedule into the past.
            next_due.insert(id, (due + interval).max(Instant::now()));

            let message = RoverMessage::SendImage(send_image(id, image));
            if let Err(e) = writer.send(&message).await {
                debug!("capture loop ending, write failed: {e}");
                return;
            }
            debug!("streamed camera {id}");
        }

        let now = Instant::now();
        let sleep_for = next_due
            .values()
            .min()
            .map(|due| due.saturating_duration_since(now))
            .unwrap_or(idle_poll)
            .min(idle_poll);
        tokio::time::sleep(sleep_for).await;
    }
    debug!("capture loop stopped");
}
