//! Synthetic frame source for tests and bench runs.
//!
//! # Why a mock frame source?
//!
//! Real cameras need hardware on the test machine, deliver unpredictable
//! pixels, and cannot be told to fail on demand.  `MockFrameSource` serves a
//! fixed set of in-memory cameras instead:
//!
//! - Each camera supports a chosen list of resolutions.  A `configure` call
//!   for anything else is accepted but ignored, as real V4L2 devices do, so
//!   the next frame keeps the old size.
//! - Every frame is filled with the BGR pixel `[0x10, 0x20, 0x30]`, which makes
//!   the colour reorder visible in assertions.
//! - A camera can be unplugged, have its reads broken, or be slowed down at
//!   any time through the source, even after its handle was handed out.
//!
//! # Usage in tests
//!
//! ```ignore
//! let source = Arc::new(
//!     MockFrameSource::new().with_camera(0, MockCamera::supporting(&[(640, 480)])),
//! );
//! let registry = DeviceRegistry::new(source.clone(), RegistrySettings::default());
//! registry.enumerate();
//! source.unplug(0);
//! assert!(registry.capture(0).is_err());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rover_core::Resolution;

use super::{encode_png, reorder_bgr_to_rgb};
use crate::application::manage_devices::{CameraHandle, FrameSource, FrameSourceError, RawFrame};

/// The BGR value of every synthetic pixel.
pub const MOCK_PIXEL_BGR: [u8; 3] = [0x10, 0x20, 0x30];

#[derive(Debug, Default)]
struct CameraControl {
    unplugged: AtomicBool,
    reads_broken: AtomicBool,
    delay_us: AtomicU64,
}

/// Description of one synthetic camera.
#[derive(Debug, Clone)]
pub struct MockCamera {
    supported: Vec<Resolution>,
    start: Resolution,
    control: Arc<CameraControl>,
}

impl Default for MockCamera {
    /// A 640x480 camera that supports only 640x480.
    fn default() -> Self {
        Self::supporting(&[(640, 480)])
    }
}

impl MockCamera {
    /// A camera supporting exactly `modes`, starting at the first one.
    pub fn supporting(modes: &[(u16, u16)]) -> Self {
        let supported: Vec<Resolution> = modes.iter().map(|&(w, h)| Resolution::new(w, h)).collect();
        let start = supported.first().copied().unwrap_or(Resolution::new(640, 480));
        Self {
            supported,
            start,
            control: Arc::default(),
        }
    }

    /// Starts the camera at `width`x`height`, adding it to the supported list.
    pub fn starting_at(mut self, width: u16, height: u16) -> Self {
        let mode = Resolution::new(width, height);
        if !self.supported.contains(&mode) {
            self.supported.push(mode);
        }
        self.start = mode;
        self
    }

    /// Opens fine but every read fails.
    pub fn failing_reads(self) -> Self {
        self.control.reads_broken.store(true, Ordering::SeqCst);
        self
    }

    /// Every read sleeps for `delay` first.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.control
            .delay_us
            .store(delay.as_micros() as u64, Ordering::SeqCst);
        self
    }
}

/// A `FrameSource` backed by in-memory cameras.
#[derive(Debug, Default)]
pub struct MockFrameSource {
    cameras: HashMap<u8, MockCamera>,
    opens: Mutex<HashMap<u8, usize>>,
    closed: Arc<AtomicUsize>,
}

impl MockFrameSource {
    /// A source with no cameras: every `open` fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// The source used when no capture hardware is configured: camera 0 at
    /// 640x480, also capable of 320x240 and 1280x720.
    pub fn synthetic() -> Self {
        Self::new().with_camera(
            0,
            MockCamera::supporting(&[(320, 240), (640, 480), (1280, 720)]).starting_at(640, 480),
        )
    }

    /// Adds camera `id`.
    pub fn with_camera(mut self, id: u8, camera: MockCamera) -> Self {
        self.cameras.insert(id, camera);
        self
    }

    /// How many times camera `id` was opened.
    pub fn open_count(&self, id: u8) -> usize {
        self.opens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    /// How many handles have been closed, across all cameras.
    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes camera `id`'s handles report closed and fail every call.
    pub fn unplug(&self, id: u8) {
        if let Some(camera) = self.cameras.get(&id) {
            camera.control.unplugged.store(true, Ordering::SeqCst);
        }
    }

    /// Makes every further read on camera `id` fail.
    pub fn break_reads(&self, id: u8) {
        if let Some(camera) = self.cameras.get(&id) {
            camera.control.reads_broken.store(true, Ordering::SeqCst);
        }
    }

    /// Changes the per-read delay of camera `id`.
    pub fn set_delay(&self, id: u8, delay: Duration) {
        if let Some(camera) = self.cameras.get(&id) {
            camera
                .control
                .delay_us
                .store(delay.as_micros() as u64, Ordering::SeqCst);
        }
    }
}

impl FrameSource for MockFrameSource {
    fn open(&self, id: u8) -> Result<Box<dyn CameraHandle>, FrameSourceError> {
        let camera = self.cameras.get(&id).ok_or(FrameSourceError::OpenFailed(id))?;
        if camera.control.unplugged.load(Ordering::SeqCst) {
            return Err(FrameSourceError::OpenFailed(id));
        }
        *self
            .opens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default() += 1;

        Ok(Box::new(MockCameraHandle {
            supported: camera.supported.clone(),
            current: camera.start,
            fps: 0,
            open: true,
            control: Arc::clone(&camera.control),
            closed: Arc::clone(&self.closed),
        }))
    }

    fn reorder(&self, frame: &mut RawFrame) {
        reorder_bgr_to_rgb(frame);
    }

    fn encode(&self, frame: &RawFrame) -> Result<Vec<u8>, FrameSourceError> {
        encode_png(frame)
    }
}

struct MockCameraHandle {
    supported: Vec<Resolution>,
    current: Resolution,
    fps: u8,
    open: bool,
    control: Arc<CameraControl>,
    closed: Arc<AtomicUsize>,
}

impl MockCameraHandle {
    fn check_open(&self) -> Result<(), FrameSourceError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(FrameSourceError::Closed)
        }
    }
}

impl CameraHandle for MockCameraHandle {
    fn configure(&mut self, width: u16, height: u16, fps: u8) -> Result<(), FrameSourceError> {
        self.check_open()?;
        let requested = Resolution::new(width, height);
        if self.supported.contains(&requested) {
            self.current = requested;
        }
        self.fps = fps;
        Ok(())
    }

    fn read(&mut self) -> Result<RawFrame, FrameSourceError> {
        self.check_open()?;
        let delay = self.control.delay_us.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_micros(delay));
        }
        if self.control.reads_broken.load(Ordering::SeqCst) {
            return Err(FrameSourceError::ReadFailed("mock camera read failure".into()));
        }

        let pixels = self.current.width as usize * self.current.height as usize;
        Ok(RawFrame {
            data: MOCK_PIXEL_BGR.repeat(pixels),
            width: self.current.width,
            height: self.current.height,
            channels: 3,
        })
    }

    fn is_open(&self) -> bool {
        self.open && !self.control.unplugged.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
