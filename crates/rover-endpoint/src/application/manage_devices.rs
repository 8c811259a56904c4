//! DeviceRegistry: owns every open camera and serialises access per camera.
//!
//! # Locking model (for beginners)
//!
//! Two activities touch cameras at the same time: the command loop (which
//! changes resolutions and answers `CaptureImage`) and the streaming loop
//! (which captures every camera at its frame rate).  A single lock around the
//! whole registry would make a slow capture on camera 0 stall a property
//! change on camera 2, so instead:
//!
//! ```text
//! RwLock<BTreeMap<id, Arc<Device>>>      ← held only to find / add / remove
//!                      └─ Device { Mutex<DeviceState> }  ← held for every
//!                                                          frame-source call
//! ```
//!
//! A single-device operation takes the map's read lock just long enough to
//! clone the `Arc<Device>`, drops it, and then locks that one device.  Only
//! [`DeviceRegistry::enumerate`] and [`DeviceRegistry::release_all`] take the
//! map's write lock.  `enumerate` probes with no lock held and takes the
//! write lock only to insert what it found.
//!
//! Device locks are plain `std::sync::Mutex`es: every caller runs on a
//! blocking thread, and no device lock is ever held across a socket write.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rover_core::Resolution;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resolutions tried, in order, by [`DeviceRegistry::get_properties`].
pub const CANDIDATE_RESOLUTIONS: [Resolution; 8] = [
    Resolution::new(160, 120),
    Resolution::new(320, 240),
    Resolution::new(640, 480),
    Resolution::new(800, 600),
    Resolution::new(1024, 768),
    Resolution::new(1280, 720),
    Resolution::new(1280, 960),
    Resolution::new(1920, 1080),
];

// ── Frame source port ─────────────────────────────────────────────────────────

/// Errors reported by a [`FrameSource`] or one of its handles.
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("camera {0} could not be opened")]
    OpenFailed(u8),
    #[error("configuration rejected: {0}")]
    ConfigureFailed(String),
    #[error("frame read failed: {0}")]
    ReadFailed(String),
    #[error("image encoding failed: {0}")]
    EncodeFailed(String),
    #[error("handle is closed")]
    Closed,
}

/// One frame as delivered by the capture hardware.
///
/// Pixels are interleaved, `channels` bytes per pixel, in the hardware's
/// native order (BGR for most V4L2 backends) until
/// [`FrameSource::reorder`] is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u16,
    pub height: u16,
    pub channels: u16,
}

/// An open camera.
pub trait CameraHandle: Send {
    /// Requests a capture mode.  The camera may silently pick a different
    /// resolution; callers check the dimensions of the next frame.
    fn configure(&mut self, width: u16, height: u16, fps: u8) -> Result<(), FrameSourceError>;

    /// Reads one frame.
    fn read(&mut self) -> Result<RawFrame, FrameSourceError>;

    /// `false` once the handle was closed or the camera went away.
    fn is_open(&self) -> bool;

    /// Releases the camera.  Calling it twice is harmless.
    fn close(&mut self);
}

/// The capture backend: opens cameras and converts their frames for the wire.
pub trait FrameSource: Send + Sync {
    /// Opens camera `id`.
    fn open(&self, id: u8) -> Result<Box<dyn CameraHandle>, FrameSourceError>;

    /// Converts a frame to the channel order expected on the wire (RGB).
    fn reorder(&self, frame: &mut RawFrame);

    /// Compresses a (reordered) frame into a self-describing image format.
    fn encode(&self, frame: &RawFrame) -> Result<Vec<u8>, FrameSourceError>;
}

// ── Registry types ────────────────────────────────────────────────────────────

/// Error type for device registry operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The id is not registered, the handle is closed, or the read failed.
    #[error("camera {id} unavailable: {reason}")]
    DeviceUnavailable { id: u8, reason: String },

    /// The frame was read but could not be compressed.
    #[error("camera {id}: {source}")]
    Source {
        id: u8,
        #[source]
        source: FrameSourceError,
    },
}

impl DeviceError {
    fn unavailable(id: u8, reason: impl ToString) -> Self {
        DeviceError::DeviceUnavailable {
            id,
            reason: reason.to_string(),
        }
    }
}

/// Mutable per-camera configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub encoding_enabled: bool,
    pub width: u16,
    pub height: u16,
    pub fps: u8,
}

/// One captured image, ready to be put into a `SendImage` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub data: Vec<u8>,
    pub channels: u16,
    pub width: u16,
    pub height: u16,
    pub encoded: bool,
}

/// Tunables for [`DeviceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Ids `0..probe_count` are tried by `enumerate`.
    pub probe_count: u8,
    /// Frame rate assigned to a freshly enumerated camera.
    pub default_fps: u8,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            probe_count: 10,
            default_fps: 10,
        }
    }
}

struct DeviceState {
    handle: Box<dyn CameraHandle>,
    config: DeviceConfig,
}

impl DeviceState {
    fn ensure_open(&self, id: u8) -> Result<(), DeviceError> {
        if self.handle.is_open() {
            Ok(())
        } else {
            Err(DeviceError::unavailable(id, "handle is closed"))
        }
    }
}

struct Device {
    state: Mutex<DeviceState>,
}

impl Device {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── DeviceRegistry ────────────────────────────────────────────────────────────

/// Tracks every open camera, one lock and one configuration per camera.
pub struct DeviceRegistry {
    source: Arc<dyn FrameSource>,
    settings: RegistrySettings,
    devices: RwLock<BTreeMap<u8, Arc<Device>>>,
}

impl DeviceRegistry {
    /// Creates an empty registry over the given frame source.
    pub fn new(source: Arc<dyn FrameSource>, settings: RegistrySettings) -> Self {
        Self {
            source,
            settings,
            devices: RwLock::new(BTreeMap::new()),
        }
    }

    /// Probes ids `0..probe_count` and registers every camera that opens and
    /// yields one frame.  Already registered ids are not probed again.
    ///
    /// Returns every registered id, sorted.
    pub fn enumerate(&self) -> Vec<u8> {
        let registered = self.ids();
        let found: Vec<(u8, DeviceState)> = (0..self.settings.probe_count)
            .filter(|id| !registered.contains(id))
            .filter_map(|id| self.probe(id).map(|state| (id, state)))
            .collect();

        let mut devices = self.write_devices();
        for (id, mut state) in found {
            if devices.contains_key(&id) {
                // Registered by a concurrent enumerate while we probed.
                state.handle.close();
                continue;
            }
            info!(
                "camera {id} registered at {}x{}",
                state.config.width, state.config.height
            );
            devices.insert(
                id,
                Arc::new(Device {
                    state: Mutex::new(state),
                }),
            );
        }
        devices.keys().copied().collect()
    }

    fn probe(&self, id: u8) -> Option<DeviceState> {
        let mut handle = match self.source.open(id) {
            Ok(handle) => handle,
            Err(e) => {
                debug!("probe {id}: {e}");
                return None;
            }
        };
        match handle.read() {
            Ok(frame) => Some(DeviceState {
                handle,
                config: DeviceConfig {
                    encoding_enabled: false,
                    width: frame.width,
                    height: frame.height,
                    fps: self.settings.default_fps,
                },
            }),
            Err(e) => {
                debug!("probe {id}: opened but no frame: {e}");
                handle.close();
                None
            }
        }
    }

    /// Returns the resolutions camera `id` actually delivers, from
    /// [`CANDIDATE_RESOLUTIONS`].
    ///
    /// Each candidate is applied and kept only if the next frame has exactly
    /// those dimensions.  The camera's previous mode is restored afterwards.
    ///
    /// # Errors
    ///
    /// [`DeviceError::DeviceUnavailable`] if the id is not registered or its handle
    /// is closed.
    pub fn get_properties(&self, id: u8) -> Result<Vec<Resolution>, DeviceError> {
        let device = self.device(id)?;
        let mut state = device.lock();
        state.ensure_open(id)?;

        let previous = state.config;
        let mut supported = Vec::new();
        for candidate in CANDIDATE_RESOLUTIONS {
            if let Err(e) = state
                .handle
                .configure(candidate.width, candidate.height, previous.fps)
            {
                debug!("camera {id}: {}x{} rejected: {e}", candidate.width, candidate.height);
                continue;
            }
            match state.handle.read() {
                Ok(frame) if frame.width == candidate.width && frame.height == candidate.height => {
                    supported.push(candidate);
                }
                Ok(_) => {}
                Err(e) => debug!("camera {id}: read at {}x{} failed: {e}", candidate.width, candidate.height),
            }
        }

        if let Err(e) = state
            .handle
            .configure(previous.width, previous.height, previous.fps)
        {
            warn!("camera {id}: could not restore {}x{}: {e}", previous.width, previous.height);
        }
        Ok(supported)
    }

    /// Applies non-zero `width`/`height`/`fps`, sets the encoding flag, and
    /// confirms with one read.  Zero fields are left unchanged.
    ///
    /// The recorded width and height are those of the confirming frame.
    ///
    /// # Errors
    ///
    /// [`DeviceError::DeviceUnavailable`] if the device is missing or closed, or the
    /// configuration or confirming read fails.  The stored configuration is
    /// untouched on error.
    pub fn set_properties(
        &self,
        id: u8,
        width: u16,
        height: u16,
        fps: u8,
        do_encode: bool,
    ) -> Result<DeviceConfig, DeviceError> {
        self.apply(id, width, height, fps, Some(do_encode))
    }

    /// Like [`set_properties`](Self::set_properties) but leaves fps and the
    /// encoding flag alone.
    pub fn set_resolution(&self, id: u8, width: u16, height: u16) -> Result<DeviceConfig, DeviceError> {
        self.apply(id, width, height, 0, None)
    }

    fn apply(
        &self,
        id: u8,
        width: u16,
        height: u16,
        fps: u8,
        encode: Option<bool>,
    ) -> Result<DeviceConfig, DeviceError> {
        let device = self.device(id)?;
        let mut state = device.lock();
        state.ensure_open(id)?;

        let mut next = state.config;
        if width != 0 {
            next.width = width;
        }
        if height != 0 {
            next.height = height;
        }
        if fps != 0 {
            next.fps = fps;
        }
        if let Some(encode) = encode {
            next.encoding_enabled = encode;
        }

        state
            .handle
            .configure(next.width, next.height, next.fps)
            .map_err(|e| DeviceError::unavailable(id, e))?;
        let frame = state
            .handle
            .read()
            .map_err(|e| DeviceError::unavailable(id, e))?;
        if frame.width != next.width || frame.height != next.height {
            debug!(
                "camera {id}: asked for {}x{}, delivering {}x{}",
                next.width, next.height, frame.width, frame.height
            );
        }
        next.width = frame.width;
        next.height = frame.height;
        state.config = next;
        Ok(next)
    }

    /// Reads one frame, converts it to RGB, and PNG-encodes it when the
    /// camera has encoding enabled.
    ///
    /// # Errors
    ///
    /// [`DeviceError::DeviceUnavailable`] if the read fails; [`DeviceError::Source`]
    /// if compression fails.
    pub fn capture(&self, id: u8) -> Result<CapturedImage, DeviceError> {
        let device = self.device(id)?;
        let mut state = device.lock();
        state.ensure_open(id)?;

        let mut frame = state
            .handle
            .read()
            .map_err(|e| DeviceError::unavailable(id, e))?;
        self.source.reorder(&mut frame);

        if state.config.encoding_enabled {
            let data = self
                .source
                .encode(&frame)
                .map_err(|source| DeviceError::Source { id, source })?;
            Ok(CapturedImage {
                data,
                channels: frame.channels,
                width: frame.width,
                height: frame.height,
                encoded: true,
            })
        } else {
            Ok(CapturedImage {
                channels: frame.channels,
                width: frame.width,
                height: frame.height,
                data: frame.data,
                encoded: false,
            })
        }
    }

    /// Closes every camera and empties the registry.  Returns how many were
    /// closed; a second call returns 0.
    pub fn release_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.write_devices());
        let count = drained.len();
        for (id, device) in drained {
            device.lock().handle.close();
            info!("camera {id} released");
        }
        count
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<u8> {
        self.read_devices().keys().copied().collect()
    }

    /// Current configuration of camera `id`.
    pub fn config(&self, id: u8) -> Result<DeviceConfig, DeviceError> {
        Ok(self.device(id)?.lock().config)
    }

    pub fn len(&self) -> usize {
        self.read_devices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_devices().is_empty()
    }

    fn device(&self, id: u8) -> Result<Arc<Device>, DeviceError> {
        self.read_devices()
            .get(&id)
            .cloned()
            .ok_or_else(|| DeviceError::unavailable(id, "not registered"))
    }

    fn read_devices(&self) -> RwLockReadGuard<'_, BTreeMap<u8, Arc<Device>>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_devices(&self) -> RwLockWriteGuard<'_, BTreeMap<u8, Arc<Device>>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::frame_source::mock::{MockCamera, MockFrameSource};
    use std::thread;
    use std::time::{Duration, Instant};

    fn registry_with(source: MockFrameSource) -> (DeviceRegistry, Arc<MockFrameSource>) {
        let source = Arc::new(source);
        let registry = DeviceRegistry::new(source.clone(), RegistrySettings::default());
        (registry, source)
    }

    // ── enumerate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_enumerate_returns_only_openable_ids_sorted() {
        // Arrange
        let (registry, _) = registry_with(
            MockFrameSource::new()
                .with_camera(2, MockCamera::default())
                .with_camera(0, MockCamera::default()),
        );

        // Act
        let ids = registry.enumerate();

        // Assert
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_enumerate_skips_camera_that_opens_but_never_delivers() {
        let (registry, source) = registry_with(
            MockFrameSource::new()
                .with_camera(0, MockCamera::default())
                .with_camera(1, MockCamera::default().failing_reads()),
        );

        assert_eq!(registry.enumerate(), vec![0]);
        assert_eq!(source.closed_count(), 1, "the silent camera must be closed again");
    }

    #[test]
    fn test_enumerate_does_not_reprobe_registered_ids() {
        let (registry, source) =
            registry_with(MockFrameSource::new().with_camera(3, MockCamera::default()));

        registry.enumerate();
        registry.enumerate();

        assert_eq!(source.open_count(3), 1);
        assert_eq!(registry.ids(), vec![3]);
    }

    #[test]
    fn test_slow_probe_does_not_block_registry_readers() {
        // Arrange – camera 0 takes 400 ms to deliver its probe frame
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::default().with_delay(Duration::from_millis(400)),
        ));
        let registry = Arc::new(registry);
        let probing = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.enumerate())
        };
        thread::sleep(Duration::from_millis(50));

        // Act
        let start = Instant::now();
        let ids = registry.ids();
        let elapsed = start.elapsed();

        // Assert
        assert!(ids.is_empty());
        assert!(elapsed < Duration::from_millis(200), "ids() waited {elapsed:?}");
        assert_eq!(probing.join().unwrap(), vec![0]);
    }

    #[test]
    fn test_enumerate_assigns_default_config_from_probe_frame() {
        let (registry, _) = registry_with(
            MockFrameSource::new().with_camera(0, MockCamera::default().starting_at(320, 240)),
        );
        registry.enumerate();

        let config = registry.config(0).unwrap();

        assert_eq!(
            config,
            DeviceConfig {
                encoding_enabled: false,
                width: 320,
                height: 240,
                fps: 10,
            }
        );
    }

    // ── get_properties ────────────────────────────────────────────────────────

    #[test]
    fn test_get_properties_keeps_only_exact_matches() {
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::supporting(&[(640, 480), (1280, 720), (333, 222)]),
        ));
        registry.enumerate();

        let props = registry.get_properties(0).unwrap();

        assert_eq!(props, vec![Resolution::new(640, 480), Resolution::new(1280, 720)]);
    }

    #[test]
    fn test_get_properties_restores_previous_mode() {
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::supporting(&[(320, 240), (640, 480), (1920, 1080)]).starting_at(320, 240),
        ));
        registry.enumerate();

        registry.get_properties(0).unwrap();
        let image = registry.capture(0).unwrap();

        assert_eq!((image.width, image.height), (320, 240));
    }

    #[test]
    fn test_get_properties_unknown_id_is_unavailable() {
        let (registry, _) = registry_with(MockFrameSource::new());
        let err = registry.get_properties(5).unwrap_err();
        assert!(matches!(err, DeviceError::DeviceUnavailable { id: 5, .. }));
    }

    #[test]
    fn test_get_properties_closed_handle_is_unavailable() {
        let (registry, source) =
            registry_with(MockFrameSource::new().with_camera(0, MockCamera::default()));
        registry.enumerate();
        source.unplug(0);

        assert!(matches!(
            registry.get_properties(0),
            Err(DeviceError::DeviceUnavailable { id: 0, .. })
        ));
    }

    // ── set_properties ────────────────────────────────────────────────────────

    #[test]
    fn test_set_properties_zero_fields_leave_values_unchanged() {
        let (registry, _) = registry_with(
            MockFrameSource::new().with_camera(0, MockCamera::default().starting_at(640, 480)),
        );
        registry.enumerate();

        let config = registry.set_properties(0, 0, 0, 0, true).unwrap();

        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.fps, 10);
        assert!(config.encoding_enabled);
    }

    #[test]
    fn test_set_properties_applies_non_zero_fields() {
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::supporting(&[(320, 240), (1280, 720)]).starting_at(320, 240),
        ));
        registry.enumerate();

        registry.set_properties(0, 1280, 720, 30, false).unwrap();

        let config = registry.config(0).unwrap();
        assert_eq!((config.width, config.height, config.fps), (1280, 720, 30));
    }

    #[test]
    fn test_set_properties_records_what_the_camera_delivers() {
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::supporting(&[(640, 480)]).starting_at(640, 480),
        ));
        registry.enumerate();

        let config = registry.set_properties(0, 1920, 1080, 0, false).unwrap();

        assert_eq!((config.width, config.height), (640, 480));
    }

    #[test]
    fn test_set_resolution_keeps_encoding_flag() {
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::supporting(&[(320, 240), (640, 480)]),
        ));
        registry.enumerate();
        registry.set_properties(0, 0, 0, 0, true).unwrap();

        let config = registry.set_resolution(0, 320, 240).unwrap();

        assert!(config.encoding_enabled);
        assert_eq!((config.width, config.height), (320, 240));
    }

    #[test]
    fn test_set_properties_failed_read_keeps_old_config() {
        let (registry, source) =
            registry_with(MockFrameSource::new().with_camera(0, MockCamera::default()));
        registry.enumerate();
        let before = registry.config(0).unwrap();
        source.break_reads(0);

        assert!(registry.set_properties(0, 0, 0, 25, true).is_err());
        assert_eq!(registry.config(0).unwrap(), before);
    }

    // ── capture ───────────────────────────────────────────────────────────────

    #[test]
    fn test_capture_raw_is_rgb_with_matching_size() {
        let (registry, _) = registry_with(
            MockFrameSource::new().with_camera(0, MockCamera::default().starting_at(4, 2)),
        );
        registry.enumerate();

        let image = registry.capture(0).unwrap();

        assert!(!image.encoded);
        assert_eq!((image.channels, image.width, image.height), (3, 4, 2));
        assert_eq!(image.data.len(), 4 * 2 * 3);
        // The mock emits BGR pixels (0x10, 0x20, 0x30); the wire wants RGB.
        assert_eq!(&image.data[..3], &[0x30, 0x20, 0x10]);
    }

    #[test]
    fn test_capture_encoded_is_png() {
        let (registry, _) = registry_with(
            MockFrameSource::new().with_camera(0, MockCamera::default().starting_at(16, 8)),
        );
        registry.enumerate();
        registry.set_properties(0, 0, 0, 0, true).unwrap();

        let image = registry.capture(0).unwrap();

        assert!(image.encoded);
        assert_eq!(&image.data[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((image.width, image.height), (16, 8));
    }

    #[test]
    fn test_capture_failed_read_is_unavailable() {
        let (registry, source) =
            registry_with(MockFrameSource::new().with_camera(0, MockCamera::default()));
        registry.enumerate();
        source.break_reads(0);

        assert!(matches!(registry.capture(0), Err(DeviceError::DeviceUnavailable { id: 0, .. })));
    }

    #[test]
    fn test_failure_on_one_camera_leaves_others_working() {
        let (registry, source) = registry_with(
            MockFrameSource::new()
                .with_camera(0, MockCamera::default())
                .with_camera(1, MockCamera::default()),
        );
        registry.enumerate();
        source.unplug(0);

        assert!(registry.capture(0).is_err());
        assert!(registry.capture(1).is_ok());
    }

    // ── release_all ───────────────────────────────────────────────────────────

    #[test]
    fn test_release_all_closes_every_handle_and_is_idempotent() {
        let (registry, source) = registry_with(
            MockFrameSource::new()
                .with_camera(0, MockCamera::default())
                .with_camera(4, MockCamera::default()),
        );
        registry.enumerate();

        assert_eq!(registry.release_all(), 2);
        assert_eq!(registry.release_all(), 0);

        assert!(registry.is_empty());
        assert_eq!(source.closed_count(), 2);
        assert!(registry.capture(0).is_err());
    }

    // ── concurrency ───────────────────────────────────────────────────────────

    #[test]
    fn test_capture_racing_reconfigure_sees_whole_configurations() {
        // Arrange – a slow camera so configure and read windows overlap
        let (registry, _) = registry_with(MockFrameSource::new().with_camera(
            0,
            MockCamera::supporting(&[(320, 240), (640, 480)])
                .starting_at(320, 240)
                .with_delay(Duration::from_millis(2)),
        ));
        registry.enumerate();
        let registry = Arc::new(registry);

        // Act – one thread flips resolutions while another captures
        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..20 {
                    let (w, h) = if i % 2 == 0 { (640, 480) } else { (320, 240) };
                    registry.set_properties(0, w, h, 0, false).unwrap();
                }
            })
        };
        let reader = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                (0..20)
                    .map(|_| {
                        let image = registry.capture(0).unwrap();
                        (image.width, image.height, image.data.len())
                    })
                    .collect::<Vec<_>>()
            })
        };
        writer.join().unwrap();
        let frames = reader.join().unwrap();

        // Assert – every frame is internally consistent with one applied mode
        for (w, h, len) in frames {
            assert!(matches!((w, h), (320, 240) | (640, 480)), "torn mode {w}x{h}");
            assert_eq!(len, w as usize * h as usize * 3);
        }
    }

    #[test]
    fn test_slow_camera_does_not_block_another() {
        // Arrange
        let (registry, source) = registry_with(
            MockFrameSource::new()
                .with_camera(0, MockCamera::default().starting_at(4, 4))
                .with_camera(1, MockCamera::default().starting_at(4, 4)),
        );
        registry.enumerate();
        let slow_read = Duration::from_millis(400);
        source.set_delay(0, slow_read);
        let registry = Arc::new(registry);

        let slow = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.capture(0))
        };
        // Give the slow capture time to take camera 0's lock.
        thread::sleep(Duration::from_millis(50));

        // Act
        let start = Instant::now();
        registry.capture(1).unwrap();
        let elapsed = start.elapsed();
        slow.join().unwrap().unwrap();

        // Assert
        assert!(elapsed < Duration::from_millis(300), "camera 1 waited {elapsed:?}");
    }
}
