//! Linux GPIO through the sysfs interface (`/sys/class/gpio`).
//!
//! Callers address pins by their position on the 40-pin header.  sysfs
//! wants the kernel's GPIO line number instead, so the driver carries a
//! header-to-line map and refuses pins missing from it.  For each pin:
//!
//! 1. writes the line number to `export` unless `gpioN/` already exists,
//! 2. writes `out` or `in` to `gpioN/direction`,
//! 3. writes `0`/`1` to `gpioN/value` on every change.
//!
//! `release_all` drives every configured pin low and writes its line to
//! `unexport`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::application::drive_chassis::{PinDriver, PinError, PinMode};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy)]
struct ConfiguredPin {
    line: u32,
    /// None before the first write.
    last: Option<u8>,
}

pub struct SysfsPinDriver {
    root: PathBuf,
    lines: BTreeMap<u8, u32>,
    pins: BTreeMap<u8, ConfiguredPin>,
}

impl SysfsPinDriver {
    /// A driver over the real sysfs tree.  `lines` maps header pin to kernel
    /// line.
    pub fn new(lines: BTreeMap<u8, u32>) -> Self {
        Self::with_root(SYSFS_GPIO_ROOT, lines)
    }

    /// A driver rooted at a different directory (used by tests).
    pub fn with_root(root: impl Into<PathBuf>, lines: BTreeMap<u8, u32>) -> Self {
        Self {
            root: root.into(),
            lines,
            pins: BTreeMap::new(),
        }
    }

    fn line_dir(&self, line: u32) -> PathBuf {
        self.root.join(format!("gpio{line}"))
    }

    fn line_of(&self, pin: u8) -> Result<u32, PinError> {
        self.lines.get(&pin).copied().ok_or_else(|| PinError::Pin {
            pin,
            reason: "no kernel GPIO line mapped to this header pin".into(),
        })
    }

    fn write_attr(path: &Path, value: &str, pin: u8) -> Result<(), PinError> {
        fs::write(path, value).map_err(|e| PinError::Pin {
            pin,
            reason: format!("{}: {e}", path.display()),
        })
    }

    fn release_pin(&self, pin: u8, line: u32) -> Result<(), PinError> {
        let lowered = Self::write_attr(&self.line_dir(line).join("value"), "0", pin);
        let unexported = Self::write_attr(&self.root.join("unexport"), &line.to_string(), pin);
        lowered.and(unexported)
    }
}

impl PinDriver for SysfsPinDriver {
    fn configure(&mut self, pins: &[u8], mode: PinMode) -> Result<(), PinError> {
        let direction = match mode {
            PinMode::Output => "out",
            PinMode::Input => "in",
        };
        for &pin in pins {
            let line = self.line_of(pin)?;
            if !self.line_dir(line).exists() {
                Self::write_attr(&self.root.join("export"), &line.to_string(), pin)?;
                debug!("exported gpio{line} for header pin {pin}");
            }
            Self::write_attr(&self.line_dir(line).join("direction"), direction, pin)?;
            self.pins.insert(pin, ConfiguredPin { line, last: None });
        }
        info!("configured {} GPIO pins as {direction}", pins.len());
        Ok(())
    }

    fn write(&mut self, pins: &[u8], values: &[u8]) -> Result<(), PinError> {
        if pins.len() != values.len() {
            return Err(PinError::LengthMismatch {
                pins: pins.len(),
                values: values.len(),
            });
        }
        for (&pin, &value) in pins.iter().zip(values) {
            let level = u8::from(value != 0);
            let configured = self.pins.get(&pin).copied().ok_or_else(|| PinError::Pin {
                pin,
                reason: "not configured".into(),
            })?;
            if configured.last == Some(level) {
                continue;
            }
            let path = self.line_dir(configured.line).join("value");
            Self::write_attr(&path, if level == 1 { "1" } else { "0" }, pin)?;
            self.pins.insert(
                pin,
                ConfiguredPin {
                    last: Some(level),
                    ..configured
                },
            );
        }
        Ok(())
    }

    /// Releases every pin even when some fail; the first failure is returned.
    fn release_all(&mut self) -> Result<(), PinError> {
        let pins = std::mem::take(&mut self.pins);
        let mut first_error = None;
        for (&pin, configured) in &pins {
            if let Err(e) = self.release_pin(pin, configured.line) {
                warn!("releasing header pin {pin}: {e}");
                first_error.get_or_insert(e);
            }
        }
        info!("released {} GPIO pins", pins.len());
        first_error.map_or(Ok(()), Err)
    }
}
