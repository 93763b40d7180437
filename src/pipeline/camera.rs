//! Camera access: a polling frame interface plus an exclusive lease that
//! guarantees the device is released exactly once.

use image::GrayImage;
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AttendanceError, Result};
use crate::pipeline::clock::Clock;

pub trait Camera: Send {
    /// Non-blocking read. `Ok(None)` means no frame is ready yet.
    fn poll_frame(&mut self) -> Result<Option<GrayImage>>;
    fn release(&mut self);
}

pub trait CameraSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn Camera>>;
}

/// Source for builds without a camera backend.
#[derive(Debug, Default, Clone)]
pub struct NoCamera;

impl CameraSource for NoCamera {
    fn open(&self) -> Result<Box<dyn Camera>> {
        Err(AttendanceError::CameraUnavailable(
            "no camera backend compiled in (build with --features opencv)".to_string(),
        ))
    }
}

/// Serializes camera use across requests. Only one lease exists at a time.
pub struct CameraGate {
    source: Box<dyn CameraSource>,
    lock: Mutex<()>,
}

impl CameraGate {
    pub fn new(source: Box<dyn CameraSource>) -> Self {
        Self { source, lock: Mutex::new(()) }
    }

    /// Wait up to `wait` for exclusive access, then open the device.
    pub fn acquire(&self, wait: Duration) -> Result<CameraLease<'_>> {
        let guard = self
            .lock
            .try_lock_for(wait)
            .ok_or_else(|| AttendanceError::CameraUnavailable("camera is busy".to_string()))?;
        let camera = self.source.open()?;
        debug!("camera acquired");
        Ok(CameraLease { camera: Some(camera), _guard: guard })
    }
}

pub struct CameraLease<'a> {
    camera: Option<Box<dyn Camera>>,
    _guard: MutexGuard<'a, ()>,
}

impl CameraLease<'_> {
    /// Poll until a frame arrives or `timeout` elapses on `clock`.
    pub fn next_frame(&mut self, clock: &dyn Clock, timeout: Duration, poll: Duration) -> Result<GrayImage> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| AttendanceError::CameraUnavailable("camera already released".to_string()))?;
        let deadline = clock.monotonic() + timeout;
        loop {
            if let Some(frame) = camera.poll_frame()? {
                if frame.width() == 0 || frame.height() == 0 {
                    return Err(AttendanceError::InvalidImage("camera returned an empty frame".to_string()));
                }
                return Ok(frame);
            }
            if clock.monotonic() >= deadline {
                warn!(timeout_ms = timeout.as_millis() as u64, "camera produced no frame");
                return Err(AttendanceError::Timeout(format!(
                    "no camera frame within {} ms",
                    timeout.as_millis()
                )));
            }
            clock.sleep(poll);
        }
    }
}

impl Drop for CameraLease<'_> {
    fn drop(&mut self) {
        // Release before the guard field drops so the next lease sees a closed device.
        if let Some(mut camera) = self.camera.take() {
            camera.release();
            debug!("camera released");
        }
    }
}

/// Interval between polls while waiting for a frame.
pub const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(10);
