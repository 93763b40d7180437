use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AttendanceError, Result};
use crate::models::attendance::CaptureReport;
use crate::pipeline::camera::{CameraGate, FRAME_POLL_INTERVAL};
use crate::pipeline::clock::Clock;
use crate::pipeline::region;
use crate::pipeline::vision::VisionBackend;
use crate::utils::path::user_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub count: usize,
    /// Delay between samples, keeps the detector from running flat out.
    pub interval: Duration,
    pub frame_timeout: Duration,
    pub session_timeout: Duration,
    pub margin: i32,
    pub face_size: u32,
}

/// Sample camera frames until `settings.count` face crops have been saved as
/// `<training_dir>/user<N>/image<k>.jpg`.
pub fn capture_training_images(
    gate: &CameraGate,
    vision: &dyn VisionBackend,
    clock: &dyn Clock,
    training_dir: &Path,
    user_id: i32,
    settings: &CaptureSettings,
) -> Result<CaptureReport> {
    let mut lease = gate.acquire(settings.frame_timeout)?;
    let mut detector = vision.load_detector()?;

    let out_dir = user_dir(training_dir, user_id);
    std::fs::create_dir_all(&out_dir)?;

    let started = clock.monotonic();
    let mut saved = Vec::new();
    let mut frames_sampled = 0usize;

    while saved.len() < settings.count {
        if clock.monotonic().saturating_sub(started) >= settings.session_timeout {
            return Err(AttendanceError::Timeout(format!(
                "captured {} of {} images for user{} before the session timed out",
                saved.len(),
                settings.count,
                user_id
            )));
        }

        let frame = lease.next_frame(clock, settings.frame_timeout, FRAME_POLL_INTERVAL)?;
        frames_sampled += 1;
        let faces = detector.detect_faces(&frame)?;
        if let Some(first) = faces.first() {
            let face = region::normalize_region(&frame, *first, settings.margin, settings.face_size)?;
            let path = out_dir.join(format!("image{}.jpg", saved.len() + 1));
            face.save(&path).map_err(|e| AttendanceError::Io(std::io::Error::other(e)))?;
            debug!(path = %path.display(), "saved training image");
            saved.push(path);
            if saved.len() == settings.count {
                break;
            }
        }
        clock.sleep(settings.interval);
    }

    info!(user_id, saved = saved.len(), frames_sampled, "capture finished");
    Ok(CaptureReport { user_id, saved, frames_sampled })
}
