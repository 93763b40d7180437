//! Recognition pipeline: one image in, at most one attendance write out.

use chrono::{NaiveDate, Timelike};
use image::GrayImage;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AttendanceError, Result};
use crate::models::attendance::{AttendanceRecord, Outcome};
use crate::pipeline::camera::{CameraGate, FRAME_POLL_INTERVAL};
use crate::pipeline::clock::Clock;
use crate::pipeline::region::{self, FaceRect};
use crate::pipeline::vision::{FaceDetector, FaceRecognizer, VisionBackend};

/// Persistence seam for attendance marks.
pub trait AttendanceStore: Send + Sync {
    fn exists(&self, user_id: i32, date: NaiveDate) -> Result<bool>;
    /// Insert unless a record for (user_id, date) already exists.
    /// Returns `false` when the insert was skipped because of that conflict.
    fn insert(&self, record: &AttendanceRecord) -> Result<bool>;
}

/// Which detected faces are offered to the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidatePolicy {
    /// Try faces in detector order until one clears the threshold.
    #[default]
    FirstAccepted,
    /// Only the first detected face is considered.
    FirstDetected,
}

impl FromStr for CandidatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "first-accepted" | "all" => Ok(Self::FirstAccepted),
            "first-detected" | "first" => Ok(Self::FirstDetected),
            other => Err(format!("unknown candidate policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionSettings {
    /// A prediction is accepted only when `confidence < threshold`.
    pub threshold: f64,
    pub margin: i32,
    pub face_size: u32,
    pub policy: CandidatePolicy,
}

struct LoadedModels {
    detector: Box<dyn FaceDetector>,
    recognizer: Box<dyn FaceRecognizer>,
}

pub struct Recognizer<'a> {
    vision: &'a dyn VisionBackend,
    store: &'a dyn AttendanceStore,
    clock: &'a dyn Clock,
    model_path: &'a Path,
}

impl<'a> Recognizer<'a> {
    pub fn new(
        vision: &'a dyn VisionBackend,
        store: &'a dyn AttendanceStore,
        clock: &'a dyn Clock,
        model_path: &'a Path,
    ) -> Self {
        Self { vision, store, clock, model_path }
    }

    /// Run the pipeline on an already decoded grayscale image.
    pub fn evaluate(&self, image: &GrayImage, settings: &RecognitionSettings) -> Outcome {
        finish(self.load_models().and_then(|mut models| self.run(&mut models, image, settings)))
    }

    /// Upload path: decode the bytes, then evaluate.
    pub fn recognize_upload(&self, bytes: &[u8], settings: &RecognitionSettings) -> Outcome {
        let attempt = self.load_models().and_then(|mut models| {
            let image = region::decode_gray(bytes)?;
            debug!(width = image.width(), height = image.height(), "decoded upload");
            self.run(&mut models, &image, settings)
        });
        finish(attempt)
    }

    /// Camera path: take one frame from the camera and evaluate it. The
    /// lease is dropped (camera released) on every return path.
    pub fn recognize_from_camera(&self, gate: &CameraGate, frame_timeout: Duration, settings: &RecognitionSettings) -> Outcome {
        let attempt = gate.acquire(frame_timeout).and_then(|mut lease| {
            let mut models = self.load_models()?;
            let frame = lease.next_frame(self.clock, frame_timeout, FRAME_POLL_INTERVAL)?;
            debug!(width = frame.width(), height = frame.height(), "captured frame");
            self.run(&mut models, &frame, settings)
        });
        finish(attempt)
    }

    fn load_models(&self) -> Result<LoadedModels> {
        let detector = self.vision.load_detector()?;
        if !self.model_path.is_file() {
            return Err(AttendanceError::ModelNotFound(self.model_path.to_path_buf()));
        }
        let mut recognizer = self.vision.new_recognizer()?;
        recognizer.load(self.model_path)?;
        Ok(LoadedModels { detector, recognizer })
    }

    fn run(&self, models: &mut LoadedModels, image: &GrayImage, settings: &RecognitionSettings) -> Result<Outcome> {
        region::ensure_not_empty(image)?;
        let faces = models.detector.detect_faces(image)?;
        debug!(faces = faces.len(), "faces detected");
        if faces.is_empty() {
            return Ok(Outcome::NoFaceDetected);
        }
        let candidates: &[FaceRect] = match settings.policy {
            CandidatePolicy::FirstAccepted => &faces,
            CandidatePolicy::FirstDetected => &faces[..1],
        };
        for rect in candidates {
            let face = region::normalize_region(image, *rect, settings.margin, settings.face_size)?;
            let prediction = models.recognizer.predict(&face)?;
            info!(user_id = prediction.label, confidence = prediction.confidence, "predicted");
            // NaN never compares below the threshold, so it is rejected too.
            let accepted = prediction.confidence < settings.threshold;
            if !accepted {
                continue;
            }
            return self.commit(prediction.label);
        }
        Ok(Outcome::FaceNotRecognized)
    }

    fn commit(&self, user_id: i32) -> Result<Outcome> {
        let now = self.clock.local_now();
        let date = now.date();
        if self.store.exists(user_id, date)? {
            return Ok(Outcome::AlreadyMarked { user_id });
        }
        let time = now.time().with_nanosecond(0).unwrap_or_else(|| now.time());
        let record = AttendanceRecord { user_id, date, time };
        if self.store.insert(&record)? {
            Ok(Outcome::Marked { user_id })
        } else {
            // Lost the race against a concurrent mark between the check and the insert.
            warn!(user_id, %date, "attendance inserted concurrently");
            Ok(Outcome::AlreadyMarked { user_id })
        }
    }
}

fn finish(attempt: Result<Outcome>) -> Outcome {
    match attempt {
        Ok(outcome) => {
            info!(?outcome, "recognition finished");
            outcome
        }
        Err(e) => {
            warn!(error = %e, "recognition failed");
            Outcome::failed(&e)
        }
    }
}
