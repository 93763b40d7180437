//! Seam to the face detection / recognition library.
//!
//! Detection and recognition are opaque library capabilities. The pipeline
//! only sees grayscale images in and rectangles / (label, confidence) pairs
//! out, so the backing library can be swapped or faked.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AttendanceError, Result};
use crate::pipeline::region::FaceRect;

/// Recognizer output. Lower confidence means a closer match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: i32,
    pub confidence: f64,
}

/// A normalized face region and the user id it belongs to.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub region: GrayImage,
    pub label: i32,
}

pub trait FaceDetector {
    /// Candidate face rectangles in the detector's own order.
    fn detect_faces(&mut self, image: &GrayImage) -> Result<Vec<FaceRect>>;
}

pub trait FaceRecognizer {
    fn predict(&self, region: &GrayImage) -> Result<Prediction>;
    fn train(&mut self, samples: &[TrainingSample]) -> Result<()>;
    fn load(&mut self, path: &Path) -> Result<()>;
    fn save(&self, path: &Path) -> Result<()>;
}

/// Factory for detector and recognizer instances. Instances are created per
/// call and never shared across requests.
pub trait VisionBackend: Send + Sync {
    fn load_detector(&self) -> Result<Box<dyn FaceDetector>>;
    fn new_recognizer(&self) -> Result<Box<dyn FaceRecognizer>>;
    fn name(&self) -> &'static str;
}

/// Backend for builds without a vision library.
#[derive(Debug, Default, Clone)]
pub struct UnavailableVision;

impl VisionBackend for UnavailableVision {
    fn load_detector(&self) -> Result<Box<dyn FaceDetector>> {
        Err(AttendanceError::ClassifierLoadFailure(
            "no vision backend compiled in (build with --features opencv)".to_string(),
        ))
    }

    fn new_recognizer(&self) -> Result<Box<dyn FaceRecognizer>> {
        Err(AttendanceError::Vision(
            "no vision backend compiled in (build with --features opencv)".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-memory vision backend for unit tests.
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    pub struct Script {
        pub faces: Vec<FaceRect>,
        pub predictions: Vec<Prediction>,
        pub detector_fails: bool,
        pub predict_fails: bool,
        pub detect_calls: usize,
        pub predict_calls: usize,
        pub predicted_sizes: Vec<(u32, u32)>,
        pub trained: Vec<(u32, u32, i32)>,
    }

    #[derive(Clone, Default)]
    pub struct FakeVision {
        pub script: Arc<Mutex<Script>>,
    }

    impl FakeVision {
        pub fn with(faces: Vec<FaceRect>, predictions: Vec<Prediction>) -> Self {
            let v = Self::default();
            {
                let mut s = v.script.lock();
                s.faces = faces;
                s.predictions = predictions;
            }
            v
        }
    }

    struct Detector(Arc<Mutex<Script>>);
    struct Recognizer(Arc<Mutex<Script>>);

    impl FaceDetector for Detector {
        fn detect_faces(&mut self, _image: &GrayImage) -> Result<Vec<FaceRect>> {
            let mut s = self.0.lock();
            s.detect_calls += 1;
            Ok(s.faces.clone())
        }
    }

    impl FaceRecognizer for Recognizer {
        fn predict(&self, region: &GrayImage) -> Result<Prediction> {
            let mut s = self.0.lock();
            if s.predict_fails {
                return Err(AttendanceError::Vision("predict exploded".to_string()));
            }
            let idx = s.predict_calls;
            s.predict_calls += 1;
            s.predicted_sizes.push(region.dimensions());
            s.predictions
                .get(idx)
                .copied()
                .ok_or_else(|| AttendanceError::Vision("no scripted prediction".to_string()))
        }

        fn train(&mut self, samples: &[TrainingSample]) -> Result<()> {
            let mut s = self.0.lock();
            for sample in samples {
                s.trained.push((sample.region.width(), sample.region.height(), sample.label));
            }
            Ok(())
        }

        fn load(&mut self, path: &Path) -> Result<()> {
            std::fs::read(path)?;
            Ok(())
        }

        fn save(&self, path: &Path) -> Result<()> {
            std::fs::write(path, b"<lbph/>")?;
            Ok(())
        }
    }

    impl VisionBackend for FakeVision {
        fn load_detector(&self) -> Result<Box<dyn FaceDetector>> {
            if self.script.lock().detector_fails {
                return Err(AttendanceError::ClassifierLoadFailure("cascade missing".to_string()));
            }
            Ok(Box::new(Detector(self.script.clone())))
        }

        fn new_recognizer(&self) -> Result<Box<dyn FaceRecognizer>> {
            Ok(Box::new(Recognizer(self.script.clone())))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }
}
