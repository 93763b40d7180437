//! OpenCV-backed vision and camera: Haar cascade detection, LBPH
//! recognition and `VideoCapture` frames.

use image::GrayImage;
use opencv::core::{AlgorithmTraitConst, Mat, Ptr, Rect, Size, Vector};
use opencv::face::{FaceRecognizerTrait, FaceRecognizerTraitConst, LBPHFaceRecognizer};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{AttendanceError, Result};
use crate::pipeline::camera::{Camera, CameraSource};
use crate::pipeline::region::FaceRect;
use crate::pipeline::vision::{FaceDetector, FaceRecognizer, Prediction, TrainingSample, VisionBackend};

// LBPH parameters: radius, neighbors, grid_x, grid_y. No internal threshold,
// acceptance is decided by the pipeline.
const LBPH_RADIUS: i32 = 1;
const LBPH_NEIGHBORS: i32 = 8;
const LBPH_GRID: i32 = 8;

// detectMultiScale defaults.
const SCALE_FACTOR: f64 = 1.1;
const MIN_NEIGHBORS: i32 = 3;

fn cv(e: opencv::Error) -> AttendanceError {
    AttendanceError::Vision(e.to_string())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| AttendanceError::Vision(format!("path is not valid UTF-8: {}", path.display())))
}

fn gray_to_mat(image: &GrayImage) -> Result<Mat> {
    let view = Mat::from_slice_rows_cols(image.as_raw(), image.height() as usize, image.width() as usize).map_err(cv)?;
    view.try_clone().map_err(cv)
}

fn mat_to_gray(mat: &Mat) -> Result<GrayImage> {
    let gray = if mat.channels() > 1 {
        let mut out = Mat::default();
        imgproc::cvt_color_def(mat, &mut out, imgproc::COLOR_BGR2GRAY).map_err(cv)?;
        out
    } else {
        mat.try_clone().map_err(cv)?
    };
    let (rows, cols) = (gray.rows(), gray.cols());
    let bytes = gray.data_bytes().map_err(cv)?.to_vec();
    GrayImage::from_raw(cols as u32, rows as u32, bytes)
        .ok_or_else(|| AttendanceError::InvalidImage(format!("unexpected frame layout {}x{}", cols, rows)))
}

pub struct OpenCvVision {
    cascade_path: PathBuf,
}

impl OpenCvVision {
    pub fn new(cascade_path: PathBuf) -> Self {
        Self { cascade_path }
    }
}

impl VisionBackend for OpenCvVision {
    fn load_detector(&self) -> Result<Box<dyn FaceDetector>> {
        if !self.cascade_path.is_file() {
            return Err(AttendanceError::ClassifierLoadFailure(format!(
                "Haar cascade not found at {}",
                self.cascade_path.display()
            )));
        }
        let classifier = CascadeClassifier::new(path_str(&self.cascade_path)?)
            .map_err(|e| AttendanceError::ClassifierLoadFailure(e.to_string()))?;
        if classifier.empty().map_err(cv)? {
            return Err(AttendanceError::ClassifierLoadFailure(format!(
                "Haar cascade at {} is empty",
                self.cascade_path.display()
            )));
        }
        Ok(Box::new(HaarDetector { classifier }))
    }

    fn new_recognizer(&self) -> Result<Box<dyn FaceRecognizer>> {
        let inner = LBPHFaceRecognizer::create(LBPH_RADIUS, LBPH_NEIGHBORS, LBPH_GRID, LBPH_GRID, f64::MAX).map_err(cv)?;
        Ok(Box::new(LbphRecognizer { inner }))
    }

    fn name(&self) -> &'static str {
        "opencv"
    }
}

struct HaarDetector {
    classifier: CascadeClassifier,
}

impl FaceDetector for HaarDetector {
    fn detect_faces(&mut self, image: &GrayImage) -> Result<Vec<FaceRect>> {
        let mat = gray_to_mat(image)?;
        let mut faces = Vector::<Rect>::new();
        self.classifier
            .detect_multi_scale(&mat, &mut faces, SCALE_FACTOR, MIN_NEIGHBORS, 0, Size::default(), Size::default())
            .map_err(cv)?;
        Ok(faces.iter().map(|r| FaceRect::new(r.x, r.y, r.width, r.height)).collect())
    }
}

struct LbphRecognizer {
    inner: Ptr<LBPHFaceRecognizer>,
}

impl FaceRecognizer for LbphRecognizer {
    fn predict(&self, region: &GrayImage) -> Result<Prediction> {
        let mat = gray_to_mat(region)?;
        let mut label = -1i32;
        let mut confidence = 0f64;
        FaceRecognizerTraitConst::predict(&self.inner, &mat, &mut label, &mut confidence).map_err(cv)?;
        Ok(Prediction { label, confidence })
    }

    fn train(&mut self, samples: &[TrainingSample]) -> Result<()> {
        let mut images = Vector::<Mat>::with_capacity(samples.len());
        let mut labels = Vector::<i32>::with_capacity(samples.len());
        for sample in samples {
            images.push(gray_to_mat(&sample.region)?);
            labels.push(sample.label);
        }
        FaceRecognizerTrait::train(&mut self.inner, &images, &labels).map_err(cv)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        FaceRecognizerTrait::read(&mut self.inner, path_str(path)?).map_err(cv)
    }

    fn save(&self, path: &Path) -> Result<()> {
        AlgorithmTraitConst::save(&self.inner, path_str(path)?).map_err(cv)
    }
}

pub struct OpenCvCameraSource {
    index: i32,
}

impl OpenCvCameraSource {
    pub fn new(index: i32) -> Self {
        Self { index }
    }
}

impl CameraSource for OpenCvCameraSource {
    fn open(&self) -> Result<Box<dyn Camera>> {
        let capture = videoio::VideoCapture::new(self.index, videoio::CAP_ANY)
            .map_err(|e| AttendanceError::CameraUnavailable(e.to_string()))?;
        if !capture.is_opened().map_err(cv)? {
            return Err(AttendanceError::CameraUnavailable(format!("can't access camera {}", self.index)));
        }
        info!(index = self.index, "camera opened");
        Ok(Box::new(OpenCvCamera { capture }))
    }
}

struct OpenCvCamera {
    capture: videoio::VideoCapture,
}

impl Camera for OpenCvCamera {
    fn poll_frame(&mut self) -> Result<Option<GrayImage>> {
        let mut frame = Mat::default();
        let grabbed = self.capture.read(&mut frame).map_err(cv)?;
        if !grabbed || frame.rows() == 0 || frame.cols() == 0 {
            return Ok(None);
        }
        mat_to_gray(&frame).map(Some)
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(error = %e, "failed to release camera");
        }
    }
}
