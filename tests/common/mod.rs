#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use face_attend::db;
use face_attend::error::{AttendanceError, Result};
use face_attend::pipeline::camera::{Camera, CameraSource};
use face_attend::pipeline::clock::Clock;
use face_attend::pipeline::recognize::CandidatePolicy;
use face_attend::pipeline::region::FaceRect;
use face_attend::pipeline::vision::{FaceDetector, FaceRecognizer, Prediction, TrainingSample, VisionBackend};
use face_attend::utils::config::Config;
use face_attend::AppState;
use image::{GrayImage, Luma};
use parking_lot::Mutex;
use rusqlite::Connection;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Create a temporary SQLite database for testing
pub fn setup_test_db() -> (TempDir, PathBuf, Connection) {
    let tmp = TempDir::new().unwrap();
    let db_dir = tmp.path().join("db");
    std::fs::create_dir_all(&db_dir).unwrap();
    let db_path = db_dir.join("attendance.db");
    let conn = db::open_or_create(&db_path).unwrap();
    (tmp, db_path, conn)
}

pub fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(9, 15, 30).unwrap()
}

/// Gray PNG bytes of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_pixel(width, height, Luma([128]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .unwrap();
    buf
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::write(path, png_bytes(width, height)).unwrap();
}

/// Vision stub: every detection returns `faces`, every prediction returns
/// the next entry of `predictions` (the last one repeats).
#[derive(Clone, Default)]
pub struct StubVision {
    pub faces: Arc<Mutex<Vec<FaceRect>>>,
    pub predictions: Arc<Mutex<Vec<Prediction>>>,
    pub predict_calls: Arc<AtomicUsize>,
    pub trained_labels: Arc<Mutex<Vec<i32>>>,
}

impl StubVision {
    pub fn new(faces: Vec<FaceRect>, predictions: Vec<Prediction>) -> Self {
        let v = Self::default();
        *v.faces.lock() = faces;
        *v.predictions.lock() = predictions;
        v
    }

    pub fn one_face(label: i32, confidence: f64) -> Self {
        Self::new(vec![FaceRect::new(10, 10, 40, 40)], vec![Prediction { label, confidence }])
    }
}

struct StubDetector(Arc<Mutex<Vec<FaceRect>>>);

impl FaceDetector for StubDetector {
    fn detect_faces(&mut self, _image: &GrayImage) -> Result<Vec<FaceRect>> {
        Ok(self.0.lock().clone())
    }
}

struct StubRecognizer(StubVision);

impl FaceRecognizer for StubRecognizer {
    fn predict(&self, _region: &GrayImage) -> Result<Prediction> {
        let n = self.0.predict_calls.fetch_add(1, Ordering::SeqCst);
        let preds = self.0.predictions.lock();
        preds
            .get(n)
            .or_else(|| preds.last())
            .copied()
            .ok_or_else(|| AttendanceError::Vision("no prediction scripted".to_string()))
    }

    fn train(&mut self, samples: &[TrainingSample]) -> Result<()> {
        self.0.trained_labels.lock().extend(samples.iter().map(|s| s.label));
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        std::fs::read(path)?;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, b"<model/>")?;
        Ok(())
    }
}

impl VisionBackend for StubVision {
    fn load_detector(&self) -> Result<Box<dyn FaceDetector>> {
        Ok(Box::new(StubDetector(self.faces.clone())))
    }

    fn new_recognizer(&self) -> Result<Box<dyn FaceRecognizer>> {
        Ok(Box::new(StubRecognizer(self.clone())))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Camera stub handing out `frames` in order. Counts opens and releases.
#[derive(Clone, Default)]
pub struct StubCamera {
    pub frames: Arc<Mutex<VecDeque<GrayImage>>>,
    pub unavailable: bool,
    pub opens: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
}

impl StubCamera {
    pub fn with_frames(n: usize) -> Self {
        let cam = Self::default();
        cam.frames.lock().extend((0..n).map(|_| GrayImage::from_pixel(120, 90, Luma([90]))));
        cam
    }

    pub fn unavailable() -> Self {
        Self { unavailable: true, ..Default::default() }
    }
}

struct StubDevice(StubCamera);

impl Camera for StubDevice {
    fn poll_frame(&mut self) -> Result<Option<GrayImage>> {
        Ok(self.0.frames.lock().pop_front())
    }

    fn release(&mut self) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl CameraSource for StubCamera {
    fn open(&self) -> Result<Box<dyn Camera>> {
        if self.unavailable {
            return Err(AttendanceError::CameraUnavailable("stub camera offline".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubDevice(self.clone())))
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly.
pub struct ManualClock {
    state: Mutex<(NaiveDateTime, Duration)>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { state: Mutex::new((start, Duration::ZERO)) }
    }

    pub fn set_local(&self, now: NaiveDateTime) {
        self.state.lock().0 = now;
    }
}

impl Clock for ManualClock {
    fn local_now(&self) -> NaiveDateTime {
        self.state.lock().0
    }

    fn monotonic(&self) -> Duration {
        self.state.lock().1
    }

    fn sleep(&self, d: Duration) {
        let mut s = self.state.lock();
        s.0 += chrono::Duration::from_std(d).unwrap();
        s.1 += d;
    }
}

/// Config rooted in `data`, with short timeouts for tests.
pub fn test_config(data: &Path) -> Config {
    Config {
        data: data.to_path_buf(),
        port: 0,
        training_dir: data.join("training_images"),
        menu_dir: data.join("menu_images"),
        model_path: data.join("trained_faces").join("lbph_model.xml"),
        cascade_path: data.join("haarcascade_frontalface_alt.xml"),
        camera_index: 0,
        camera_threshold: 98.0,
        upload_threshold: 80.0,
        camera_policy: CandidatePolicy::FirstAccepted,
        upload_policy: CandidatePolicy::FirstAccepted,
        face_margin: 10,
        train_margin: 0,
        face_size: 160,
        capture_interval: Duration::from_millis(500),
        frame_timeout: Duration::from_millis(200),
        capture_timeout: Duration::from_secs(30),
        user_names: "1=Asha Verma;2=Rohit Sharma".to_string(),
        max_upload_bytes: 4 * 1024 * 1024,
        max_capture_images: 50,
    }
}

pub struct TestApp {
    pub tmp: TempDir,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new(vision: StubVision, camera: StubCamera) -> Self {
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(tmp.path());
        std::fs::create_dir_all(cfg.db_path().parent().unwrap()).unwrap();
        let pool = db::create_pool(cfg.db_path(), 4).unwrap();
        let clock = Arc::new(ManualClock::new(monday_morning()));
        let state = Arc::new(AppState::new(cfg, pool, Arc::new(vision), Box::new(camera), clock.clone()));
        Self { tmp, state, clock }
    }

    /// Pretend a model has been trained.
    pub fn install_model(&self) {
        let model = &self.state.paths.model_path;
        std::fs::create_dir_all(model.parent().unwrap()).unwrap();
        std::fs::write(model, b"<model/>").unwrap();
    }

    /// Serve the router on an ephemeral port and return its base URL.
    pub async fn spawn(&self) -> String {
        let app = face_attend::api::routes::router(self.state.clone());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://127.0.0.1:{}", port)
    }
}

pub fn image_form(field: &str, bytes: Vec<u8>, file_name: &str) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
    reqwest::multipart::Form::new().part(field.to_string(), part)
}
