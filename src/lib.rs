pub mod utils;
pub mod error;
pub mod stats;
pub mod models;
pub mod db;
pub mod pipeline;
pub mod storage;
pub mod api;

use std::path::PathBuf;
use std::sync::Arc;

use models::attendance::UserDirectory;
use pipeline::camera::{CameraGate, CameraSource};
use pipeline::capture::CaptureSettings;
use pipeline::clock::Clock;
use pipeline::recognize::{RecognitionSettings, Recognizer};
use pipeline::train::TrainingSettings;
use pipeline::vision::VisionBackend;
use utils::config::Config;

#[derive(Clone)]
pub struct AppPaths {
    pub data: PathBuf,
    pub db_path: PathBuf,
    pub training_dir: PathBuf,
    pub menu_dir: PathBuf,
    pub model_path: PathBuf,
    pub cascade_path: PathBuf,
}

impl AppPaths {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            data: cfg.data.clone(),
            db_path: cfg.db_path(),
            training_dir: cfg.training_dir.clone(),
            menu_dir: cfg.menu_dir.clone(),
            model_path: cfg.model_path.clone(),
            cascade_path: cfg.cascade_path.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub started_at: std::time::Instant,
    pub paths: AppPaths,
    pub config: Config,
    pub stats: Arc<stats::Stats>,
    pub pool: db::Pool,
    pub store: Arc<db::SqliteStore>,
    pub vision: Arc<dyn VisionBackend>,
    pub camera: Arc<CameraGate>,
    pub clock: Arc<dyn Clock>,
    pub users: UserDirectory,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: db::Pool,
        vision: Arc<dyn VisionBackend>,
        camera: Box<dyn CameraSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            started_at: std::time::Instant::now(),
            paths: AppPaths::from_config(&config),
            users: config.user_directory(),
            stats: Arc::new(stats::Stats::new()),
            store: Arc::new(db::SqliteStore::new(pool.clone())),
            pool,
            vision,
            camera: Arc::new(CameraGate::new(camera)),
            clock,
            config,
        }
    }

    pub fn recognizer(&self) -> Recognizer<'_> {
        Recognizer::new(self.vision.as_ref(), self.store.as_ref(), self.clock.as_ref(), &self.paths.model_path)
    }

    pub fn camera_settings(&self) -> RecognitionSettings {
        RecognitionSettings {
            threshold: self.config.camera_threshold,
            margin: self.config.face_margin,
            face_size: self.config.face_size,
            policy: self.config.camera_policy,
        }
    }

    pub fn upload_settings(&self) -> RecognitionSettings {
        RecognitionSettings {
            threshold: self.config.upload_threshold,
            margin: self.config.face_margin,
            face_size: self.config.face_size,
            policy: self.config.upload_policy,
        }
    }

    pub fn training_settings(&self) -> TrainingSettings {
        TrainingSettings { margin: self.config.train_margin, face_size: self.config.face_size }
    }

    pub fn capture_settings(&self, count: usize) -> CaptureSettings {
        CaptureSettings {
            count,
            interval: self.config.capture_interval,
            frame_timeout: self.config.frame_timeout,
            session_timeout: self.config.capture_timeout,
            margin: self.config.train_margin,
            face_size: self.config.face_size,
        }
    }
}
