use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::attendance::UserDirectory;
use crate::pipeline::recognize::CandidatePolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub data: PathBuf,
    pub port: u16,
    pub training_dir: PathBuf,
    pub menu_dir: PathBuf,
    pub model_path: PathBuf,
    pub cascade_path: PathBuf,
    pub camera_index: i32,
    pub camera_threshold: f64,
    pub upload_threshold: f64,
    pub camera_policy: CandidatePolicy,
    pub upload_policy: CandidatePolicy,
    pub face_margin: i32,
    pub train_margin: i32,
    pub face_size: u32,
    pub capture_interval: Duration,
    pub frame_timeout: Duration,
    pub capture_timeout: Duration,
    pub user_names: String,
    pub max_upload_bytes: usize,
    /// Upper bound for `numImages` on the capture endpoint.
    pub max_capture_images: usize,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let data = PathBuf::from(env::var("ATTEND_DATA").unwrap_or_else(|_| "./attend-data".to_string()));
        let port = env_parse("ATTEND_PORT", 9090);
        let training_dir = env_path("ATTEND_TRAINING_DIR", data.join("training_images"));
        let menu_dir = env_path("ATTEND_MENU_DIR", data.join("menu_images"));
        let model_path = env_path("ATTEND_MODEL_PATH", data.join("trained_faces").join("lbph_model.xml"));
        let cascade_path = env_path("ATTEND_CASCADE_PATH", data.join("haarcascade_frontalface_alt.xml"));
        let camera_policy = env::var("ATTEND_CAMERA_POLICY").ok().and_then(|v| v.parse().ok()).unwrap_or_default();
        let upload_policy = env::var("ATTEND_UPLOAD_POLICY").ok().and_then(|v| v.parse().ok()).unwrap_or_default();
        let max_upload_mb: usize = env_parse("ATTEND_MAX_UPLOAD_MB", 16);
        Self {
            port,
            training_dir,
            menu_dir,
            model_path,
            cascade_path,
            camera_index: env_parse("ATTEND_CAMERA_INDEX", 0),
            camera_threshold: env_parse("ATTEND_CAMERA_THRESHOLD", 98.0),
            upload_threshold: env_parse("ATTEND_UPLOAD_THRESHOLD", 80.0),
            camera_policy,
            upload_policy,
            face_margin: env_parse("ATTEND_FACE_MARGIN", 10),
            train_margin: env_parse("ATTEND_TRAIN_MARGIN", 0),
            face_size: env_parse("ATTEND_FACE_SIZE", 160),
            capture_interval: Duration::from_millis(env_parse("ATTEND_CAPTURE_INTERVAL_MS", 500)),
            frame_timeout: Duration::from_millis(env_parse("ATTEND_FRAME_TIMEOUT_MS", 5000)),
            capture_timeout: Duration::from_secs(env_parse("ATTEND_CAPTURE_TIMEOUT_SECS", 120)),
            user_names: env::var("ATTEND_USER_NAMES").unwrap_or_default(),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            max_capture_images: env_parse("ATTEND_MAX_CAPTURE_IMAGES", 200),
            data,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data.join("db").join("attendance.db")
    }

    pub fn user_directory(&self) -> UserDirectory {
        UserDirectory::parse(&self.user_names)
    }
}
