use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("model not found at {}, train first via /api/face/train", .0.display())]
    ModelNotFound(PathBuf),
    #[error("failed to load face classifier: {0}")]
    ClassifierLoadFailure(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("no valid training images found")]
    NoTrainingData,
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("vision library error: {0}")]
    Vision(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Serializable discriminant of [`AttendanceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CameraUnavailable,
    ModelNotFound,
    ClassifierLoadFailure,
    InvalidImage,
    NoTrainingData,
    PersistenceFailure,
    Timeout,
    Vision,
    Io,
}

impl AttendanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CameraUnavailable(_) => ErrorKind::CameraUnavailable,
            Self::ModelNotFound(_) => ErrorKind::ModelNotFound,
            Self::ClassifierLoadFailure(_) => ErrorKind::ClassifierLoadFailure,
            Self::InvalidImage(_) => ErrorKind::InvalidImage,
            Self::NoTrainingData => ErrorKind::NoTrainingData,
            Self::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Vision(_) => ErrorKind::Vision,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = AttendanceError> = std::result::Result<T, E>;
