use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AttendanceError, ErrorKind};

/// One attendance mark. At most one exists per (user_id, date).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub user_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredAttendance {
    pub id: i64,
    pub user_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Terminal result of one recognition call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Marked { user_id: i32 },
    AlreadyMarked { user_id: i32 },
    FaceNotRecognized,
    NoFaceDetected,
    Failed { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn failed(err: &AttendanceError) -> Self {
        Outcome::Failed { kind: err.kind(), message: err.to_string() }
    }

    pub fn user_id(&self) -> Option<i32> {
        match self {
            Outcome::Marked { user_id } | Outcome::AlreadyMarked { user_id } => Some(*user_id),
            _ => None,
        }
    }

    pub fn message(&self, users: &UserDirectory) -> String {
        match self {
            Outcome::Marked { user_id } => {
                format!("Attendance marked for: {} (ID: {})", users.name_of(*user_id), user_id)
            }
            Outcome::AlreadyMarked { user_id } => format!("Already marked today for User ID: {}", user_id),
            Outcome::FaceNotRecognized => "Face not recognized".to_string(),
            Outcome::NoFaceDetected => "No face detected".to_string(),
            Outcome::Failed { message, .. } => format!("Error: {}", message),
        }
    }
}

/// Display names for recognizer labels. Presentation only; the pipeline
/// never consults it.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    names: HashMap<i32, String>,
}

impl UserDirectory {
    pub fn new(names: HashMap<i32, String>) -> Self {
        Self { names }
    }

    /// Parse `1=Alice;2=Bob`. Malformed entries are ignored.
    pub fn parse(list: &str) -> Self {
        let names = list
            .split(';')
            .filter_map(|entry| {
                let (id, name) = entry.split_once('=')?;
                let id = id.trim().parse::<i32>().ok()?;
                let name = name.trim();
                if name.is_empty() { None } else { Some((id, name.to_string())) }
            })
            .collect();
        Self { names }
    }

    pub fn name_of(&self, user_id: i32) -> &str {
        self.names.get(&user_id).map(String::as_str).unwrap_or("Unknown")
    }

    pub fn len(&self) -> usize { self.names.len() }
    pub fn is_empty(&self) -> bool { self.names.is_empty() }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrainingReport {
    pub users: usize,
    pub samples: usize,
    pub skipped: usize,
    pub model_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureReport {
    pub user_id: i32,
    pub saved: Vec<PathBuf>,
    pub frames_sampled: usize,
}
