use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::attendance::Outcome;

pub struct Stats {
    marked: AtomicU64,
    already_marked: AtomicU64,
    not_recognized: AtomicU64,
    no_face: AtomicU64,
    failed: AtomicU64,
    trainings: AtomicU64,
    images_captured: AtomicU64,
    started: Instant,
    last_outcome_at: parking_lot::Mutex<Option<Instant>>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            marked: AtomicU64::new(0),
            already_marked: AtomicU64::new(0),
            not_recognized: AtomicU64::new(0),
            no_face: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            trainings: AtomicU64::new(0),
            images_captured: AtomicU64::new(0),
            started: Instant::now(),
            last_outcome_at: parking_lot::Mutex::new(None),
        }
    }

    pub fn record_outcome(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Marked { .. } => &self.marked,
            Outcome::AlreadyMarked { .. } => &self.already_marked,
            Outcome::FaceNotRecognized => &self.not_recognized,
            Outcome::NoFaceDetected => &self.no_face,
            Outcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        *self.last_outcome_at.lock() = Some(Instant::now());
    }

    pub fn inc_trainings(&self) { self.trainings.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_images_captured(&self, n: u64) { self.images_captured.fetch_add(n, Ordering::Relaxed); }
    pub fn marked(&self) -> u64 { self.marked.load(Ordering::Relaxed) }
    pub fn already_marked(&self) -> u64 { self.already_marked.load(Ordering::Relaxed) }
    pub fn not_recognized(&self) -> u64 { self.not_recognized.load(Ordering::Relaxed) }
    pub fn no_face(&self) -> u64 { self.no_face.load(Ordering::Relaxed) }
    pub fn failed(&self) -> u64 { self.failed.load(Ordering::Relaxed) }
    pub fn trainings(&self) -> u64 { self.trainings.load(Ordering::Relaxed) }
    pub fn images_captured(&self) -> u64 { self.images_captured.load(Ordering::Relaxed) }
    pub fn uptime_secs(&self) -> u64 { self.started.elapsed().as_secs() }

    pub fn secs_since_last_outcome(&self) -> Option<u64> {
        self.last_outcome_at.lock().map(|t| t.elapsed().as_secs())
    }

    pub fn evaluations(&self) -> u64 {
        self.marked() + self.already_marked() + self.not_recognized() + self.no_face() + self.failed()
    }

    pub fn metrics_text(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("attend_uptime_seconds {}\n", self.uptime_secs()));
        s.push_str(&format!("attend_outcome_total{{outcome=\"marked\"}} {}\n", self.marked()));
        s.push_str(&format!("attend_outcome_total{{outcome=\"already_marked\"}} {}\n", self.already_marked()));
        s.push_str(&format!("attend_outcome_total{{outcome=\"face_not_recognized\"}} {}\n", self.not_recognized()));
        s.push_str(&format!("attend_outcome_total{{outcome=\"no_face_detected\"}} {}\n", self.no_face()));
        s.push_str(&format!("attend_outcome_total{{outcome=\"failed\"}} {}\n", self.failed()));
        s.push_str(&format!("attend_trainings_total {}\n", self.trainings()));
        s.push_str(&format!("attend_images_captured_total {}\n", self.images_captured()));
        s
    }
}
