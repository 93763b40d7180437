use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{AttendanceError, Result};
use crate::models::attendance::TrainingReport;
use crate::pipeline::region;
use crate::pipeline::vision::{TrainingSample, VisionBackend};
use crate::utils::path::{is_supported_image, parse_user_dir_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSettings {
    /// Margin around the detected face. Recognition pads its faces while
    /// training historically has not, so this defaults to 0.
    pub margin: i32,
    pub face_size: u32,
}

/// Build the training set from `<training_dir>/user<N>/*.{jpg,jpeg,png}`,
/// train a fresh recognizer on it and save the model to `model_path`.
pub fn train_model(
    vision: &dyn VisionBackend,
    training_dir: &Path,
    model_path: &Path,
    settings: &TrainingSettings,
) -> Result<TrainingReport> {
    if !training_dir.is_dir() {
        warn!(dir = %training_dir.display(), "training directory not found");
        return Err(AttendanceError::NoTrainingData);
    }
    let mut detector = vision.load_detector()?;

    let mut samples = Vec::new();
    let mut users = BTreeSet::new();
    let mut skipped = 0usize;

    let user_dirs = WalkDir::new(training_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for user_entry in user_dirs {
        let name = user_entry.file_name().to_string_lossy();
        let Some(user_id) = parse_user_dir_name(&name) else {
            warn!(dir = %user_entry.path().display(), "skipping directory without a user<N> name");
            continue;
        };

        let images = WalkDir::new(user_entry.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_supported_image(e.path()));

        for image_entry in images {
            let path = image_entry.path();
            let gray = match std::fs::read(path).map_err(AttendanceError::from).and_then(|b| region::decode_gray(&b)) {
                Ok(g) => g,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable training image");
                    skipped += 1;
                    continue;
                }
            };
            let faces = detector.detect_faces(&gray)?;
            let Some(first) = faces.first() else {
                debug!(path = %path.display(), "no face in training image");
                skipped += 1;
                continue;
            };
            match region::normalize_region(&gray, *first, settings.margin, settings.face_size) {
                Ok(face) => {
                    samples.push(TrainingSample { region: face, label: user_id });
                    users.insert(user_id);
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping training image");
                    skipped += 1;
                }
            }
        }
    }

    if samples.is_empty() {
        return Err(AttendanceError::NoTrainingData);
    }

    let mut recognizer = vision.new_recognizer()?;
    recognizer.train(&samples)?;
    if let Some(parent) = model_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    recognizer.save(model_path)?;
    info!(users = users.len(), samples = samples.len(), skipped, model = %model_path.display(), "model trained");

    Ok(TrainingReport { users: users.len(), samples: samples.len(), skipped, model_path: model_path.to_path_buf() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::region::FaceRect;
    use crate::pipeline::vision::fake::FakeVision;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn settings() -> TrainingSettings {
        TrainingSettings { margin: 0, face_size: 160 }
    }

    fn write_png(path: &Path) {
        GrayImage::from_pixel(64, 48, Luma([120])).save(path).unwrap();
    }

    #[test]
    fn empty_training_dir_has_no_training_data() {
        let tmp = TempDir::new().unwrap();
        let vision = FakeVision::with(vec![FaceRect::new(0, 0, 10, 10)], vec![]);
        let model = tmp.path().join("trained_faces/lbph_model.xml");
        let err = train_model(&vision, tmp.path(), &model, &settings()).unwrap_err();
        assert!(matches!(err, AttendanceError::NoTrainingData));
        assert!(!model.exists());
    }

    #[test]
    fn missing_training_dir_has_no_training_data() {
        let tmp = TempDir::new().unwrap();
        let vision = FakeVision::default();
        let err = train_model(&vision, &tmp.path().join("nope"), &tmp.path().join("m.xml"), &settings()).unwrap_err();
        assert!(matches!(err, AttendanceError::NoTrainingData));
    }

    #[test]
    fn trains_on_user_dirs_and_saves_model() {
        let tmp = TempDir::new().unwrap();
        let train_dir = tmp.path().join("training_images");
        for (user, n) in [(1, 2), (3, 1)] {
            let dir = train_dir.join(format!("user{}", user));
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..n {
                write_png(&dir.join(format!("image{}.png", i + 1)));
            }
        }
        std::fs::write(train_dir.join("user1/notes.txt"), "ignored").unwrap();
        std::fs::write(train_dir.join("user1/broken.jpg"), "NOT AN IMAGE").unwrap();
        std::fs::create_dir_all(train_dir.join("misc")).unwrap();
        write_png(&train_dir.join("misc/stray.png"));

        let vision = FakeVision::with(vec![FaceRect::new(8, 4, 30, 30)], vec![]);
        let model = tmp.path().join("trained_faces/lbph_model.xml");
        let report = train_model(&vision, &train_dir, &model, &settings()).unwrap();

        assert_eq!(report.users, 2);
        assert_eq!(report.samples, 3);
        assert_eq!(report.skipped, 1);
        assert!(model.is_file());
        let trained = vision.script.lock().trained.clone();
        assert_eq!(trained, vec![(160, 160, 1), (160, 160, 1), (160, 160, 3)]);
    }

    #[test]
    fn faceless_images_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("user2");
        std::fs::create_dir_all(&dir).unwrap();
        write_png(&dir.join("image1.png"));

        let vision = FakeVision::with(vec![], vec![]);
        let err = train_model(&vision, tmp.path(), &tmp.path().join("m.xml"), &settings()).unwrap_err();
        assert!(matches!(err, AttendanceError::NoTrainingData));
    }

    #[test]
    fn detector_failure_is_classifier_load_failure() {
        let tmp = TempDir::new().unwrap();
        let vision = FakeVision::default();
        vision.script.lock().detector_fails = true;
        let err = train_model(&vision, tmp.path(), &tmp.path().join("m.xml"), &settings()).unwrap_err();
        assert!(matches!(err, AttendanceError::ClassifierLoadFailure(_)));
    }
}
