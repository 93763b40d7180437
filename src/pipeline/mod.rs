pub mod camera;
pub mod capture;
pub mod clock;
#[cfg(feature = "opencv")]
pub mod opencv_backend;
pub mod recognize;
pub mod region;
pub mod train;
pub mod vision;

use std::path::Path;
use std::sync::Arc;

use camera::CameraSource;
use vision::VisionBackend;

/// Vision backend compiled into this build.
#[cfg(feature = "opencv")]
pub fn default_vision(cascade_path: &Path) -> Arc<dyn VisionBackend> {
    Arc::new(opencv_backend::OpenCvVision::new(cascade_path.to_path_buf()))
}

#[cfg(not(feature = "opencv"))]
pub fn default_vision(cascade_path: &Path) -> Arc<dyn VisionBackend> {
    tracing::warn!(cascade = %cascade_path.display(), "built without a vision backend; recognition and training are disabled");
    Arc::new(vision::UnavailableVision)
}

/// Camera source compiled into this build.
#[cfg(feature = "opencv")]
pub fn default_camera(index: i32) -> Box<dyn CameraSource> {
    Box::new(opencv_backend::OpenCvCameraSource::new(index))
}

#[cfg(not(feature = "opencv"))]
pub fn default_camera(index: i32) -> Box<dyn CameraSource> {
    tracing::warn!(index, "built without a camera backend; camera endpoints are disabled");
    Box::new(camera::NoCamera)
}
