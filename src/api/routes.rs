use axum::{Router, routing::{get, post}, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, AllowOrigin};
use axum::http::Method;
use crate::AppState;
use crate::api::{handlers, handlers_face};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/metrics", get(handlers::metrics))
        .route("/api", get(handlers::welcome))
        .route("/api/face", get(handlers::welcome))
        .route("/api/face/", get(handlers::welcome))
        .route("/api/face/capture/:user_id/:num_images", get(handlers_face::capture_images))
        .route("/api/face/train", get(handlers_face::train_model))
        .route("/api/face/mark-attendance", get(handlers_face::mark_attendance))
        .route("/api/face/mark-attendance-from-image", post(handlers_face::mark_attendance_from_image))
        .route("/api/face/upload-menu-image/:user_id", post(handlers::upload_menu_image))
        .route("/api/face/menu-images/:user_id/view/:image_name", get(handlers::view_menu_image))
        .route("/api/face/clear-images/:user_id", get(handlers::clear_images))
        .route("/api/face/attendance", get(handlers::list_attendance))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}
