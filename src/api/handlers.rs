use std::sync::Arc;
use axum::{extract::{State, Path, Query, Multipart}, http::{StatusCode, header}, Json, response::IntoResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn, error};
use crate::{AppState, db, storage};
use crate::error::ErrorKind;

const WELCOME: &str = "Facial Attendance System API is running!\n\n\
Available endpoints:\n\
• GET /api/face/capture/{userId}/{numImages} - Capture training images\n\
• GET /api/face/train - Train the face recognition model\n\
• GET /api/face/mark-attendance - Mark attendance from camera\n\
• POST /api/face/mark-attendance-from-image - Mark attendance from uploaded image\n\
• POST /api/face/upload-menu-image/{userId} - Upload menu image\n\
• GET /api/face/menu-images/{userId}/view/{imageName} - View menu images\n\
• GET /api/face/clear-images/{userId} - Clear training images\n\
• GET /api/face/attendance?date=YYYY-MM-DD - List attendance records\n";

/// HTTP status for a failed operation of the given kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidImage => StatusCode::BAD_REQUEST,
        ErrorKind::ModelNotFound => StatusCode::CONFLICT,
        ErrorKind::NoTrainingData => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::CameraUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ClassifierLoadFailure | ErrorKind::PersistenceFailure | ErrorKind::Vision | ErrorKind::Io => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({"status": "error", "message": message.into()})))
}

pub async fn welcome() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], WELCOME)
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": "SQLite",
        "vision_backend": state.vision.name(),
        "model_present": state.paths.model_path.is_file(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    });
    (StatusCode::OK, Json(body))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pool = state.pool.clone();
    let total_records = tokio::task::spawn_blocking(move || {
        let conn = pool.get().ok()?;
        db::query::count_attendance(&conn).ok()
    })
    .await
    .ok()
    .flatten()
    .unwrap_or(0);

    let s = &state.stats;
    let body = json!({
        "uptime_secs": s.uptime_secs(),
        "evaluations": s.evaluations(),
        "outcomes": {
            "marked": s.marked(),
            "already_marked": s.already_marked(),
            "face_not_recognized": s.not_recognized(),
            "no_face_detected": s.no_face(),
            "failed": s.failed(),
        },
        "trainings": s.trainings(),
        "images_captured": s.images_captured(),
        "secs_since_last_outcome": s.secs_since_last_outcome(),
        "attendance_records": total_records,
    });
    (StatusCode::OK, Json(body))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.stats.metrics_text();
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[derive(Deserialize)]
pub struct AttendanceQuery {
    pub date: Option<String>,
}

pub async fn list_attendance(State(state): State<Arc<AppState>>, Query(q): Query<AttendanceQuery>) -> impl IntoResponse {
    let date = match q.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => match NaiveDate::parse_from_str(d, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => return json_error(StatusCode::BAD_REQUEST, format!("invalid date: {}", d)),
        },
        None => None,
    };
    let pool = state.pool.clone();
    let res = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let conn = pool.get()?;
        db::query::list_attendance(&conn, date)
    })
    .await;
    match res {
        Ok(Ok(records)) => {
            let items: Vec<_> = records
                .into_iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "user_id": r.user_id,
                        "name": state.users.name_of(r.user_id),
                        "date": r.date,
                        "time": r.time.format("%H:%M:%S").to_string(),
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({"status": "ok", "count": items.len(), "items": items})))
        }
        Ok(Err(e)) => {
            error!("attendance list failed: {:?}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn upload_menu_image(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let bytes = match read_field(&mut multipart, "menuImage").await {
        Ok(Some(b)) => b,
        Ok(None) => return json_error(StatusCode::BAD_REQUEST, "missing multipart field 'menuImage'"),
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, msg),
    };
    if bytes.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "menu image is empty");
    }
    let menu_dir = state.paths.menu_dir.clone();
    let now = state.clock.local_now();
    let res = tokio::task::spawn_blocking(move || storage::save_menu_image(&menu_dir, user_id, &bytes, now)).await;
    match res {
        Ok(Ok(path)) => {
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "message": format!("Menu img uploaded successfully: {}", path.display()),
                    "file_name": file_name,
                })),
            )
        }
        Ok(Err(e)) => {
            error!("menu upload failed: {:?}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error uploading menu image: {}", e))
        }
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn view_menu_image(
    State(state): State<Arc<AppState>>,
    Path((user_id, image_name)): Path<(i32, String)>,
) -> axum::response::Response {
    let Some(path) = storage::resolve_menu_image(&state.paths.menu_dir, user_id, &image_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream().to_string();
            let disposition = format!("inline; filename=\"{}\"", image_name);
            (StatusCode::OK, [(header::CONTENT_TYPE, mime), (header::CONTENT_DISPOSITION, disposition)], bytes).into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "menu image read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn clear_images(State(state): State<Arc<AppState>>, Path(user_id): Path<i32>) -> impl IntoResponse {
    let training_dir = state.paths.training_dir.clone();
    let res = tokio::task::spawn_blocking(move || storage::clear_training_images(&training_dir, user_id)).await;
    match res {
        Ok(Ok(Some(removed))) => {
            info!(user_id, removed, "training images cleared");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "message": format!("Images for user {} have been deleted.", user_id),
                    "removed": removed,
                })),
            )
        }
        Ok(Ok(None)) => json_error(StatusCode::NOT_FOUND, format!("Folder not found for user: {}", user_id)),
        Ok(Err(e)) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Bytes of the first multipart field called `name`, if any.
pub(crate) async fn read_field(multipart: &mut Multipart, name: &str) -> Result<Option<Vec<u8>>, String> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => return Ok(None),
            Err(e) => return Err(format!("invalid multipart body: {}", e)),
        };
        if field.name() == Some(name) {
            return field
                .bytes()
                .await
                .map(|b| Some(b.to_vec()))
                .map_err(|e| format!("failed to read field '{}': {}", name, e));
        }
    }
}
