use std::sync::Arc;
use axum::{extract::{State, Path, Multipart}, http::StatusCode, Json};
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, info};
use crate::AppState;
use crate::api::handlers::{json_error, read_field, status_for};
use crate::error::AttendanceError;
use crate::models::attendance::Outcome;
use crate::pipeline::{capture, train};

/// JSON body for a recognition outcome; failures carry their kind's status.
fn outcome_response(state: &AppState, outcome: &Outcome) -> (StatusCode, Json<serde_json::Value>) {
    state.stats.record_outcome(outcome);
    let mut body = serde_json::to_value(outcome).unwrap_or_else(|_| json!({}));
    body["message"] = json!(outcome.message(&state.users));
    if let Some(user_id) = outcome.user_id() {
        body["name"] = json!(state.users.name_of(user_id));
    }
    let status = match outcome {
        Outcome::Failed { kind, .. } => status_for(*kind),
        _ => StatusCode::OK,
    };
    (status, Json(body))
}

fn failure_response(prefix: &str, err: &AttendanceError) -> (StatusCode, Json<serde_json::Value>) {
    let kind = err.kind();
    (
        status_for(kind),
        Json(json!({"status": "failed", "kind": kind, "message": format!("{}: {}", prefix, err)})),
    )
}

pub async fn mark_attendance(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let st = state.clone();
    let res = tokio::task::spawn_blocking(move || {
        st.recognizer().recognize_from_camera(&st.camera, st.config.frame_timeout, &st.camera_settings())
    })
    .await;
    match res {
        Ok(outcome) => outcome_response(&state, &outcome),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn mark_attendance_from_image(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> impl IntoResponse {
    let bytes = match read_field(&mut multipart, "image").await {
        Ok(Some(b)) => b,
        Ok(None) => return json_error(StatusCode::BAD_REQUEST, "missing multipart field 'image'"),
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, msg),
    };
    let st = state.clone();
    let res = tokio::task::spawn_blocking(move || st.recognizer().recognize_upload(&bytes, &st.upload_settings())).await;
    match res {
        Ok(outcome) => outcome_response(&state, &outcome),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn train_model(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let st = state.clone();
    let res = tokio::task::spawn_blocking(move || {
        train::train_model(st.vision.as_ref(), &st.paths.training_dir, &st.paths.model_path, &st.training_settings())
    })
    .await;
    match res {
        Ok(Ok(report)) => {
            state.stats.inc_trainings();
            let file_name = report
                .model_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "message": format!("Model trained and saved as {}", file_name),
                    "report": report,
                })),
            )
        }
        Ok(Err(e)) => {
            error!("training failed: {}", e);
            failure_response("Training error", &e)
        }
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn capture_images(
    State(state): State<Arc<AppState>>,
    Path((user_id, num_images)): Path<(i32, i64)>,
) -> impl IntoResponse {
    let max = state.config.max_capture_images;
    let count = match usize::try_from(num_images) {
        Ok(n) if (1..=max).contains(&n) => n,
        _ => return json_error(StatusCode::BAD_REQUEST, format!("numImages must be between 1 and {}", max)),
    };
    let st = state.clone();
    let res = tokio::task::spawn_blocking(move || {
        capture::capture_training_images(
            &st.camera,
            st.vision.as_ref(),
            st.clock.as_ref(),
            &st.paths.training_dir,
            user_id,
            &st.capture_settings(count),
        )
    })
    .await;
    match res {
        Ok(Ok(report)) => {
            state.stats.inc_images_captured(report.saved.len() as u64);
            info!(user_id, saved = report.saved.len(), "capture request complete");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "message": format!("Captured {} images for user{}", report.saved.len(), user_id),
                    "report": report,
                })),
            )
        }
        Ok(Err(e)) => {
            error!(user_id, "capture failed: {}", e);
            failure_response("Capture error", &e)
        }
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
