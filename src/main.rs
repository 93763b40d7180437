use std::net::SocketAddr;
use std::sync::Arc;
use face_attend::utils::config::Config;
use face_attend::utils::logging;
use face_attend::{db, pipeline, AppState};
use face_attend::pipeline::clock::SystemClock;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();

    let db_path = cfg.db_path();
    if let Some(db_dir) = db_path.parent() {
        std::fs::create_dir_all(db_dir)?;
    }
    std::fs::create_dir_all(&cfg.training_dir)?;
    std::fs::create_dir_all(&cfg.menu_dir)?;
    if let Some(model_dir) = cfg.model_path.parent() {
        std::fs::create_dir_all(model_dir)?;
    }

    let pool = db::create_pool(&db_path, 8)?;
    let vision = pipeline::default_vision(&cfg.cascade_path);
    let camera = pipeline::default_camera(cfg.camera_index);
    if !cfg.cascade_path.is_file() {
        tracing::warn!(path = %cfg.cascade_path.display(), "face cascade not found; detection will fail until it is installed");
    }
    info!(
        backend = vision.name(),
        camera_threshold = cfg.camera_threshold,
        upload_threshold = cfg.upload_threshold,
        users = cfg.user_directory().len(),
        "attendance service configured"
    );

    let port = cfg.port;
    let state = Arc::new(AppState::new(cfg, pool, vision, camera, Arc::new(SystemClock::new())));
    let app = face_attend::api::routes::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}
