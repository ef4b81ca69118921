use crate::cli::Args;
use crate::web::api::{download_presentation, get_runs, health, process_video};
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn build_router(args: Arc<Args>) -> Router {
    let body_limit = args.max_upload_bytes();

    Router::new()
        .route("/process/", post(process_video))
        .route("/process", post(process_video))
        .route("/runs", get(get_runs))
        .route("/runs/:run_id/presentation", get(download_presentation))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(args)
}

pub async fn run_server(args: Args) -> Result<()> {
    std::fs::create_dir_all(&args.work_root)?;

    let mut current_port = args.port;
    let listener = loop {
        let addr = SocketAddr::new(args.host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                // Must be non-blocking before registering with Tokio
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port
                    .checked_add(1)
                    .ok_or_else(|| anyhow::anyhow!("No available ports found"))?;
            }
        }
    };

    info!(
        "Work root: {}, upload limit: {} MB",
        args.work_root, args.max_upload_mb
    );
    let app = build_router(Arc::new(args));

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Frame deck server started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}
