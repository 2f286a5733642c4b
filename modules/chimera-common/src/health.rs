use axum::{routing::get, Json, Router};
use serde_json::json;

/// Build the standard `/health` router served by every long-lived process
/// (SPEC_FULL.md §6). Any other path 404s.
pub fn health_router(service: &'static str) -> Router {
    Router::new().route(
        "/health",
        get(move || async move { Json(json!({ "status": "healthy", "service": service })) }),
    )
}

/// Bind and serve the health router on `port`, returning when the listener
/// fails to bind. Intended to be spawned as a background task.
pub async fn serve_health(port: u16, service: &'static str) -> anyhow::Result<()> {
    let app = health_router(service);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
