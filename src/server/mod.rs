mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::geocode::{FieldMap, Resolver};
pub use state::AppState;

pub fn build_router(resolver: Resolver, fields: FieldMap) -> Router {
    let state = Arc::new(AppState { resolver, fields });

    Router::new()
        .route("/api/geocode", get(handlers::geocode))
        .route("/api/record", post(handlers::geocode_record))
        .route("/api/providers", get(handlers::provider_list))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(resolver: Resolver, fields: FieldMap, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(resolver, fields);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "geocode server listening");
    eprintln!("  Geocode server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await
}
