mod dash;

use anyhow::Result;
use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

/// Binds the origin. Every URL shape is dispatched by one fallback handler:
/// the `.ism/dash/` segment paths cannot be expressed as route templates.
pub async fn run(port: u16) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .fallback(get(dash::handle_request))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
