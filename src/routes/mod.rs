use axum::{Router, http::Uri, routing::get};

use crate::{error::AppError, state::AppState};

pub mod admin;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;

/// Every route plus docs and the envelope fallback, bound to `state`.
/// Transport layers (tracing, limits) are added by the binary.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/orders", orders::router())
        .nest("/cart", cart::router())
        .nest("/admin", admin::router())
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
