//! Health check endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub book_service: bool,
    pub user_service: bool,
}

/// Health check - always returns OK if the server is running
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - verifies both backends answer
async fn readyz(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<ReadyResponse> {
    let (books, users) = tokio::join!(state.clients.books.ping(), state.clients.users.ping());

    if let Err(e) = &books {
        tracing::warn!(error = %e, "Book service not ready");
    }
    if let Err(e) = &users {
        tracing::warn!(error = %e, "User service not ready");
    }

    let book_service = books.is_ok();
    let user_service = users.is_ok();
    Json(ReadyResponse {
        ready: book_service && user_service,
        book_service,
        user_service,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
