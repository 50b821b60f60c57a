use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Participant Router Module
///
/// The caller's own view, nested under `/participant` behind
/// `auth::require_participant`. Uploads here are attributed to the verified
/// identity.
pub fn participant_routes() -> Router<AppState> {
    Router::new()
        .route("/panel", get(handlers::participant_panel))
        .route("/submit", post(handlers::participant_submit).layer(DefaultBodyLimit::disable()))
}
