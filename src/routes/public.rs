use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token. Submissions made here are attributed to the
/// form's `user_id` (or the demo user); the authenticated variant lives under
/// `/participant`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(handlers::health))
        // POST /register, POST /login
        .route("/register", post(handlers::register_user))
        .route("/login", post(handlers::login))
        // GET /api/challenges
        // The read-only challenge catalog.
        .route("/api/challenges", get(handlers::list_challenges))
        // POST /api/submit
        // Multipart upload: challenge_id, user_id (optional), file. No body cap;
        // the form reader enforces the file ceiling itself.
        .route(
            "/api/submit",
            post(handlers::submit_solution).layer(DefaultBodyLimit::disable()),
        )
        // GET /api/submissions
        // Audit log of every attempt, newest first.
        .route("/api/submissions", get(handlers::list_submissions))
        // GET /api/submissions/{id}/download
        .route("/api/submissions/{id}/download", get(handlers::download_submission))
}
