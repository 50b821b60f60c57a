use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Judge Router Module
///
/// Review and grading, nested under `/judge` behind `auth::require_judge`.
pub fn judge_routes() -> Router<AppState> {
    Router::new()
        // GET /judge/review
        // Every participant with their submissions.
        .route("/review", get(handlers::judge_review))
        // POST /judge/grade
        .route("/grade", post(handlers::grade_submission))
}
