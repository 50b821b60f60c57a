use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// User and role management. Nested under `/admin` and wrapped in
/// `auth::require_admin`, which resolves the caller and rejects anyone without
/// the `admin` role before a handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        .route("/users", get(handlers::list_users))
        // POST /admin/assign-role, POST /admin/remove-role
        // Body: {user_id, role}. Re-granting or re-revoking is a no-op.
        .route("/assign-role", post(handlers::assign_role))
        .route("/remove-role", post(handlers::remove_role))
        // POST /admin/delete-user
        .route("/delete-user", post(handlers::delete_user))
}
