use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Submission pipeline: catalog, classification, validation, storage, orchestration.
pub mod challenges;
pub mod classifier;
pub mod storage;
pub mod submission;
pub mod validator;

// Identity, persistence and the HTTP layer.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Admin, Judge, Participant).
pub mod routes;
use routes::{admin, judge, participant, public};

// --- Public Re-exports ---

pub use challenges::ChallengeRegistry;
pub use config::AppConfig;
pub use repository::{RepositoryState, SqliteRepository};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json` and
/// browsable through Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::list_challenges, handlers::submit_solution,
        handlers::list_submissions, handlers::download_submission,
        handlers::register_user, handlers::login,
        handlers::list_users, handlers::assign_role, handlers::remove_role, handlers::delete_user,
        handlers::judge_review, handlers::grade_submission,
        handlers::participant_panel, handlers::participant_submit
    ),
    components(
        schemas(
            challenges::Challenge, error::ErrorBody,
            models::SubmissionStatus, models::SubmissionSummary, models::SubmitResponse,
            models::SubmitMeta, models::SubmitUpload, models::Role, models::UserWithRoles,
            models::Credentials, models::TokenResponse, models::RoleAssignmentRequest,
            models::DeleteUserRequest, models::MessageResponse, models::GradeRequest,
            models::Grade, models::ParticipantSubmissions,
        )
    ),
    tags(
        (name = "challenge-portal", description = "Challenge Submission Portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned cheaply
/// into every request.
#[derive(Clone)]
pub struct AppState {
    /// Submission store and identity tables.
    pub repo: RepositoryState,
    /// Where accepted files are written.
    pub storage: StorageState,
    /// Read-only challenge catalog, built once at startup.
    pub challenges: Arc<ChallengeRegistry>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// The AuthUser extractor only needs these two parts of the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, attaches a role gate to each protected module,
/// and wraps everything in the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Role-gated modules. The gate resolves the caller (401 on failure),
        // checks the role (403), and hands the identity to the handler.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin)),
        )
        .nest(
            "/judge",
            judge::judge_routes().route_layer(middleware::from_fn_with_state(state.clone(), auth::require_judge)),
        )
        .nest(
            "/participant",
            participant::participant_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_participant)),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` so every log line
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
