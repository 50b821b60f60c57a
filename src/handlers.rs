use crate::{
    AppState,
    auth::{self, AuthUser, MIN_PASSWORD_LENGTH},
    challenges::Challenge,
    error::{ApiError, ErrorBody},
    models::{
        Credentials, DeleteUserRequest, Grade, GradeRequest, MessageResponse, ParticipantSubmissions,
        Role, RoleAssignmentRequest, RoleChange, SubmissionSummary, SubmitResponse, SubmitUpload,
        TokenResponse, UserWithRoles,
    },
    storage::sanitize_filename,
    submission::{SubmitForm, process_submission},
};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};

// --- Public: Challenges & Submissions ---

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// list_challenges
///
/// [Public Route] The challenge catalog, in catalog order.
#[utoipa::path(
    get,
    path = "/api/challenges",
    responses((status = 200, description = "Challenge catalog", body = [Challenge]))
)]
pub async fn list_challenges(State(state): State<AppState>) -> Json<Vec<Challenge>> {
    Json(state.challenges.all().to_vec())
}

/// submit_solution
///
/// [Public Route] Validates and stores an uploaded file against a challenge.
/// Every attempt naming a known challenge is recorded, VALID or INVALID.
#[utoipa::path(
    post,
    path = "/api/submit",
    request_body(content = SubmitUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File accepted and stored", body = SubmitResponse),
        (status = 400, description = "Request or validation failure", body = ErrorBody)
    )
)]
pub async fn submit_solution(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let form = read_form(multipart, state.config.max_upload_bytes).await?;
    Ok(Json(process_submission(&state, form).await?))
}

/// list_submissions
///
/// [Public Route] Every recorded attempt, newest first. Server paths are omitted.
#[utoipa::path(
    get,
    path = "/api/submissions",
    responses((status = 200, description = "All submissions", body = [SubmissionSummary]))
)]
pub async fn list_submissions(State(state): State<AppState>) -> Result<Json<Vec<SubmissionSummary>>, ApiError> {
    Ok(Json(state.repo.list_submissions().await?))
}

/// download_submission
///
/// [Public Route] Streams back the stored file as an attachment named after the
/// original upload. A record whose file is gone is FILE_MISSING (500).
#[utoipa::path(
    get,
    path = "/api/submissions/{id}/download",
    params(("id" = i64, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Stored file as an attachment"),
        (status = 404, description = "No such submission", body = ErrorBody),
        (status = 500, description = "File missing from storage", body = ErrorBody)
    )
)]
pub async fn download_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let submission = state
        .repo
        .get_submission(id)
        .await?
        .ok_or_else(|| ApiError::not_found("SUBMISSION_NOT_FOUND", format!("Submission {id} does not exist.")))?;

    let content = state.storage.fetch(&submission.file_path).await.inspect_err(|_| {
        tracing::warn!(submission_id = id, path = %submission.file_path, "download requested for missing file");
    })?;

    let mime = mime_guess::from_path(&submission.original_filename).first_or_octet_stream();
    let content_type =
        HeaderValue::from_str(mime.as_ref()).unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let disposition = attachment_header(&submission.original_filename);

    Ok((
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        content,
    ))
}

/// Names the attachment after the original upload, falling back to the
/// sanitized form when the original is not a legal header value.
fn attachment_header(original_filename: &str) -> HeaderValue {
    let quoted = original_filename.replace('"', "'");
    HeaderValue::from_str(&format!("attachment; filename=\"{quoted}\"")).unwrap_or_else(|_| {
        let safe = sanitize_filename(original_filename);
        HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
            .unwrap_or(HeaderValue::from_static("attachment"))
    })
}

async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
    max_file_bytes: usize,
) -> Result<SubmitForm, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        ApiError::bad_request("MALFORMED_REQUEST", rejection.body_text())
            .with_hint("Send the upload as multipart/form-data with challenge_id and file fields.")
    })?;
    SubmitForm::from_multipart(multipart, max_file_bytes).await
}

// --- Public: Identity ---

/// register_user
///
/// [Public Route] Creates an account holding the `participant` role. The
/// configured bootstrap email additionally receives `admin`.
#[utoipa::path(
    post,
    path = "/register",
    request_body = Credentials,
    responses(
        (status = 201, description = "Registered", body = UserWithRoles),
        (status = 400, description = "Invalid email or weak password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<UserWithRoles>), ApiError> {
    let email = normalize_email(&payload.email);
    if !email.contains('@') {
        return Err(ApiError::bad_request("INVALID_EMAIL", "A valid email address is required."));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(
            "WEAK_PASSWORD",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters."),
        ));
    }

    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(email_taken());
    }

    let mut roles = vec![Role::Participant];
    let is_bootstrap_admin = state
        .config
        .bootstrap_admin_email
        .as_deref()
        .is_some_and(|admin| normalize_email(admin) == email);
    if is_bootstrap_admin {
        roles.push(Role::Admin);
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(&email, &password_hash, &roles)
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration of the same email.
            sqlx::Error::Database(db) if db.is_unique_violation() => email_taken(),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, admin = is_bootstrap_admin, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_taken() -> ApiError {
    ApiError::conflict("EMAIL_TAKEN", "An account with this email already exists.")
}

/// login
///
/// [Public Route] Exchanges credentials for a signed token. Unknown email and
/// wrong password are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid email or password.");

    let email = normalize_email(&payload.email);
    let user = state.repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !auth::verify_password(&payload.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "login rejected");
        return Err(invalid());
    }

    let user = state.repo.get_user(user.id).await?.ok_or_else(invalid)?;
    let token = auth::issue_token(&user, &state.config)?;
    Ok(Json(TokenResponse { token }))
}

// --- Admin ---

/// list_users
///
/// [Admin Route] Every account with its current roles.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "Users", body = [UserWithRoles]),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Admin role required", body = ErrorBody)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserWithRoles>>, ApiError> {
    Ok(Json(state.repo.list_users().await?))
}

/// assign_role
///
/// [Admin Route] Grants a role. Granting a role already held is a 200 no-op.
#[utoipa::path(
    post,
    path = "/admin/assign-role",
    request_body = RoleAssignmentRequest,
    responses(
        (status = 200, description = "Role assigned", body = MessageResponse),
        (status = 404, description = "Unknown user or role", body = ErrorBody)
    )
)]
pub async fn assign_role(
    Extension(admin): Extension<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<RoleAssignmentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (user, role) = resolve_assignment(&state, &payload).await?;

    let message = match state.repo.assign_role(user.id, role).await? {
        RoleChange::Added => {
            tracing::info!(admin_id = admin.id, user_id = user.id, %role, "role assigned");
            format!("Role '{role}' assigned to {}.", user.email)
        }
        _ => format!("{} already has role '{role}'.", user.email),
    };
    Ok(Json(MessageResponse { message }))
}

/// remove_role
///
/// [Admin Route] Revokes a role. Revoking a role not held is a 200 no-op.
#[utoipa::path(
    post,
    path = "/admin/remove-role",
    request_body = RoleAssignmentRequest,
    responses(
        (status = 200, description = "Role removed", body = MessageResponse),
        (status = 404, description = "Unknown user or role", body = ErrorBody)
    )
)]
pub async fn remove_role(
    Extension(admin): Extension<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<RoleAssignmentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (user, role) = resolve_assignment(&state, &payload).await?;

    let message = match state.repo.remove_role(user.id, role).await? {
        RoleChange::Removed => {
            tracing::info!(admin_id = admin.id, user_id = user.id, %role, "role removed");
            format!("Role '{role}' removed from {}.", user.email)
        }
        _ => format!("{} does not have role '{role}'.", user.email),
    };
    Ok(Json(MessageResponse { message }))
}

async fn resolve_assignment(
    state: &AppState,
    payload: &RoleAssignmentRequest,
) -> Result<(UserWithRoles, Role), ApiError> {
    let user = state
        .repo
        .get_user(payload.user_id)
        .await?
        .ok_or_else(|| user_not_found(payload.user_id))?;
    let role = payload
        .role
        .trim()
        .to_lowercase()
        .parse::<Role>()
        .map_err(|_| ApiError::not_found("ROLE_NOT_FOUND", format!("Role '{}' does not exist.", payload.role)))?;
    Ok((user, role))
}

fn user_not_found(user_id: i64) -> ApiError {
    ApiError::not_found("USER_NOT_FOUND", format!("User {user_id} does not exist."))
}

/// delete_user
///
/// [Admin Route] Removes an account and its role links. Its submissions and
/// grades remain as audit records.
#[utoipa::path(
    post,
    path = "/admin/delete-user",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn delete_user(
    Extension(admin): Extension<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<DeleteUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.repo.delete_user(payload.user_id).await? {
        return Err(user_not_found(payload.user_id));
    }
    tracing::info!(admin_id = admin.id, user_id = payload.user_id, "user deleted");
    Ok(Json(MessageResponse {
        message: format!("User {} deleted.", payload.user_id),
    }))
}

// --- Judge ---

/// judge_review
///
/// [Judge Route] Every participant with their submissions, newest first.
#[utoipa::path(
    get,
    path = "/judge/review",
    responses(
        (status = 200, description = "Participants and their submissions", body = [ParticipantSubmissions]),
        (status = 403, description = "Judge role required", body = ErrorBody)
    )
)]
pub async fn judge_review(State(state): State<AppState>) -> Result<Json<Vec<ParticipantSubmissions>>, ApiError> {
    let participants = state.repo.list_users_with_role(Role::Participant).await?;

    let mut review = Vec::with_capacity(participants.len());
    for participant in participants {
        let submissions = state
            .repo
            .list_submissions_for_user(&participant.id.to_string())
            .await?;
        review.push(ParticipantSubmissions {
            user_id: participant.id,
            email: participant.email,
            submissions,
        });
    }
    Ok(Json(review))
}

/// grade_submission
///
/// [Judge Route] Records a grade against an existing submission.
#[utoipa::path(
    post,
    path = "/judge/grade",
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Grade recorded", body = Grade),
        (status = 404, description = "No such submission", body = ErrorBody)
    )
)]
pub async fn grade_submission(
    Extension(judge): Extension<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<Grade>, ApiError> {
    if state.repo.get_submission(payload.submission_id).await?.is_none() {
        return Err(ApiError::not_found(
            "SUBMISSION_NOT_FOUND",
            format!("Submission {} does not exist.", payload.submission_id),
        ));
    }

    let grade = state
        .repo
        .record_grade(payload.submission_id, judge.id, payload.grade, &payload.comment)
        .await?;
    tracing::info!(judge_id = judge.id, submission_id = payload.submission_id, grade = payload.grade, "grade recorded");
    Ok(Json(grade))
}

// --- Participant ---

/// participant_panel
///
/// [Participant Route] The caller's own submissions.
#[utoipa::path(
    get,
    path = "/participant/panel",
    responses(
        (status = 200, description = "Own submissions", body = ParticipantSubmissions),
        (status = 403, description = "Participant role required", body = ErrorBody)
    )
)]
pub async fn participant_panel(
    Extension(user): Extension<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<ParticipantSubmissions>, ApiError> {
    let submissions = state.repo.list_submissions_for_user(&user.id.to_string()).await?;
    Ok(Json(ParticipantSubmissions {
        user_id: user.id,
        email: user.email,
        submissions,
    }))
}

/// participant_submit
///
/// [Participant Route] The submit pipeline, attributed to the verified caller.
/// Any `user_id` form field is ignored.
#[utoipa::path(
    post,
    path = "/participant/submit",
    request_body(content = SubmitUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File accepted and stored", body = SubmitResponse),
        (status = 400, description = "Request or validation failure", body = ErrorBody)
    )
)]
pub async fn participant_submit(
    Extension(user): Extension<AuthUser>,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let mut form = read_form(multipart, state.config.max_upload_bytes).await?;
    form.user_id = Some(user.id.to_string());
    Ok(Json(process_submission(&state, form).await?))
}
