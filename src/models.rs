use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Submission Schemas (Mapped to Database) ---

/// SubmissionStatus
///
/// Terminal outcome of a submit attempt. Stored as the upper-case text
/// `VALID` / `INVALID` in the `submissions.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum SubmissionStatus {
    Valid,
    Invalid,
}

/// Submission
///
/// A full row of the append-only `submissions` table. `file_path` is empty for
/// INVALID attempts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Submission {
    pub id: i64,
    pub user_id: String,
    pub challenge_id: String,
    pub file_path: String,
    pub original_filename: String,
    pub status: SubmissionStatus,
    pub error_message: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// SubmissionSummary
///
/// Listing view of a submission. The server-side `file_path` is not exposed;
/// clients fetch the file through the download endpoint instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct SubmissionSummary {
    pub id: i64,
    pub user_id: String,
    pub challenge_id: String,
    pub original_filename: String,
    pub status: SubmissionStatus,
    pub error_message: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewSubmission
///
/// Insert payload for the submission store. `created_at` is stamped by the
/// repository.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: String,
    pub challenge_id: String,
    pub file_path: String,
    pub original_filename: String,
    pub status: SubmissionStatus,
    pub error_message: Option<String>,
}

// --- Submission Responses ---

/// SubmitMeta
///
/// Summary of what was accepted. `rows` and `columns` are `None` for model
/// artifacts and scripts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct SubmitMeta {
    pub challenge_id: String,
    pub rows: Option<usize>,
    pub columns: Option<Vec<String>>,
}

/// SubmitResponse
///
/// Success payload of POST /api/submit.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitResponse {
    /// Always "ok".
    pub status: String,
    pub submission_id: i64,
    pub message: String,
    pub meta: SubmitMeta,
}

/// SubmitUpload
///
/// Documentation-only description of the multipart form accepted by the submit
/// endpoints.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct SubmitUpload {
    pub challenge_id: String,
    /// Ignored on /participant/submit, where the caller's identity is used.
    pub user_id: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// --- Identity Schemas ---

/// Role
///
/// The three RBAC roles seeded by the schema migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Participant,
    Judge,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::Judge => "judge",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "participant" => Ok(Role::Participant),
            "judge" => Ok(Role::Judge),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// User
///
/// A row of the `users` table. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// UserWithRoles
///
/// A user joined with the names of the roles they currently hold.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct UserWithRoles {
    pub id: i64,
    pub email: String,
    pub roles: Vec<Role>,
}

impl UserWithRoles {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// RoleChange
///
/// Outcome of an assign/remove role request; the no-op variants are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
}

// --- Request Payloads (Input Schemas) ---

/// Credentials
///
/// Body of POST /register and POST /login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Credentials {
    #[schema(example = "test@example.com")]
    pub email: String,
    pub password: String,
}

/// TokenResponse
///
/// Body returned by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// RoleAssignmentRequest
///
/// Body of POST /admin/assign-role and POST /admin/remove-role. The role is a
/// free string so unknown names can be reported as ROLE_NOT_FOUND.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleAssignmentRequest {
    pub user_id: i64,
    #[schema(example = "judge")]
    pub role: String,
}

/// DeleteUserRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeleteUserRequest {
    pub user_id: i64,
}

/// MessageResponse
///
/// Generic acknowledgement for admin actions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

// --- Review & Grading ---

/// GradeRequest
///
/// Body of POST /judge/grade.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GradeRequest {
    pub submission_id: i64,
    pub grade: f64,
    #[serde(default)]
    pub comment: String,
}

/// Grade
///
/// A row of the append-only `grades` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Grade {
    pub id: i64,
    pub submission_id: i64,
    pub judge_id: i64,
    pub grade: f64,
    pub comment: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ParticipantSubmissions
///
/// One participant and everything they have submitted, newest first. Used by the
/// judge review list and the participant panel.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ParticipantSubmissions {
    pub user_id: i64,
    pub email: String,
    pub submissions: Vec<SubmissionSummary>,
}
