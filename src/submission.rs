//! Submission pipeline: resolve challenge, validate, store, audit.
//!
//! Each attempt moves RECEIVED → VALIDATING → VALID | INVALID exactly once. Every
//! attempt that names a known challenge leaves one row in the submission store,
//! whatever its outcome.

use axum::extract::Multipart;

use crate::{
    AppState,
    error::ApiError,
    models::{NewSubmission, SubmissionStatus, SubmitMeta, SubmitResponse},
    validator,
};

/// Recorded when the form carries no `user_id`.
pub const DEFAULT_USER_ID: &str = "demo-user";

/// Recorded as the original filename when no file was attached.
const UNKNOWN_FILENAME: &str = "unknown";

/// A file part pulled out of the multipart body. `content` holds at most one
/// byte past the size ceiling; `size_bytes` is what the client actually sent.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub size_bytes: usize,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        let size_bytes = content.len();
        Self {
            filename: filename.into(),
            content,
            size_bytes,
        }
    }
}

/// SubmitForm
///
/// The decoded multipart form of a submit request. Every field is optional at
/// this point; presence is checked by `process_submission` so that the right
/// error code is reported.
#[derive(Debug, Clone, Default)]
pub struct SubmitForm {
    pub challenge_id: Option<String>,
    pub user_id: Option<String>,
    pub file: Option<UploadedFile>,
}

impl SubmitForm {
    /// from_multipart
    ///
    /// Reads the `challenge_id`, `user_id` and `file` parts; other parts are
    /// ignored. The file is drained in chunks: every byte is counted, but only
    /// `max_file_bytes + 1` are buffered. A broken multipart stream is
    /// MALFORMED_REQUEST.
    pub async fn from_multipart(mut multipart: Multipart, max_file_bytes: usize) -> Result<Self, ApiError> {
        let mut form = SubmitForm::default();
        let keep = max_file_bytes.saturating_add(1);

        while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("challenge_id") => form.challenge_id = Some(field.text().await.map_err(malformed)?),
                Some("user_id") => form.user_id = Some(field.text().await.map_err(malformed)?),
                Some("file") => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let mut content = Vec::new();
                    let mut size_bytes = 0usize;
                    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                        size_bytes = size_bytes.saturating_add(chunk.len());
                        let room = keep.saturating_sub(content.len());
                        content.extend_from_slice(&chunk[..chunk.len().min(room)]);
                    }
                    form.file = Some(UploadedFile {
                        filename,
                        content,
                        size_bytes,
                    });
                }
                other => tracing::debug!(field = ?other, "ignoring unexpected multipart field"),
            }
        }

        Ok(form)
    }
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request("MALFORMED_REQUEST", format!("Could not read multipart form: {}", err.body_text()))
        .with_hint("Send the upload as multipart/form-data with challenge_id and file fields.")
}

/// process_submission
///
/// Runs one submit attempt end to end and returns the structured outcome.
/// Validation failures are persisted as INVALID before the error is returned.
pub async fn process_submission(state: &AppState, form: SubmitForm) -> Result<SubmitResponse, ApiError> {
    let challenge_id = form
        .challenge_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ApiError::bad_request("MISSING_CHALLENGE_ID", "Field 'challenge_id' is required in form data.")
                .with_hint("Add challenge_id to your form data and try again.")
        })?;

    let challenge = state.challenges.get(&challenge_id).ok_or_else(|| {
        ApiError::bad_request("UNKNOWN_CHALLENGE", format!("Unknown challenge_id '{challenge_id}'."))
            .with_hint(format!("Use one of: {:?}.", state.challenges.ids()))
    })?;

    let user_id = form
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

    let (filename, content, size_bytes) = form
        .file
        .map(|f| (f.filename, f.content, f.size_bytes))
        .unwrap_or_default();
    let original_filename = if filename.is_empty() {
        UNKNOWN_FILENAME.to_string()
    } else {
        filename.clone()
    };

    tracing::info!(%challenge_id, %user_id, filename = %original_filename, bytes = size_bytes, "validating submission");

    let validated = match validator::validate_sized(
        &filename,
        content,
        size_bytes,
        challenge,
        state.config.max_upload_bytes,
    ) {
        Ok(validated) => validated,
        Err(err) => {
            tracing::info!(%challenge_id, code = err.code(), "submission rejected");
            record_invalid(state, &user_id, &challenge_id, &original_filename, err.to_string()).await?;
            return Err(err.into());
        }
    };

    let file_path = match state.storage.store(&challenge_id, &filename, &validated.content).await {
        Ok(path) => path,
        Err(err) => {
            tracing::error!(%challenge_id, "failed to store accepted file: {}", err);
            record_invalid(state, &user_id, &challenge_id, &original_filename, "File could not be stored.".to_string())
                .await?;
            return Err(err.into());
        }
    };

    let submission_id = state
        .repo
        .save_submission(NewSubmission {
            user_id,
            challenge_id: challenge_id.clone(),
            file_path,
            original_filename,
            status: SubmissionStatus::Valid,
            error_message: None,
        })
        .await?;

    Ok(SubmitResponse {
        status: "ok".to_string(),
        submission_id,
        message: "File accepted and stored.".to_string(),
        meta: SubmitMeta {
            challenge_id,
            rows: validated.row_count(),
            columns: validated.columns(),
        },
    })
}

async fn record_invalid(
    state: &AppState,
    user_id: &str,
    challenge_id: &str,
    original_filename: &str,
    error_message: String,
) -> Result<i64, ApiError> {
    let id = state
        .repo
        .save_submission(NewSubmission {
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
            file_path: String::new(),
            original_filename: original_filename.to_string(),
            status: SubmissionStatus::Invalid,
            error_message: Some(error_message),
        })
        .await?;
    Ok(id)
}
