use crate::models::{
    Grade, NewSubmission, Role, RoleChange, Submission, SubmissionSummary, User, UserWithRoles,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{collections::HashMap, str::FromStr, sync::Arc};

/// Embedded schema migrations, applied at startup and by the test harnesses.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers can
/// work against the data layer without knowing the concrete store.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Submission Store (append-only) ---
    async fn save_submission(&self, submission: NewSubmission) -> sqlx::Result<i64>;
    // Newest first; ties on created_at fall back to id.
    async fn list_submissions(&self) -> sqlx::Result<Vec<SubmissionSummary>>;
    async fn list_submissions_for_user(&self, user_id: &str) -> sqlx::Result<Vec<SubmissionSummary>>;
    async fn get_submission(&self, id: i64) -> sqlx::Result<Option<Submission>>;

    // --- Identity ---
    // Grants `roles` in the same transaction as the insert.
    async fn create_user(&self, email: &str, password_hash: &str, roles: &[Role]) -> sqlx::Result<UserWithRoles>;
    async fn find_user_by_email(&self, email: &str) -> sqlx::Result<Option<User>>;
    async fn get_user(&self, id: i64) -> sqlx::Result<Option<UserWithRoles>>;
    async fn list_users(&self) -> sqlx::Result<Vec<UserWithRoles>>;
    async fn list_users_with_role(&self, role: Role) -> sqlx::Result<Vec<UserWithRoles>>;
    async fn assign_role(&self, user_id: i64, role: Role) -> sqlx::Result<RoleChange>;
    async fn remove_role(&self, user_id: i64, role: Role) -> sqlx::Result<RoleChange>;
    // Returns false when no such user existed.
    async fn delete_user(&self, id: i64) -> sqlx::Result<bool>;

    // --- Grading ---
    async fn record_grade(&self, submission_id: i64, judge_id: i64, grade: f64, comment: &str) -> sqlx::Result<Grade>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// connect
///
/// Opens a pool for `db_url`, creating the database file if needed, and applies
/// pending migrations. In-memory URLs get a single long-lived connection, since
/// every new SQLite connection would otherwise see its own empty database.
pub async fn connect(db_url: &str) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = db_url.contains(":memory:") || db_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options.connect_with(options).await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using an initialized, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Loads every role assignment, grouped by user id.
    async fn roles_by_user(&self) -> sqlx::Result<HashMap<i64, Vec<Role>>> {
        let pairs = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT ur.user_id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            ORDER BY ur.user_id, r.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<Role>> = HashMap::new();
        for (user_id, name) in pairs {
            match name.parse::<Role>() {
                Ok(role) => grouped.entry(user_id).or_default().push(role),
                Err(e) => tracing::warn!(user_id, "skipping role row: {}", e),
            }
        }
        Ok(grouped)
    }

    async fn attach_roles(&self, users: Vec<(i64, String)>) -> sqlx::Result<Vec<UserWithRoles>> {
        let mut roles = self.roles_by_user().await?;
        Ok(users
            .into_iter()
            .map(|(id, email)| UserWithRoles {
                id,
                email,
                roles: roles.remove(&id).unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    /// save_submission
    ///
    /// Plain INSERT; rows are never updated or deleted afterwards.
    async fn save_submission(&self, submission: NewSubmission) -> sqlx::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO submissions (user_id, challenge_id, file_path, original_filename, status, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&submission.user_id)
        .bind(&submission.challenge_id)
        .bind(&submission.file_path)
        .bind(&submission.original_filename)
        .bind(submission.status)
        .bind(&submission.error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(
            submission_id = id,
            challenge_id = %submission.challenge_id,
            status = ?submission.status,
            "submission recorded"
        );
        Ok(id)
    }

    async fn list_submissions(&self) -> sqlx::Result<Vec<SubmissionSummary>> {
        sqlx::query_as::<_, SubmissionSummary>(
            r#"
            SELECT id, user_id, challenge_id, original_filename, status, error_message, created_at
            FROM submissions
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn list_submissions_for_user(&self, user_id: &str) -> sqlx::Result<Vec<SubmissionSummary>> {
        sqlx::query_as::<_, SubmissionSummary>(
            r#"
            SELECT id, user_id, challenge_id, original_filename, status, error_message, created_at
            FROM submissions
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_submission(&self, id: i64) -> sqlx::Result<Option<Submission>> {
        sqlx::query_as::<_, Submission>(
            r#"
            SELECT id, user_id, challenge_id, file_path, original_filename, status, error_message, created_at
            FROM submissions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// create_user
    ///
    /// Inserts the user and its initial roles atomically. A duplicate email
    /// surfaces as a unique-violation database error for the caller to map.
    async fn create_user(&self, email: &str, password_hash: &str, roles: &[Role]) -> sqlx::Result<UserWithRoles> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(email)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for role in roles {
            sqlx::query(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?",
            )
            .bind(id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(UserWithRoles {
            id,
            email: email.to_string(),
            roles: roles.to_vec(),
        })
    }

    async fn find_user_by_email(&self, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, email, password_hash, created_at FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// get_user
    ///
    /// Resolves a user with their *current* roles; used by the auth layer on
    /// every protected request.
    async fn get_user(&self, id: i64) -> sqlx::Result<Option<UserWithRoles>> {
        let Some(email) = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ?
            ORDER BY r.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserWithRoles {
            id,
            email,
            roles: names.iter().filter_map(|n| n.parse().ok()).collect(),
        }))
    }

    async fn list_users(&self) -> sqlx::Result<Vec<UserWithRoles>> {
        let users = sqlx::query_as::<_, (i64, String)>("SELECT id, email FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        self.attach_roles(users).await
    }

    async fn list_users_with_role(&self, role: Role) -> sqlx::Result<Vec<UserWithRoles>> {
        let users = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT u.id, u.email FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            WHERE r.name = ?
            ORDER BY u.id
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        self.attach_roles(users).await
    }

    /// assign_role
    ///
    /// `INSERT OR IGNORE` makes re-assignment a reported no-op rather than an error.
    async fn assign_role(&self, user_id: i64, role: Role) -> sqlx::Result<RoleChange> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() > 0 {
            RoleChange::Added
        } else {
            RoleChange::AlreadyPresent
        })
    }

    async fn remove_role(&self, user_id: i64, role: Role) -> sqlx::Result<RoleChange> {
        let result = sqlx::query(
            "DELETE FROM user_roles WHERE user_id = ? AND role_id = (SELECT id FROM roles WHERE name = ?)",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() > 0 {
            RoleChange::Removed
        } else {
            RoleChange::NotPresent
        })
    }

    /// delete_user
    ///
    /// Role links go with the user via ON DELETE CASCADE; submissions and grades
    /// are audit records and stay.
    async fn delete_user(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_grade(&self, submission_id: i64, judge_id: i64, grade: f64, comment: &str) -> sqlx::Result<Grade> {
        sqlx::query_as::<_, Grade>(
            r#"
            INSERT INTO grades (submission_id, judge_id, grade, comment, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, submission_id, judge_id, grade, comment, created_at
            "#,
        )
        .bind(submission_id)
        .bind(judge_id)
        .bind(grade)
        .bind(comment)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }
}
