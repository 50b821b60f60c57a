use std::{env, path::PathBuf};

/// Default ceiling for a single uploaded file (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Default lifetime of an issued login token, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers via FromRef as part of the
/// shared application state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string for the submission/identity store.
    pub db_url: String,
    // Root directory for accepted uploads: <upload_root>/<challenge_id>/<file>.
    pub upload_root: PathBuf,
    // Runtime environment marker. Controls the log format and the dev bypass.
    pub env: Env,
    // HMAC secret used to sign and verify login tokens.
    pub jwt_secret: String,
    // Lifetime of an issued token.
    pub token_ttl_secs: u64,
    // Size ceiling enforced by the schema validator.
    pub max_upload_bytes: usize,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Optional JSON catalog replacing the built-in challenges.
    pub challenges_path: Option<PathBuf>,
    // Registering with this email also grants the admin role.
    pub bootstrap_admin_email: Option<String>,
}

/// Env
///
/// Defines the runtime context. `Local` enables pretty logs and the `x-user-id`
/// bypass; `Production` demands explicit secrets and emits JSON logs.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup. Uses an in-memory database
    /// and a relative upload root; tests normally override `upload_root`.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            upload_root: PathBuf::from("uploads"),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bind_addr: "127.0.0.1:3000".to_string(),
            challenges_path: None,
            bootstrap_admin_email: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the **fail-fast**
    /// principle.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing
    /// (`JWT_SECRET` and `DATABASE_URL` in production) or if a numeric variable
    /// cannot be parsed. The server must not start half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (jwt_secret, db_url) = match env {
            Env::Production => (
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
            ),
            Env::Local => (
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://submissions.db".to_string()),
            ),
        };

        let token_ttl_secs = env::var("TOKEN_TTL_SECS")
            .map(|v| v.parse().expect("FATAL: TOKEN_TTL_SECS must be an integer"))
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .map(|v| v.parse().expect("FATAL: MAX_UPLOAD_BYTES must be an integer"))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            db_url,
            upload_root: env::var("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            env,
            jwt_secret,
            token_ttl_secs,
            max_upload_bytes,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            challenges_path: env::var("CHALLENGES_PATH").ok().map(PathBuf::from),
            bootstrap_admin_email: env::var("BOOTSTRAP_ADMIN_EMAIL")
                .ok()
                .filter(|email| !email.trim().is_empty()),
        }
    }
}
