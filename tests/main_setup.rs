use challenge_portal::{
    AppConfig,
    config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_TOKEN_TTL_SECS, Env},
};
use serial_test::serial;
use std::{env, panic, path::PathBuf};

const CONFIG_VARS: [&str; 9] = [
    "APP_ENV",
    "DATABASE_URL",
    "UPLOAD_ROOT",
    "JWT_SECRET",
    "TOKEN_TTL_SECS",
    "MAX_UPLOAD_BYTES",
    "BIND_ADDR",
    "CHALLENGES_PATH",
    "BOOTSTRAP_ADMIN_EMAIL",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with every config variable cleared except those in `vars`,
/// then restores the original environment, even if the test panicked.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> std::thread::Result<R>
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original) in originals {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    result
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(&[], AppConfig::load).expect("local config must load with no variables set");

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, "sqlite://submissions.db");
    assert_eq!(config.upload_root, PathBuf::from("uploads"));
    assert_eq!(config.jwt_secret, "super-secure-test-secret-value-local");
    assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
    assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert!(config.challenges_path.is_none());
    assert!(config.bootstrap_admin_email.is_none());
}

#[test]
#[serial]
fn test_app_config_reads_overrides() {
    let config = run_with_env(
        &[
            ("UPLOAD_ROOT", "/srv/uploads"),
            ("TOKEN_TTL_SECS", "60"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("CHALLENGES_PATH", "/etc/portal/challenges.json"),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@portal.io"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.upload_root, PathBuf::from("/srv/uploads"));
    assert_eq!(config.token_ttl_secs, 60);
    assert_eq!(config.max_upload_bytes, 1024);
    assert_eq!(config.bind_addr, "127.0.0.1:8080");
    assert_eq!(config.challenges_path, Some(PathBuf::from("/etc/portal/challenges.json")));
    assert_eq!(config.bootstrap_admin_email.as_deref(), Some("root@portal.io"));
}

#[test]
#[serial]
fn test_blank_bootstrap_email_is_ignored() {
    let config = run_with_env(&[("BOOTSTRAP_ADMIN_EMAIL", "  ")], AppConfig::load).unwrap();
    assert!(config.bootstrap_admin_email.is_none());
}

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let result = run_with_env(
        &[("APP_ENV", "production"), ("DATABASE_URL", "sqlite:///var/lib/portal.db")],
        AppConfig::load,
    );
    assert!(result.is_err(), "Production config loading should panic without JWT_SECRET");

    let result = run_with_env(&[("APP_ENV", "production"), ("JWT_SECRET", "prod-secret")], AppConfig::load);
    assert!(result.is_err(), "Production config loading should panic without DATABASE_URL");
}

#[test]
#[serial]
fn test_app_config_production_with_secrets() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "sqlite:///var/lib/portal.db"),
            ("JWT_SECRET", "prod-secret"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(config.db_url, "sqlite:///var/lib/portal.db");
}

#[test]
#[serial]
fn test_unparseable_number_panics() {
    let result = run_with_env(&[("MAX_UPLOAD_BYTES", "five megabytes")], AppConfig::load);
    assert!(result.is_err());
}
