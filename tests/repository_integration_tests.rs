use challenge_portal::{
    SqliteRepository,
    models::{NewSubmission, Role, RoleChange, SubmissionStatus},
    repository::{self, Repository},
};
use sqlx::SqlitePool;

// Each test gets its own private in-memory database with migrations applied.
async fn setup() -> (SqliteRepository, SqlitePool) {
    let pool = repository::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    (SqliteRepository::new(pool.clone()), pool)
}

fn new_submission(user_id: &str, status: SubmissionStatus) -> NewSubmission {
    NewSubmission {
        user_id: user_id.to_string(),
        challenge_id: "house_price".to_string(),
        file_path: match status {
            SubmissionStatus::Valid => "/srv/uploads/house_price/preds.csv".to_string(),
            SubmissionStatus::Invalid => String::new(),
        },
        original_filename: "preds.csv".to_string(),
        status,
        error_message: match status {
            SubmissionStatus::Valid => None,
            SubmissionStatus::Invalid => Some("No file uploaded.".to_string()),
        },
    }
}

// --- Schema ---

#[tokio::test]
async fn test_migrations_seed_roles() {
    let (_repo, pool) = setup().await;

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM roles ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(names, vec!["participant", "admin", "judge"]);
}

#[tokio::test]
async fn test_status_column_rejects_unknown_values() {
    let (_repo, pool) = setup().await;

    let result = sqlx::query(
        "INSERT INTO submissions (user_id, challenge_id, file_path, original_filename, status, created_at) \
         VALUES ('u', 'c', '', 'f', 'PENDING', '2025-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}

// --- Submission Store ---

#[tokio::test]
async fn test_save_and_get_submission() {
    let (repo, _pool) = setup().await;

    let id = repo
        .save_submission(new_submission("alice", SubmissionStatus::Valid))
        .await
        .unwrap();
    let stored = repo.get_submission(id).await.unwrap().expect("row should exist");

    assert_eq!(stored.id, id);
    assert_eq!(stored.user_id, "alice");
    assert_eq!(stored.status, SubmissionStatus::Valid);
    assert_eq!(stored.file_path, "/srv/uploads/house_price/preds.csv");
    assert!(stored.error_message.is_none());

    assert!(repo.get_submission(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn test_listing_is_newest_first() {
    let (repo, _pool) = setup().await;

    let mut ids = Vec::new();
    for status in [SubmissionStatus::Valid, SubmissionStatus::Invalid, SubmissionStatus::Valid] {
        ids.push(repo.save_submission(new_submission("alice", status)).await.unwrap());
    }

    let listed: Vec<i64> = repo.list_submissions().await.unwrap().iter().map(|s| s.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_list_for_user_filters_by_owner() {
    let (repo, _pool) = setup().await;

    repo.save_submission(new_submission("alice", SubmissionStatus::Valid)).await.unwrap();
    repo.save_submission(new_submission("bob", SubmissionStatus::Invalid)).await.unwrap();
    repo.save_submission(new_submission("alice", SubmissionStatus::Invalid)).await.unwrap();

    let alice = repo.list_submissions_for_user("alice").await.unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice.iter().all(|s| s.user_id == "alice"));
    assert!(repo.list_submissions_for_user("carol").await.unwrap().is_empty());
}

// --- Identity ---

#[tokio::test]
async fn test_create_user_with_roles() {
    let (repo, _pool) = setup().await;

    let created = repo
        .create_user("ada@portal.io", "hash", &[Role::Participant, Role::Admin])
        .await
        .unwrap();
    let loaded = repo.get_user(created.id).await.unwrap().unwrap();

    assert_eq!(loaded.email, "ada@portal.io");
    assert!(loaded.has_role(Role::Participant));
    assert!(loaded.has_role(Role::Admin));
    assert!(!loaded.has_role(Role::Judge));

    let by_email = repo.find_user_by_email("ada@portal.io").await.unwrap().unwrap();
    assert_eq!(by_email.id, created.id);
    assert_eq!(by_email.password_hash, "hash");
}

#[tokio::test]
async fn test_duplicate_email_is_unique_violation() {
    let (repo, _pool) = setup().await;
    repo.create_user("ada@portal.io", "hash", &[Role::Participant]).await.unwrap();

    let err = repo
        .create_user("ada@portal.io", "other", &[Role::Participant])
        .await
        .unwrap_err();

    match err {
        sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
        other => panic!("expected a database error, got {other:?}"),
    }
    assert_eq!(repo.list_users().await.unwrap().len(), 1, "failed insert leaves no partial user");
}

#[tokio::test]
async fn test_assign_and_remove_role_report_changes() {
    let (repo, _pool) = setup().await;
    let user = repo.create_user("u@portal.io", "hash", &[Role::Participant]).await.unwrap();

    assert_eq!(repo.assign_role(user.id, Role::Judge).await.unwrap(), RoleChange::Added);
    assert_eq!(repo.assign_role(user.id, Role::Judge).await.unwrap(), RoleChange::AlreadyPresent);
    assert_eq!(repo.remove_role(user.id, Role::Judge).await.unwrap(), RoleChange::Removed);
    assert_eq!(repo.remove_role(user.id, Role::Judge).await.unwrap(), RoleChange::NotPresent);

    let judges = repo.list_users_with_role(Role::Judge).await.unwrap();
    assert!(judges.is_empty());
}

#[tokio::test]
async fn test_list_users_with_role() {
    let (repo, _pool) = setup().await;
    let judge = repo
        .create_user("j@portal.io", "hash", &[Role::Participant, Role::Judge])
        .await
        .unwrap();
    repo.create_user("p@portal.io", "hash", &[Role::Participant]).await.unwrap();

    let judges = repo.list_users_with_role(Role::Judge).await.unwrap();
    assert_eq!(judges.len(), 1);
    assert_eq!(judges[0].id, judge.id);
    assert!(judges[0].has_role(Role::Participant), "all roles are attached, not just the filter");

    assert_eq!(repo.list_users_with_role(Role::Participant).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_user_cascades_role_links() {
    let (repo, pool) = setup().await;
    let user = repo.create_user("u@portal.io", "hash", &[Role::Participant]).await.unwrap();

    assert!(repo.delete_user(user.id).await.unwrap());
    assert!(!repo.delete_user(user.id).await.unwrap());

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 0);
}

// --- Grading ---

#[tokio::test]
async fn test_record_grade_returns_row() {
    let (repo, _pool) = setup().await;
    let submission_id = repo
        .save_submission(new_submission("alice", SubmissionStatus::Valid))
        .await
        .unwrap();

    let grade = repo.record_grade(submission_id, 3, 9.25, "Clean submission").await.unwrap();
    assert_eq!(grade.submission_id, submission_id);
    assert_eq!(grade.judge_id, 3);
    assert_eq!(grade.grade, 9.25);
    assert_eq!(grade.comment, "Clean submission");

    let second = repo.record_grade(submission_id, 4, 7.0, "").await.unwrap();
    assert!(second.id > grade.id, "grades are appended, not replaced");
}

#[tokio::test]
async fn test_grade_requires_existing_submission() {
    let (repo, _pool) = setup().await;
    assert!(repo.record_grade(12345, 1, 5.0, "").await.is_err());
}
