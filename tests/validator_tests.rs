use challenge_portal::{
    challenges::{Challenge, ChallengeLoadError, ChallengeRegistry},
    classifier::{FileCategory, TabularFormat, classify, extension},
    validator::{ValidationError, check_schema, parse_json, validate, validate_sized},
};
use std::io::Write;

const LIMIT: usize = 5 * 1024 * 1024;

fn house_price() -> Challenge {
    ChallengeRegistry::builtin().get("house_price").cloned().unwrap()
}

fn unordered(expected: &[&str]) -> Challenge {
    Challenge {
        id: "loose".to_string(),
        title: "Loose".to_string(),
        description: String::new(),
        expected_columns: expected.iter().map(|c| c.to_string()).collect(),
        order_matters: false,
    }
}

fn code_of(result: Result<impl std::fmt::Debug, ValidationError>) -> &'static str {
    result.unwrap_err().code()
}

// --- Classifier ---

#[test]
fn test_classify_extension_table() {
    assert_eq!(classify("a.csv"), Some(FileCategory::Tabular(TabularFormat::Csv)));
    assert_eq!(classify("a.json"), Some(FileCategory::Tabular(TabularFormat::Json)));
    for model in ["m.pkl", "m.h5", "m.onnx", "m.joblib", "m.pt"] {
        assert_eq!(classify(model), Some(FileCategory::Model), "{model}");
    }
    assert_eq!(classify("train.py"), Some(FileCategory::Script));
    assert_eq!(classify("notes.txt"), None);
    assert_eq!(classify("README"), None);
}

#[test]
fn test_extension_is_case_insensitive_and_uses_last_dot() {
    assert_eq!(extension("PREDS.CSV"), "csv");
    assert_eq!(extension("archive.tar.gz"), "gz");
    assert_eq!(extension("noext"), "");
    assert_eq!(classify("Model.ONNX"), Some(FileCategory::Model));
}

// --- Validation Sequence ---

#[test]
fn test_valid_csv_reports_rows_and_columns() {
    let validated = validate("preds.csv", b"id,prediction\n1,0.5\n2,0.7\n".to_vec(), &house_price(), LIMIT).unwrap();

    assert_eq!(validated.row_count(), Some(2));
    assert_eq!(validated.columns(), Some(vec!["id".to_string(), "prediction".to_string()]));
    assert_eq!(validated.content, b"id,prediction\n1,0.5\n2,0.7\n");
}

#[test]
fn test_empty_filename_is_missing_file() {
    assert_eq!(code_of(validate("", b"id,prediction\n1,2\n".to_vec(), &house_price(), LIMIT)), "MISSING_FILE");
}

#[test]
fn test_extension_is_checked_before_size() {
    let big = vec![b'x'; 64];
    assert_eq!(code_of(validate("notes.txt", big.clone(), &house_price(), 8)), "UNSUPPORTED_FILE_TYPE");
    assert_eq!(code_of(validate("preds.csv", big, &house_price(), 8)), "FILE_TOO_LARGE");
}

#[test]
fn test_size_limit_is_inclusive() {
    let content = b"id,prediction\n1,2\n".to_vec();
    let exact = content.len();
    assert!(validate("preds.csv", content.clone(), &house_price(), exact).is_ok());
    assert_eq!(code_of(validate("preds.csv", content, &house_price(), exact - 1)), "FILE_TOO_LARGE");
}

#[test]
fn test_unsupported_message_lists_extensions() {
    let err = validate("notes.txt", b"x".to_vec(), &house_price(), LIMIT).unwrap_err();
    let message = err.to_string();
    assert!(message.contains(".txt"));
    assert!(message.ends_with("Use one of: ['csv', 'h5', 'joblib', 'json', 'onnx', 'pkl', 'pt', 'py']."));
}

#[test]
fn test_model_and_script_pass_through() {
    let validated = validate("model.pkl", vec![0x80, 0x04, 0xff], &house_price(), LIMIT).unwrap();
    assert_eq!(validated.category, FileCategory::Model);
    assert!(validated.row_count().is_none());

    let validated = validate("train.py", b"not valid csv at all".to_vec(), &house_price(), LIMIT).unwrap();
    assert_eq!(validated.category, FileCategory::Script);
}

#[test]
fn test_csv_failures() {
    assert_eq!(code_of(validate("p.csv", Vec::new(), &house_price(), LIMIT)), "INVALID_CSV");
    assert_eq!(code_of(validate("p.csv", vec![0xff, 0xfe, 0x00], &house_price(), LIMIT)), "INVALID_CSV");
}

#[test]
fn test_header_only_csv_is_no_rows() {
    assert_eq!(code_of(validate("p.csv", b"id,prediction\n".to_vec(), &house_price(), LIMIT)), "NO_ROWS");
}

#[test]
fn test_row_count_is_checked_before_schema() {
    assert_eq!(code_of(validate("p.csv", b"id,score\n".to_vec(), &house_price(), LIMIT)), "NO_ROWS");
    assert_eq!(code_of(validate("p.csv", b"id,score\n1,2\n".to_vec(), &house_price(), LIMIT)), "SCHEMA_MISMATCH");
}

#[test]
fn test_reported_size_drives_size_check() {
    let head = b"id,prediction\n1,2\n".to_vec();
    let err = validate_sized("preds.csv", head.clone(), 6 * 1024 * 1024, &house_price(), LIMIT).unwrap_err();
    assert_eq!(
        err,
        ValidationError::FileTooLarge {
            size_bytes: 6 * 1024 * 1024,
            limit_bytes: LIMIT,
        }
    );
    assert!(validate_sized("preds.csv", head.clone(), head.len(), &house_price(), LIMIT).is_ok());
}

#[test]
fn test_ordered_schema_mismatch_reports_both_lists() {
    let err = validate("p.csv", b"prediction,id\n1,2\n".to_vec(), &house_price(), LIMIT).unwrap_err();
    assert_eq!(
        err,
        ValidationError::SchemaMismatch {
            expected: vec!["id".to_string(), "prediction".to_string()],
            got: vec!["prediction".to_string(), "id".to_string()],
        }
    );
}

#[test]
fn test_unordered_schema_allows_extra_columns() {
    let challenge = unordered(&["id", "prediction"]);
    let validated = validate("p.csv", b"extra,prediction,id\nx,1,2\n".to_vec(), &challenge, LIMIT).unwrap();
    assert_eq!(validated.row_count(), Some(1));

    let err = validate("p.csv", b"id,other\n1,2\n".to_vec(), &challenge, LIMIT).unwrap_err();
    assert_eq!(err, ValidationError::MissingColumns(vec!["prediction".to_string()]));
}

#[test]
fn test_check_schema_directly() {
    let expected = vec!["a".to_string(), "b".to_string()];
    assert!(check_schema(&expected, &expected, true).is_ok());
    assert!(check_schema(&["b".to_string(), "a".to_string()], &expected, false).is_ok());
    assert!(check_schema(&["b".to_string(), "a".to_string()], &expected, true).is_err());
}

// --- JSON ---

#[test]
fn test_json_columns_follow_document_order() {
    let table = parse_json(br#"[{"prediction": 1, "id": 2}]"#).unwrap();
    assert_eq!(table.columns, vec!["prediction".to_string(), "id".to_string()]);

    let err = validate("p.json", br#"[{"prediction": 1, "id": 2}]"#.to_vec(), &house_price(), LIMIT).unwrap_err();
    assert_eq!(err.code(), "SCHEMA_MISMATCH");
}

#[test]
fn test_json_shape_failures() {
    for bad in [&b"{not json"[..], b"{\"id\": 1}", b"[]", b"[1, 2, 3]"] {
        assert_eq!(code_of(validate("p.json", bad.to_vec(), &house_price(), LIMIT)), "INVALID_JSON");
    }
}

#[test]
fn test_json_rows_are_counted() {
    let validated = validate(
        "p.json",
        br#"[{"id": 1, "prediction": 0.1}, {"id": 2, "prediction": 0.2}]"#.to_vec(),
        &house_price(),
        LIMIT,
    )
    .unwrap();
    assert_eq!(validated.row_count(), Some(2));
}

// --- Challenge Registry ---

#[test]
fn test_builtin_catalog() {
    let registry = ChallengeRegistry::builtin();
    assert_eq!(registry.ids(), vec!["house_price", "churn_model"]);
    assert!(registry.all().iter().all(|c| c.order_matters));
    assert!(registry.get("missing").is_none());
}

#[test]
fn test_catalog_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"id": "iris", "title": "Iris", "description": "Classify", "expected_columns": ["id", "species"]}}]"#
    )
    .unwrap();

    let registry = ChallengeRegistry::from_json_file(file.path()).unwrap();
    let iris = registry.get("iris").unwrap();
    assert!(iris.order_matters, "order_matters defaults to true");
    assert_eq!(iris.expected_columns, vec!["id", "species"]);
}

#[test]
fn test_catalog_rejects_duplicates_and_empty() {
    let registry = ChallengeRegistry::builtin();
    let mut doubled = registry.all().to_vec();
    doubled.push(doubled[0].clone());

    assert!(matches!(
        ChallengeRegistry::new(doubled),
        Err(ChallengeLoadError::DuplicateId(id)) if id == "house_price"
    ));
    assert!(matches!(ChallengeRegistry::new(Vec::new()), Err(ChallengeLoadError::Empty)));
}
