//! Maps an uploaded filename to the kind of artifact it carries.

/// Delimited-text or structured-array predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Json,
}

/// FileCategory
///
/// Only tabular files are parsed and checked against a challenge schema; model
/// artifacts and scripts are stored as-is for judges to inspect manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Tabular(TabularFormat),
    Model,
    Script,
}

/// Every extension the portal accepts, sorted for display in error messages.
pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["csv", "h5", "joblib", "json", "onnx", "pkl", "pt", "py"];

/// extension
///
/// Lower-cased text after the last `.`, or an empty string when there is none.
pub fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// classify
///
/// Returns `None` for anything outside the fixed extension table, which the
/// validator turns into `UNSUPPORTED_FILE_TYPE`.
pub fn classify(filename: &str) -> Option<FileCategory> {
    match extension(filename).as_str() {
        "csv" => Some(FileCategory::Tabular(TabularFormat::Csv)),
        "json" => Some(FileCategory::Tabular(TabularFormat::Json)),
        "pkl" | "h5" | "onnx" | "joblib" | "pt" => Some(FileCategory::Model),
        "py" => Some(FileCategory::Script),
        _ => None,
    }
}
