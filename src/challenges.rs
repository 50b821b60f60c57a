use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Challenge
///
/// A task definition specifying the schema a tabular submission must follow.
/// Immutable once the registry is built.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct Challenge {
    #[schema(example = "house_price")]
    pub id: String,
    pub title: String,
    pub description: String,
    /// Column names a tabular upload must carry.
    pub expected_columns: Vec<String>,
    /// `true`: columns must equal `expected_columns` exactly and in order.
    /// `false`: `expected_columns` must be a subset of the uploaded columns.
    #[serde(default = "order_matters_default")]
    pub order_matters: bool,
}

fn order_matters_default() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ChallengeLoadError {
    #[error("failed to read challenge catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("challenge catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("challenge catalog is empty")]
    Empty,
    #[error("duplicate challenge id '{0}'")]
    DuplicateId(String),
}

/// ChallengeRegistry
///
/// Read-only catalog built once at startup and shared through `AppState`.
/// Preserves catalog order for listing.
#[derive(Debug, Clone)]
pub struct ChallengeRegistry {
    challenges: Vec<Challenge>,
}

impl ChallengeRegistry {
    /// new
    ///
    /// Rejects an empty catalog and duplicate ids.
    pub fn new(challenges: Vec<Challenge>) -> Result<Self, ChallengeLoadError> {
        if challenges.is_empty() {
            return Err(ChallengeLoadError::Empty);
        }
        let mut seen = HashSet::new();
        for challenge in &challenges {
            if !seen.insert(challenge.id.as_str()) {
                return Err(ChallengeLoadError::DuplicateId(challenge.id.clone()));
            }
        }
        Ok(Self { challenges })
    }

    /// builtin
    ///
    /// The catalog shipped with the portal, used when no `CHALLENGES_PATH` is set.
    pub fn builtin() -> Self {
        Self {
            challenges: vec![
                Challenge {
                    id: "house_price".to_string(),
                    title: "House Price Prediction".to_string(),
                    description: "Submit predicted prices for each id.".to_string(),
                    expected_columns: vec!["id".to_string(), "prediction".to_string()],
                    order_matters: true,
                },
                Challenge {
                    id: "churn_model".to_string(),
                    title: "Customer Churn Challenge".to_string(),
                    description: "Submit churn probability for each customer.".to_string(),
                    expected_columns: vec!["customer_id".to_string(), "churn_prob".to_string()],
                    order_matters: true,
                },
            ],
        }
    }

    /// from_json_file
    ///
    /// Loads a catalog from a JSON array of challenge objects.
    pub fn from_json_file(path: &Path) -> Result<Self, ChallengeLoadError> {
        let raw = std::fs::read(path)?;
        let challenges: Vec<Challenge> = serde_json::from_slice(&raw)?;
        Self::new(challenges)
    }

    pub fn get(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn ids(&self) -> Vec<&str> {
        self.challenges.iter().map(|c| c.id.as_str()).collect()
    }
}
