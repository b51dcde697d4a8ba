use async_trait::async_trait;
use serde::Deserialize;

use crate::error::InferenceError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Remote text-analysis capabilities used by the classification pipeline.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, InferenceError>;

    /// Zero-shot scores for `text` against `candidate_labels`.
    async fn classify_labels(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<Vec<LabelScore>, InferenceError>;

    async fn analyze_sentiment(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError>;
}
