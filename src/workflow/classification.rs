use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::tag::{LabelSet, RoutingTag};
use crate::domain::ticket::{ClassificationResult, Sentiment};
use crate::error::InferenceError;
use crate::services::{InferenceService, LabelScore};
use crate::workflow::retry::RetryPolicy;

/// Summarizes and tags feedback through the inference provider.
///
/// The sub-calls run concurrently and each retries on its own, so a flaky
/// summarizer never re-runs a classification that already succeeded.
#[derive(Clone)]
pub struct ClassificationPipeline {
    inference: Arc<dyn InferenceService>,
    labels: LabelSet,
    retry: RetryPolicy,
    summary_max_chars: usize,
    sentiment_enabled: bool,
}

impl ClassificationPipeline {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        labels: LabelSet,
        retry: RetryPolicy,
        summary_max_chars: usize,
        sentiment_enabled: bool,
    ) -> Self {
        Self {
            inference,
            labels,
            retry,
            summary_max_chars,
            sentiment_enabled,
        }
    }

    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, InferenceError> {
        let candidate_labels = self.labels.labels();

        let summary = self
            .retry
            .run("summarize", || self.inference.summarize(text));
        let scores = self.retry.run("classify", || {
            self.inference.classify_labels(text, &candidate_labels)
        });
        let sentiment = async {
            if !self.sentiment_enabled {
                return Ok(None);
            }
            self.retry
                .run("sentiment", || self.inference.analyze_sentiment(text))
                .await
                .map(|scores| Some(select_sentiment(&scores)))
        };

        let (summary, scores, sentiment) = tokio::try_join!(summary, scores, sentiment)?;

        let summary = truncate_summary(&summary, self.summary_max_chars);
        if summary.is_empty() {
            return Err(InferenceError::permanent("provider returned an empty summary"));
        }

        let (tag, confidence) = select_tag(&scores, &self.labels);
        info!(tag = tag.as_str(), confidence = ?confidence, "feedback classified");

        Ok(ClassificationResult {
            summary,
            tag,
            confidence,
            sentiment,
        })
    }
}

/// Highest score among known candidate labels wins; equal scores go to the
/// more urgent tag. Falls back to the least urgent candidate when nothing
/// usable came back.
pub fn select_tag(scores: &[LabelScore], labels: &LabelSet) -> (RoutingTag, Option<f64>) {
    let mut best: Option<(RoutingTag, f64)> = None;
    for entry in scores {
        let Some(tag) = RoutingTag::from_str(&entry.label) else {
            debug!(label = %entry.label, "ignoring unknown label from provider");
            continue;
        };
        if !labels.contains(tag) || !entry.score.is_finite() {
            continue;
        }
        let score = entry.score.clamp(0.0, 1.0);
        best = match best {
            Some((best_tag, best_score))
                if best_score > score || (best_score == score && best_tag < tag) =>
            {
                Some((best_tag, best_score))
            }
            _ => Some((tag, score)),
        };
    }

    match best {
        Some((tag, score)) => (tag, Some(score)),
        None => (labels.fallback(), None),
    }
}

pub fn select_sentiment(scores: &[LabelScore]) -> Sentiment {
    scores
        .iter()
        .filter(|entry| entry.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .and_then(|top| Sentiment::from_str(&top.label))
        .unwrap_or(Sentiment::Neutral)
}

/// Trims and caps the summary at `max_chars` characters, marking the cut.
pub fn truncate_summary(summary: &str, max_chars: usize) -> String {
    let trimmed = summary.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut cut = trimmed
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>()
        .trim_end()
        .to_string();
    cut.push('…');
    cut
}
