use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::error::InferenceError;
use crate::services::{InferenceService, LabelScore};

/// Inference double: each task replays queued failures, then answers with
/// its configured response.
pub struct ScriptedInference {
    summary: String,
    scores: Vec<LabelScore>,
    sentiment: Vec<LabelScore>,
    summary_failures: Mutex<VecDeque<InferenceError>>,
    classify_failures: Mutex<VecDeque<InferenceError>>,
    sentiment_failures: Mutex<VecDeque<InferenceError>>,
    summary_calls: AtomicU32,
    classify_calls: AtomicU32,
    sentiment_calls: AtomicU32,
}

impl ScriptedInference {
    pub fn new(summary: &str, scores: &[(&str, f64)]) -> Self {
        Self {
            summary: summary.to_string(),
            scores: scores
                .iter()
                .map(|(label, score)| LabelScore::new(*label, *score))
                .collect(),
            sentiment: vec![
                LabelScore::new("NEGATIVE", 0.9),
                LabelScore::new("POSITIVE", 0.1),
            ],
            summary_failures: Mutex::new(VecDeque::new()),
            classify_failures: Mutex::new(VecDeque::new()),
            sentiment_failures: Mutex::new(VecDeque::new()),
            summary_calls: AtomicU32::new(0),
            classify_calls: AtomicU32::new(0),
            sentiment_calls: AtomicU32::new(0),
        }
    }

    pub fn fail_summary(self, failures: impl IntoIterator<Item = InferenceError>) -> Self {
        self.summary_failures.lock().unwrap().extend(failures);
        self
    }

    pub fn fail_classify(self, failures: impl IntoIterator<Item = InferenceError>) -> Self {
        self.classify_failures.lock().unwrap().extend(failures);
        self
    }

    pub fn fail_sentiment(self, failures: impl IntoIterator<Item = InferenceError>) -> Self {
        self.sentiment_failures.lock().unwrap().extend(failures);
        self
    }

    pub fn summary_calls(&self) -> u32 {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> u32 {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn sentiment_calls(&self) -> u32 {
        self.sentiment_calls.load(Ordering::SeqCst)
    }
}

pub fn transient(count: usize) -> Vec<InferenceError> {
    (0..count)
        .map(|n| InferenceError::transient(format!("503 on attempt {}", n + 1)))
        .collect()
}

#[async_trait]
impl InferenceService for ScriptedInference {
    async fn summarize(&self, _text: &str) -> Result<String, InferenceError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        match self.summary_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(self.summary.clone()),
        }
    }

    async fn classify_labels(
        &self,
        _text: &str,
        _candidate_labels: &[&str],
    ) -> Result<Vec<LabelScore>, InferenceError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        match self.classify_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(self.scores.clone()),
        }
    }

    async fn analyze_sentiment(&self, _text: &str) -> Result<Vec<LabelScore>, InferenceError> {
        self.sentiment_calls.fetch_add(1, Ordering::SeqCst);
        match self.sentiment_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(self.sentiment.clone()),
        }
    }
}
