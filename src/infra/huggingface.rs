use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult, FailureKind, InferenceError};
use crate::services::{InferenceService, LabelScore};

#[derive(Debug, Clone)]
pub struct HuggingFaceSettings {
    pub api_token: Option<String>,
    pub base_url: String,
    pub summarization_model: String,
    pub zero_shot_model: String,
    pub sentiment_model: String,
    pub request_timeout: Duration,
}

/// Hugging Face hosted inference, one model per task.
pub struct HuggingFaceClient {
    http: Client,
    settings: HuggingFaceSettings,
}

impl HuggingFaceClient {
    pub fn new(settings: HuggingFaceSettings) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| {
                AppError::Configuration(format!("failed to build inference client: {err}"))
            })?;
        Ok(Self { http, settings })
    }

    fn api_token(&self) -> Result<&str, InferenceError> {
        self.settings
            .api_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| InferenceError::permanent("Hugging Face API token not configured"))
    }

    fn model_endpoint(base_url: &str, model: &str) -> String {
        format!(
            "{}/models/{}",
            base_url.trim_end_matches('/'),
            model.trim_matches('/')
        )
    }

    async fn infer<B, R>(&self, model: &str, body: &B) -> Result<R, InferenceError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let token = self.api_token()?;
        let endpoint = Self::model_endpoint(&self.settings.base_url, model);
        debug!(%endpoint, "calling inference provider");

        let response = self
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| request_failure(model, &err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read response>".to_string());
            return Err(InferenceError {
                kind: failure_kind_for_status(status),
                message: format!("{model} responded with {status}: {}", error_detail(&body)),
            });
        }

        response.json::<R>().await.map_err(|err| {
            InferenceError::permanent(format!("failed to parse {model} response: {err}"))
        })
    }
}

#[async_trait]
impl InferenceService for HuggingFaceClient {
    async fn summarize(&self, text: &str) -> Result<String, InferenceError> {
        let payload: SummaryResponse = self
            .infer(
                &self.settings.summarization_model,
                &InferenceRequest::<()>::text(text),
            )
            .await?;
        let summary = payload.into_text().trim().to_string();
        if summary.is_empty() {
            return Err(InferenceError::permanent(
                "summarization returned an empty summary",
            ));
        }
        Ok(summary)
    }

    async fn classify_labels(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<Vec<LabelScore>, InferenceError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: Some(ZeroShotParameters { candidate_labels }),
        };
        let payload: ZeroShotResponse = self
            .infer(&self.settings.zero_shot_model, &request)
            .await?;
        payload.into_scores()
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<Vec<LabelScore>, InferenceError> {
        let payload: SentimentResponse = self
            .infer(
                &self.settings.sentiment_model,
                &InferenceRequest::<()>::text(text),
            )
            .await?;
        Ok(payload.into_scores())
    }
}

/// Timeouts, rate limits and server-side failures are worth retrying.
fn failure_kind_for_status(status: StatusCode) -> FailureKind {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

fn request_failure(model: &str, err: &reqwest::Error) -> InferenceError {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    };
    InferenceError {
        kind,
        message: format!("failed to call {model}: {err}"),
    }
}

/// Pulls `error` out of the provider's JSON error body when there is one.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
        estimated_time: Option<f64>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            estimated_time: Some(secs),
        }) => format!("{error} (ready in ~{secs:.0}s)"),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a, P> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<P>,
}

impl<'a> InferenceRequest<'a, ()> {
    fn text(inputs: &'a str) -> Self {
        Self {
            inputs,
            parameters: None,
        }
    }
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [&'a str],
}

#[derive(Deserialize)]
struct SummaryText {
    summary_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryResponse {
    List(Vec<SummaryText>),
    Single(SummaryText),
}

impl SummaryResponse {
    fn into_text(self) -> String {
        match self {
            SummaryResponse::List(items) => items
                .into_iter()
                .next()
                .map(|item| item.summary_text)
                .unwrap_or_default(),
            SummaryResponse::Single(item) => item.summary_text,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Pairs(Vec<LabelScore>),
    Columns { labels: Vec<String>, scores: Vec<f64> },
}

impl ZeroShotResponse {
    fn into_scores(self) -> Result<Vec<LabelScore>, InferenceError> {
        match self {
            ZeroShotResponse::Pairs(scores) => Ok(scores),
            ZeroShotResponse::Columns { labels, scores } => {
                if labels.len() != scores.len() {
                    return Err(InferenceError::permanent(format!(
                        "zero-shot response has {} labels but {} scores",
                        labels.len(),
                        scores.len()
                    )));
                }
                Ok(labels
                    .into_iter()
                    .zip(scores)
                    .map(|(label, score)| LabelScore::new(label, score))
                    .collect())
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl SentimentResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            SentimentResponse::Nested(batches) => batches.into_iter().flatten().collect(),
            SentimentResponse::Flat(scores) => scores,
        }
    }
}
