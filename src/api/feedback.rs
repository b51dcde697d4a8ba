use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::{ErrorResponse, error_response};
use crate::context::AppContext;
use crate::domain::ticket::Ticket;
use crate::error::AppError;
use crate::workflow::intake::submit_feedback;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: String,
}

/// POST /api/analyze: classify feedback and store it as a ticket.
pub async fn analyze_feedback(
    State(ctx): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Ticket>), (StatusCode, Json<ErrorResponse>)> {
    let request: AnalyzeRequest = serde_json::from_slice(&body).map_err(|err| {
        error_response(&AppError::Validation(format!("invalid JSON body: {err}")))
    })?;

    let ticket = submit_feedback(&ctx, &request.text)
        .await
        .map_err(|err| error_response(&err))?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header::CONTENT_TYPE};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::api::build_router;
    use crate::error::InferenceError;
    use crate::infra::fake::ScriptedInference;
    use crate::infra::memory::InMemoryTicketStore;
    use crate::workflow::intake::tests::context;

    use super::*;

    async fn post(app: axum::Router, body: &str) -> (StatusCode, Value) {
        post_to(app, "/api/analyze", body).await
    }

    async fn post_to(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn router(inference: ScriptedInference, store: Arc<InMemoryTicketStore>) -> axum::Router {
        build_router(Arc::new(context(Arc::new(inference), store)))
    }

    fn urgent() -> ScriptedInference {
        ScriptedInference::new("Checkout is down.", &[("Urgent", 0.95)])
    }

    #[tokio::test]
    async fn creates_ticket() {
        let store = Arc::new(InMemoryTicketStore::new());
        let (status, body) = post(
            router(urgent(), store.clone()),
            r#"{"text":"Checkout fails for every customer"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["tag"], "Urgent");
        assert_eq!(body["priorityRank"], 0);
        assert_eq!(body["summary"], "Checkout is down.");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn accepts_trailing_slash_route() {
        let store = Arc::new(InMemoryTicketStore::new());
        let (status, body) = post_to(
            router(urgent(), store.clone()),
            "/api/analyze/",
            r#"{"text":"Checkout fails for every customer"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["tag"], "Urgent");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn reports_each_error_kind() {
        let store = Arc::new(InMemoryTicketStore::new());
        let (status, body) = post(router(urgent(), store.clone()), r#"{"text":"   "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");

        let (status, body) = post(router(urgent(), store.clone()), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");

        let failing = urgent().fail_classify([InferenceError::permanent("401 Unauthorized")]);
        let (status, body) = post(router(failing, store.clone()), r#"{"text":"help"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "classification");

        store.reject_writes(true);
        let (status, body) = post(router(urgent(), store.clone()), r#"{"text":"help"}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "store");

        assert_eq!(store.len(), 0);
    }
}
