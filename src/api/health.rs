use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub live_subscribers: usize,
}

pub async fn get_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: ctx.ticket_store.backend_name(),
        live_subscribers: ctx.ticket_store.feed().subscriber_count(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::api::build_router;
    use crate::infra::fake::ScriptedInference;
    use crate::infra::memory::InMemoryTicketStore;
    use crate::services::TicketStore;
    use crate::workflow::intake::tests::context;

    #[tokio::test]
    async fn reports_backend_and_subscribers() {
        let store = Arc::new(InMemoryTicketStore::new());
        let _watcher = store.watch();
        let app = build_router(Arc::new(context(
            Arc::new(ScriptedInference::new("s", &[])),
            store,
        )));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["live_subscribers"], 1);
    }
}
