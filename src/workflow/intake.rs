use std::sync::Arc;

use tracing::{info, warn};

use crate::context::AppContext;
use crate::domain::feedback::FeedbackSubmission;
use crate::domain::ticket::{NewTicket, Ticket};
use crate::error::{AppError, AppResult, InferenceError};

/// Validates, classifies and stores one piece of feedback.
///
/// Nothing is written unless classification fully succeeded. The write runs
/// on its own task, so a caller that goes away mid-save cannot leave the
/// store in an unknown state.
pub async fn submit_feedback(ctx: &AppContext, text: &str) -> AppResult<Ticket> {
    let submission = FeedbackSubmission::parse(text, ctx.config.max_input_chars)?;

    let timeout = ctx.config.classify_timeout;
    let result = tokio::time::timeout(timeout, ctx.pipeline.classify(submission.text()))
        .await
        .map_err(|_| {
            InferenceError::transient(format!(
                "classification timed out after {}s",
                timeout.as_secs_f32()
            ))
        })?
        .inspect_err(|err| warn!(error = %err, "feedback classification failed"))?;

    let ticket = NewTicket::from_classification(submission.into_text(), result);
    let store = Arc::clone(&ctx.ticket_store);
    let saved = tokio::spawn(async move { store.save(ticket).await })
        .await
        .map_err(|err| AppError::Store(format!("ticket write aborted: {err}")))?
        .inspect_err(|err| warn!(error = %err, "ticket write failed"))?;

    info!(
        ticket = %saved.id,
        tag = saved.tag.as_str(),
        priority_rank = saved.priority_rank,
        "feedback ticket created"
    );
    Ok(saved)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{AppConfig, StoredConfig};
    use crate::domain::tag::RoutingTag;
    use crate::infra::fake::{ScriptedInference, transient};
    use crate::infra::memory::InMemoryTicketStore;
    use crate::services::TicketStore;
    use crate::workflow::classification::ClassificationPipeline;
    use crate::workflow::retry::RetryPolicy;

    pub(crate) fn test_config() -> AppConfig {
        let mut config = AppConfig::resolve(StoredConfig::default(), |_| None).unwrap();
        config.retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        config.sentiment_enabled = false;
        config
    }

    pub(crate) fn context(
        inference: Arc<ScriptedInference>,
        store: Arc<InMemoryTicketStore>,
    ) -> AppContext {
        AppContext::new(test_config(), inference, store)
    }

    fn billing() -> ScriptedInference {
        ScriptedInference::new("Double charge on invoice.", &[("Billing", 0.7), ("Urgent", 0.2)])
    }

    #[tokio::test]
    async fn successful_submission_persists_one_ticket() {
        let store = Arc::new(InMemoryTicketStore::new());
        let ctx = context(Arc::new(billing()), store.clone());

        let ticket = submit_feedback(&ctx, "  I was charged twice this month  ")
            .await
            .unwrap();

        assert!(!ticket.id.is_empty());
        assert_eq!(ticket.original_text, "I was charged twice this month");
        assert_eq!(ticket.summary, "Double charge on invoice.");
        assert_eq!(ticket.tag, RoutingTag::Billing);
        assert_eq!(ticket.priority_rank, 1);
        assert_eq!(store.list_all().await.unwrap(), vec![ticket]);
    }

    #[tokio::test]
    async fn blank_submission_is_rejected_without_calls() {
        let inference = Arc::new(billing());
        let store = Arc::new(InMemoryTicketStore::new());
        let ctx = context(inference.clone(), store.clone());

        let err = submit_feedback(&ctx, " \n ").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(inference.summary_calls(), 0);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn transient_failures_below_limit_are_masked() {
        let inference = Arc::new(billing().fail_summary(transient(2)).fail_classify(transient(2)));
        let store = Arc::new(InMemoryTicketStore::new());
        let ctx = context(inference.clone(), store.clone());

        let ticket = submit_feedback(&ctx, "charged twice").await.unwrap();

        assert_eq!(ticket.tag, RoutingTag::Billing);
        assert_eq!(inference.summary_calls(), 3);
        assert_eq!(inference.classify_calls(), 3);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_persist_nothing() {
        let inference = Arc::new(billing().fail_summary(transient(3)));
        let store = Arc::new(InMemoryTicketStore::new());
        let ctx = context(inference, store.clone());

        let err = submit_feedback(&ctx, "charged twice").await.unwrap_err();

        assert!(matches!(err, AppError::Classification(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let store = Arc::new(InMemoryTicketStore::new());
        store.reject_writes(true);
        let ctx = context(Arc::new(billing()), store.clone());

        let err = submit_feedback(&ctx, "charged twice").await.unwrap_err();

        assert!(matches!(err, AppError::Store(_)));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn classification_timeout_persists_nothing() {
        let store = Arc::new(InMemoryTicketStore::new());
        let mut ctx = context(Arc::new(billing()), store.clone());
        ctx.config.classify_timeout = Duration::from_millis(50);
        ctx.pipeline = ClassificationPipeline::new(
            Arc::new(billing().fail_summary(transient(2))),
            ctx.config.labels.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(5),
            },
            ctx.config.summary_max_chars,
            false,
        );

        let err = submit_feedback(&ctx, "charged twice").await.unwrap_err();

        assert!(matches!(err, AppError::Classification(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn subscribers_see_submissions_in_order() {
        let store = Arc::new(InMemoryTicketStore::new());
        let mut early = store.watch();
        let ctx = context(Arc::new(billing()), store.clone());

        let t1 = submit_feedback(&ctx, "first complaint").await.unwrap();
        let mut late = store.watch();
        let t2 = submit_feedback(&ctx, "second complaint").await.unwrap();

        assert_eq!(early.recv().await.unwrap().id, t1.id);
        assert_eq!(early.recv().await.unwrap().id, t2.id);
        assert_eq!(late.recv().await.unwrap().id, t2.id);
    }
}
