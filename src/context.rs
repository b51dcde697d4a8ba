use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{InferenceService, TicketStore};
use crate::workflow::classification::ClassificationPipeline;

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub pipeline: ClassificationPipeline,
    pub ticket_store: Arc<dyn TicketStore>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        inference: Arc<dyn InferenceService>,
        ticket_store: Arc<dyn TicketStore>,
    ) -> Self {
        let pipeline = ClassificationPipeline::new(
            inference,
            config.labels.clone(),
            config.retry,
            config.summary_max_chars,
            config.sentiment_enabled,
        );
        Self {
            config,
            pipeline,
            ticket_store,
        }
    }
}
