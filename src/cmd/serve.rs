use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::build_router;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct ServeCommandArgs {
    pub bind_address: String,
}

pub async fn run(ctx: AppContext, args: ServeCommandArgs) -> AppResult<()> {
    let store = ctx.ticket_store.backend_name();
    let app = build_router(Arc::new(ctx));

    let listener = TcpListener::bind(&args.bind_address).await.map_err(|err| {
        AppError::Server(format!("failed to bind {}: {err}", args.bind_address))
    })?;
    info!(address = %args.bind_address, store, "intelliroute listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Server(err.to_string()))?;

    info!("intelliroute shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => warn!(error = %err, "failed to listen for shutdown signal"),
    }
}
