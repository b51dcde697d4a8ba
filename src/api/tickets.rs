use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::stream;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{ErrorResponse, error_response};
use crate::context::AppContext;
use crate::domain::ticket::Ticket;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub urgent_only: bool,
}

/// GET /api/tickets: dashboard order, optionally urgent tickets only.
pub async fn list_tickets(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, (StatusCode, Json<ErrorResponse>)> {
    let mut tickets = ctx
        .ticket_store
        .list_all()
        .await
        .map_err(|err| error_response(&err))?;
    if query.urgent_only {
        tickets.retain(Ticket::is_urgent);
    }
    Ok(Json(tickets))
}

/// GET /api/tickets/stream: one `ticket` event per newly created ticket.
pub async fn stream_tickets(
    State(ctx): State<Arc<AppContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = ctx.ticket_store.watch();
    debug!("live ticket stream opened");

    let events = stream::unfold(receiver, |mut receiver| async move {
        let ticket = receiver.recv().await?;
        let event = match Event::default().event("ticket").json_data(&ticket) {
            Ok(event) => event.id(ticket.id.clone()),
            Err(err) => {
                warn!(ticket = %ticket.id, error = %err, "failed to encode ticket event");
                Event::default().event("error").data("encoding failed")
            }
        };
        Some((Ok(event), receiver))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
