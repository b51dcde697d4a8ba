use crate::context::AppContext;
use crate::domain::ticket::Ticket;
use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct ListCommandArgs {
    pub urgent_only: bool,
}

pub async fn run(ctx: &AppContext, args: ListCommandArgs) -> AppResult<Vec<Ticket>> {
    let mut tickets = ctx.ticket_store.list_all().await?;
    if args.urgent_only {
        tickets.retain(Ticket::is_urgent);
    }
    Ok(tickets)
}

/// One line per ticket: rank, tag, creation time, summary.
pub fn format_row(ticket: &Ticket) -> String {
    format!(
        "[{}] {:<17} {}  {}  ({})",
        ticket.priority_rank,
        ticket.tag.as_str(),
        ticket.created_at.format("%Y-%m-%d %H:%M:%S"),
        ticket.summary,
        ticket.id
    )
}
