use crate::context::AppContext;
use crate::domain::ticket::Ticket;
use crate::error::AppResult;
use crate::workflow::intake::submit_feedback;

#[derive(Debug, Clone)]
pub struct SubmitCommandArgs {
    pub text: String,
}

pub async fn run(ctx: &AppContext, args: SubmitCommandArgs) -> AppResult<Ticket> {
    submit_feedback(ctx, &args.text).await
}
