pub mod inference;
pub mod ticket_store;

pub use inference::{InferenceService, LabelScore};
pub use ticket_store::{SubscriptionHandle, TicketFeed, TicketStore};
