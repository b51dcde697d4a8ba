use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::ticket::{NewTicket, Ticket, sort_for_dashboard};
use crate::error::{AppError, AppResult};
use crate::services::{TicketFeed, TicketStore};

/// Process-local ticket store. Used when no Firestore project is configured
/// and as the store double in tests.
#[derive(Default)]
pub struct InMemoryTicketStore {
    state: Mutex<MemoryState>,
    feed: TicketFeed,
    reject_writes: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    last_created_at: Option<DateTime<Utc>>,
    tickets: Vec<Ticket>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unreachable store: every `save` fails until reset.
    #[cfg(test)]
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tickets
            .len()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn save(&self, ticket: NewTicket) -> AppResult<Ticket> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store(
                "in-memory store is rejecting writes".to_string(),
            ));
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_id += 1;
        let id = format!("mem-{:06}", state.next_id);

        // Keep creation times strictly increasing so ordering stays total.
        let mut created_at = Utc::now();
        if let Some(last) = state.last_created_at {
            if created_at <= last {
                created_at = last + Duration::microseconds(1);
            }
        }
        state.last_created_at = Some(created_at);

        let saved = ticket.into_ticket(id, created_at);
        state.tickets.push(saved.clone());
        // Published under the state lock so subscribers see creation order.
        self.feed.publish(&saved);
        Ok(saved)
    }

    async fn list_all(&self) -> AppResult<Vec<Ticket>> {
        let mut tickets = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tickets
            .clone();
        sort_for_dashboard(&mut tickets);
        Ok(tickets)
    }

    fn feed(&self) -> &TicketFeed {
        &self.feed
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::tag::RoutingTag;

    fn new_ticket(tag: RoutingTag) -> NewTicket {
        NewTicket {
            original_text: format!("{} feedback", tag.as_str()),
            summary: "summary".to_string(),
            tag,
            confidence: Some(0.9),
            sentiment: None,
        }
    }

    #[tokio::test]
    async fn assigns_ids_and_increasing_timestamps() {
        let store = InMemoryTicketStore::new();
        let first = store.save(new_ticket(RoutingTag::Praise)).await.unwrap();
        let second = store.save(new_ticket(RoutingTag::Praise)).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.created_at > first.created_at);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn lists_urgent_first_then_newest() {
        let store = InMemoryTicketStore::new();
        let u1 = store.save(new_ticket(RoutingTag::Urgent)).await.unwrap();
        let b = store.save(new_ticket(RoutingTag::Billing)).await.unwrap();
        let u2 = store.save(new_ticket(RoutingTag::Urgent)).await.unwrap();

        let ids = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![u2.id, u1.id, b.id]);
    }

    #[tokio::test]
    async fn rejected_write_persists_nothing() {
        let store = InMemoryTicketStore::new();
        let mut watcher = store.watch();
        store.reject_writes(true);
        let err = store.save(new_ticket(RoutingTag::Billing)).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(watcher.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_sees_later_tickets() {
        let store = Arc::new(InMemoryTicketStore::new());
        let mut early = store.watch();
        let t1 = store.save(new_ticket(RoutingTag::Billing)).await.unwrap();
        let mut late = store.watch();
        let t2 = store.save(new_ticket(RoutingTag::Urgent)).await.unwrap();

        assert_eq!(early.recv().await.unwrap().id, t1.id);
        assert_eq!(early.recv().await.unwrap().id, t2.id);
        assert_eq!(late.recv().await.unwrap().id, t2.id);
    }

    #[tokio::test]
    async fn callback_subscription_follows_creation_order() {
        let store = InMemoryTicketStore::new();
        store.save(new_ticket(RoutingTag::Praise)).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = store.subscribe(Box::new(move |ticket: Ticket| {
            sink.lock().unwrap().push(ticket.id);
        }));
        let t2 = store.save(new_ticket(RoutingTag::Billing)).await.unwrap();
        let t3 = store.save(new_ticket(RoutingTag::Urgent)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.cancel();

        assert_eq!(*seen.lock().unwrap(), vec![t2.id, t3.id]);
    }
}
