use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::ticket::{NewTicket, Ticket};
use crate::error::AppResult;

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Durably writes the ticket; the store assigns id and creation time.
    async fn save(&self, ticket: NewTicket) -> AppResult<Ticket>;

    /// All tickets, most urgent first and newest first within a rank.
    async fn list_all(&self) -> AppResult<Vec<Ticket>>;

    fn feed(&self) -> &TicketFeed;

    fn backend_name(&self) -> &'static str;

    /// Must be called from within a tokio runtime.
    fn subscribe(&self, callback: Box<dyn Fn(Ticket) + Send + Sync>) -> SubscriptionHandle {
        self.feed().subscribe(callback)
    }

    fn watch(&self) -> UnboundedReceiver<Ticket> {
        self.feed().watch()
    }
}

/// Fan-out of newly created tickets to live subscribers.
///
/// Each subscriber owns an unbounded channel so a slow consumer never blocks
/// the writer or other subscribers. Stores call [`TicketFeed::publish`] in
/// creation order, which fixes the delivery order for every subscriber.
#[derive(Clone, Default)]
pub struct TicketFeed {
    inner: Arc<Mutex<FeedState>>,
}

#[derive(Default)]
struct FeedState {
    next_id: u64,
    subscribers: Vec<(u64, UnboundedSender<Ticket>)>,
}

impl TicketFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, ticket: &Ticket) {
        let mut state = self.state();
        state.subscribers.retain(|(id, sender)| {
            let delivered = sender.send(ticket.clone()).is_ok();
            if !delivered {
                debug!(subscriber = id, "dropping closed ticket subscriber");
            }
            delivered
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    pub fn watch(&self) -> UnboundedReceiver<Ticket> {
        self.register().1
    }

    pub fn subscribe(&self, callback: Box<dyn Fn(Ticket) + Send + Sync>) -> SubscriptionHandle {
        let (id, mut receiver) = self.register();
        let gate = Arc::new(CallbackGate::open());
        let task_gate = Arc::clone(&gate);

        let task = tokio::spawn(async move {
            while let Some(ticket) = receiver.recv().await {
                let _running = task_gate.lock_running();
                if !task_gate.active.load(Ordering::SeqCst) {
                    break;
                }
                *task_gate.callback_thread() = Some(thread::current().id());
                callback(ticket);
                *task_gate.callback_thread() = None;
            }
        });

        SubscriptionHandle {
            id,
            gate,
            feed: self.clone(),
            task: Some(task),
        }
    }

    fn register(&self) -> (u64, UnboundedReceiver<Ticket>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, sender));
        (id, receiver)
    }

    fn remove(&self, id: u64) {
        self.state().subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serializes callbacks against cancellation. `running` is held for the
/// whole of a callback; `callback_thread` names the thread executing it so a
/// callback can cancel its own subscription without waiting on itself.
struct CallbackGate {
    active: AtomicBool,
    running: Mutex<()>,
    callback_thread: Mutex<Option<ThreadId>>,
}

impl CallbackGate {
    fn open() -> Self {
        Self {
            active: AtomicBool::new(true),
            running: Mutex::new(()),
            callback_thread: Mutex::new(None),
        }
    }

    fn lock_running(&self) -> MutexGuard<'_, ()> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callback_thread(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.callback_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
        let inside_callback = *self.callback_thread() == Some(thread::current().id());
        if !inside_callback {
            // Waits out a callback already in flight.
            drop(self.lock_running());
        }
    }
}

/// Live subscription registered through [`TicketFeed::subscribe`].
/// Dropping the handle cancels it.
pub struct SubscriptionHandle {
    id: u64,
    gate: Arc<CallbackGate>,
    feed: TicketFeed,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stops delivery. Once this returns no further callback starts, and a
    /// callback that was running has finished. Called from inside its own
    /// callback it returns at once; that callback is the last one.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.gate.close();
        self.feed.remove(self.id);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::tag::RoutingTag;

    fn ticket(id: &str) -> Ticket {
        NewTicket {
            original_text: "text".to_string(),
            summary: "summary".to_string(),
            tag: RoutingTag::Billing,
            confidence: None,
            sentiment: None,
        }
        .into_ticket(id.to_string(), Utc::now())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn watchers_receive_tickets_in_publish_order() {
        let feed = TicketFeed::new();
        let mut first = feed.watch();
        feed.publish(&ticket("t1"));
        let mut second = feed.watch();
        feed.publish(&ticket("t2"));

        assert_eq!(first.recv().await.unwrap().id, "t1");
        assert_eq!(first.recv().await.unwrap().id, "t2");
        assert_eq!(second.recv().await.unwrap().id, "t2");
    }

    #[tokio::test]
    async fn closed_watchers_are_pruned() {
        let feed = TicketFeed::new();
        let receiver = feed.watch();
        assert_eq!(feed.subscriber_count(), 1);
        drop(receiver);
        feed.publish(&ticket("t1"));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_subscription_stops_callbacks() {
        let feed = TicketFeed::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = feed.subscribe(Box::new(move |t: Ticket| {
            sink.lock().unwrap().push(t.id);
        }));

        feed.publish(&ticket("t1"));
        settle().await;
        handle.cancel();
        feed.publish(&ticket("t2"));
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["t1".to_string()]);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn callback_can_cancel_its_own_subscription() {
        let feed = TicketFeed::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        let own_handle = Arc::clone(&slot);
        let handle = feed.subscribe(Box::new(move |t: Ticket| {
            sink.lock().unwrap().push(t.id);
            let handle = own_handle.lock().unwrap().take();
            if let Some(handle) = handle {
                handle.cancel();
            }
        }));
        *slot.lock().unwrap() = Some(handle);

        feed.publish(&ticket("t1"));
        feed.publish(&ticket("t2"));
        tokio::time::timeout(Duration::from_secs(2), async {
            while feed.subscriber_count() > 0 {
                settle().await;
            }
        })
        .await
        .expect("self-cancelling callback stalled");
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["t1".to_string()]);
        assert!(slot.lock().unwrap().is_none());
    }
}
