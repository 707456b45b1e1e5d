//! Shared test doubles used by the workspace's integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use launchlink_core::{Queueable, Strategy, Subscription};
use launchlink_message::{ComsError, Message};

/// Records every message it sees, in delivery order, behind a lock so the
/// test thread can snapshot it after the fact.
#[derive(Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    /// Wrap this sink as a standing, error-tolerant [`Subscription`].
    pub fn as_subscription(&self) -> Subscription {
        let sink = self.clone();
        Subscription::new(move |m: &Message| sink.messages.lock().unwrap().push(m.clone()), true)
    }
}

impl Queueable for RecordingSink {
    fn append(&self, m: Message) {
        self.messages.lock().unwrap().push(m);
    }
}

/// A [`Strategy`] whose `read()` never returns on its own, for exercising
/// worker-cancellation paths. `cancel()` is the only way it ever unblocks.
pub struct NeverReturningStrategy {
    cancelled: Arc<(Mutex<bool>, Condvar)>,
    reads_attempted: Arc<AtomicBool>,
}

impl Default for NeverReturningStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl NeverReturningStrategy {
    pub fn new() -> Self {
        NeverReturningStrategy {
            cancelled: Arc::new((Mutex::new(false), Condvar::new())),
            reads_attempted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn has_been_read_from(&self) -> bool {
        self.reads_attempted.load(Ordering::SeqCst)
    }
}

impl Strategy for NeverReturningStrategy {
    fn read(&self) -> Result<Message, ComsError> {
        self.reads_attempted.store(true, Ordering::SeqCst);
        let (lock, cvar) = &*self.cancelled;
        let mut cancelled = lock.lock().unwrap();
        while !*cancelled {
            let (guard, _) = cvar.wait_timeout(cancelled, Duration::from_secs(10_000)).unwrap();
            cancelled = guard;
        }
        Err(ComsError::read("never-returning strategy cancelled"))
    }

    fn write(&self, _m: &Message) -> Result<(), ComsError> {
        Ok(())
    }

    fn cancel(&self) {
        *self.cancelled.0.lock().unwrap() = true;
        self.cancelled.1.notify_all();
    }
}
