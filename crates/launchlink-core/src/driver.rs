use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use launchlink_message::{construct_message, ComsError, ComsInput, Message};

use crate::strategy::Strategy;
use crate::subscriber::{Subscription, SubscriptionId};
use crate::worker::ReadWorker;

/// Drives one end of a link over a pluggable [`Strategy`]: owns the
/// transport, runs a cancellable background read loop, and fans out every
/// received message to registered subscribers.
pub struct Driver {
    strategy: Arc<dyn Strategy>,
    subscribers: Arc<Mutex<HashMap<u64, Subscription>>>,
    next_sub_id: AtomicU64,
    worker: Mutex<Option<ReadWorker>>,
}

impl Driver {
    pub fn new(strategy: Arc<dyn Strategy>) -> Self {
        Driver {
            strategy,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_sub_id: AtomicU64::new(0),
            worker: Mutex::new(None),
        }
    }

    /// Start the background read loop if it isn't already running. Callers
    /// that need every inbound message to reach subscribers from the start
    /// should call this before the strategy has a chance to receive
    /// anything.
    pub fn start_read_loop(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.as_ref().is_some_and(ReadWorker::is_alive) {
            return;
        }
        let subscribers = self.subscribers.clone();
        let notify: Arc<dyn Fn(Message) + Send + Sync> = Arc::new(move |message| {
            notify_subscribers(&subscribers, &message);
        });
        *worker = Some(ReadWorker::spawn(self.strategy.clone(), notify));
    }

    /// Stop the background read loop, if any. `timeout = None` blocks until
    /// the worker has fully settled; `Some(d)` bounds how long this call
    /// itself blocks before giving up on a stubborn strategy.
    pub fn end_read_loop(&self, timeout: Option<Duration>) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            worker.stop(timeout);
        }
    }

    pub fn is_reading(&self) -> bool {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(ReadWorker::is_alive)
    }

    /// Register a standing subscriber and return a handle that can later be
    /// passed to [`Driver::unregister`].
    pub fn register(&self, subscription: Subscription) -> SubscriptionId {
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().insert(id, subscription);
        SubscriptionId(id)
    }

    pub fn unregister(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().remove(&id.0);
    }

    /// Block for the next message by registering a one-shot subscription
    /// and waiting on it, so a caller can mix `read()` calls with a live
    /// subscriber set without racing the background worker for the same
    /// bytes. If no read loop is running, nothing will ever notify this
    /// subscription, so the call simply blocks until `timeout` elapses.
    pub fn read(&self, timeout: Option<Duration>) -> Result<Message, ComsError> {
        let slot: Arc<(Mutex<Option<Message>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let waiter = slot.clone();
        let id = self.register(Subscription::once(move |m: &Message| {
            *waiter.0.lock().unwrap() = Some(m.clone());
            waiter.1.notify_all();
        }));

        let (lock, cvar) = &*slot;
        let mut received = lock.lock().unwrap();
        let result = match timeout {
            None => {
                while received.is_none() {
                    received = cvar.wait(received).unwrap();
                }
                received.take()
            }
            Some(d) => {
                let (guard, timed_out) = cvar.wait_timeout_while(received, d, |m| m.is_none()).unwrap();
                received = guard;
                if timed_out.timed_out() {
                    None
                } else {
                    received.take()
                }
            }
        };

        self.unregister(id);
        result.ok_or_else(|| ComsError::read("timed out waiting for a message"))
    }

    /// Serialize and send `input` through the strategy. Returns `Ok(true)`
    /// on success; on failure, returns `Ok(false)` if `suppress_errors` is
    /// set, otherwise propagates the error.
    pub fn write(&self, input: impl Into<ComsInput>, suppress_errors: bool) -> Result<bool, ComsError> {
        let message = construct_message(input)?;
        match self.strategy.write(&message) {
            Ok(()) => Ok(true),
            Err(err) if suppress_errors => {
                tracing::warn!(error = %err, "suppressed write failure");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

fn notify_subscribers(subscribers: &Mutex<HashMap<u64, Subscription>>, message: &Message) {
    let snapshot_ids: Vec<u64> = subscribers.lock().unwrap().keys().copied().collect();
    let mut to_drop = Vec::new();

    for id in snapshot_ids {
        let invoked = {
            let guard = subscribers.lock().unwrap();
            let Some(sub) = guard.get(&id) else {
                continue;
            };
            let callback = &sub.callback;
            let tolerate_errors = sub.tolerate_errors;
            let once = sub.once;
            let result = catch_unwind(AssertUnwindSafe(|| callback(message)));
            (result, tolerate_errors, once)
        };
        let (result, tolerate_errors, once) = invoked;
        match result {
            Ok(()) => {
                if once {
                    to_drop.push(id);
                }
            }
            Err(panic) => {
                let reason = panic_message(&panic);
                tracing::error!(subscriber = id, error = %reason, "subscriber callback panicked");
                if !tolerate_errors {
                    to_drop.push(id);
                }
            }
        }
    }

    if !to_drop.is_empty() {
        let mut guard = subscribers.lock().unwrap();
        for id in to_drop {
            guard.remove(&id);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStrategy;
    use launchlink_message::MessageFields;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn read_without_a_running_loop_times_out_since_nothing_notifies_it() {
        let (a, b) = LocalStrategy::linked_pair();
        let driver = Driver::new(Arc::new(b));
        a.write(&Message::new(MessageFields::default())).unwrap();
        let err = driver.read(Some(Duration::from_millis(200))).unwrap_err();
        assert!(matches!(err, ComsError::Read(_)));
    }

    #[test]
    fn read_with_a_running_loop_consumes_via_subscription() {
        let (a, b) = LocalStrategy::linked_pair();
        let driver = Driver::new(Arc::new(b));
        driver.start_read_loop();
        a.write(&Message::new(MessageFields {
            launch: true,
            ..Default::default()
        }))
        .unwrap();
        let message = driver.read(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(message.launch(), 1);
        driver.end_read_loop(Some(Duration::from_secs(1)));
    }

    #[test]
    fn read_times_out_when_nothing_arrives() {
        let (_a, b) = LocalStrategy::linked_pair();
        let driver = Driver::new(Arc::new(b));
        driver.start_read_loop();
        let err = driver.read(Some(Duration::from_millis(200))).unwrap_err();
        assert!(matches!(err, ComsError::Read(_)));
        driver.end_read_loop(Some(Duration::from_secs(1)));
    }

    #[test]
    fn standing_subscribers_all_receive_every_message() {
        let (a, b) = LocalStrategy::linked_pair();
        let driver = Driver::new(Arc::new(b));
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let c2 = count.clone();
        driver.register(Subscription::new(move |_m| { c1.fetch_add(1, Ordering::SeqCst); }, true));
        driver.register(Subscription::new(move |_m| { c2.fetch_add(1, Ordering::SeqCst); }, true));
        driver.start_read_loop();
        a.write(&Message::new(MessageFields::default())).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        driver.end_read_loop(Some(Duration::from_secs(1)));
    }

    #[test]
    fn a_panicking_non_tolerant_subscriber_is_dropped() {
        let (a, b) = LocalStrategy::linked_pair();
        let driver = Driver::new(Arc::new(b));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        driver.register(Subscription::new(
            move |_m| {
                c.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            },
            false,
        ));
        driver.start_read_loop();
        a.write(&Message::new(MessageFields::default())).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        a.write(&Message::new(MessageFields::default())).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        driver.end_read_loop(Some(Duration::from_secs(1)));
    }

    #[test]
    fn write_suppresses_errors_when_requested() {
        struct AlwaysFails;
        impl Strategy for AlwaysFails {
            fn read(&self) -> Result<Message, ComsError> {
                Err(ComsError::read("n/a"))
            }
            fn write(&self, _m: &Message) -> Result<(), ComsError> {
                Err(ComsError::write("link down"))
            }
        }
        let driver = Driver::new(Arc::new(AlwaysFails));
        let ok = driver
            .write(Message::new(MessageFields::default()), true)
            .unwrap();
        assert!(!ok);
        let err = driver
            .write(Message::new(MessageFields::default()), false)
            .unwrap_err();
        assert!(matches!(err, ComsError::Write(_)));
    }
}
