use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use launchlink_message::{construct_message, ComsError, Message};

use crate::strategy::Strategy;

/// Poll interval for [`LocalStrategy::read`]: how often it wakes to check
/// for cancellation even if nothing was pushed.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct Inbox {
    queue: Mutex<VecDeque<String>>,
    ready: Condvar,
}

impl Inbox {
    fn new() -> Self {
        Inbox {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    fn push(&self, encoded: String) {
        self.queue.lock().unwrap().push_back(encoded);
        self.ready.notify_all();
    }
}

/// An in-memory loopback transport for tests.
///
/// Each instance owns its own inbox and a set of peers to write to;
/// [`LocalStrategy::link`] makes two instances mutual peers. The inbox is a
/// `Mutex`-guarded `VecDeque` woken by a `Condvar`, since the reader
/// typically runs on the driver's read-worker thread while writes come
/// from whatever thread calls `Driver::write`.
pub struct LocalStrategy {
    inbox: Arc<Inbox>,
    peers: Mutex<Vec<Arc<Inbox>>>,
    cancelled: Arc<(Mutex<bool>, Condvar)>,
}

impl Default for LocalStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStrategy {
    pub fn new() -> Self {
        LocalStrategy {
            inbox: Arc::new(Inbox::new()),
            peers: Mutex::new(Vec::new()),
            cancelled: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Declare that `self` should receive whatever `other` writes.
    fn listen_to(&self, other: &LocalStrategy) {
        other.peers.lock().unwrap().push(self.inbox.clone());
    }

    /// Make `a` and `b` mutual peers: each receives what the other writes.
    /// Sugar over two [`LocalStrategy::listen_to`] calls.
    pub fn link(a: &LocalStrategy, b: &LocalStrategy) {
        a.listen_to(b);
        b.listen_to(a);
    }

    /// Convenience for tests: build and link a pair in one call.
    pub fn linked_pair() -> (LocalStrategy, LocalStrategy) {
        let a = LocalStrategy::new();
        let b = LocalStrategy::new();
        LocalStrategy::link(&a, &b);
        (a, b)
    }
}

impl Strategy for LocalStrategy {
    fn read(&self) -> Result<Message, ComsError> {
        loop {
            {
                let mut queue = self.inbox.queue.lock().unwrap();
                if let Some(encoded) = queue.pop_front() {
                    return construct_message(encoded);
                }
            }
            if *self.cancelled.0.lock().unwrap() {
                return Err(ComsError::read("local strategy cancelled"));
            }
            // Wait on our own inbox condvar, but wake early (at ~5 Hz) to
            // notice cancellation even if nothing was ever pushed.
            let guard = self.inbox.queue.lock().unwrap();
            let _ = self.inbox.ready.wait_timeout(guard, POLL_INTERVAL).unwrap();
        }
    }

    fn write(&self, m: &Message) -> Result<(), ComsError> {
        let encoded = m.to_string();
        for peer in self.peers.lock().unwrap().iter() {
            peer.push(encoded.clone());
        }
        Ok(())
    }

    fn cancel(&self) {
        *self.cancelled.0.lock().unwrap() = true;
        self.cancelled.1.notify_all();
        self.inbox.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchlink_message::MessageFields;

    fn abort_message(abort: bool) -> Message {
        Message::new(MessageFields {
            abort,
            ..Default::default()
        })
    }

    #[test]
    fn linked_pair_delivers_in_order() {
        let (a, b) = LocalStrategy::linked_pair();
        a.write(&abort_message(false)).unwrap();
        a.write(&abort_message(true)).unwrap();
        let first = b.read().unwrap();
        let second = b.read().unwrap();
        assert_eq!(first.abort(), 0);
        assert_eq!(second.abort(), 1);
    }

    #[test]
    fn cancel_unblocks_a_pending_read() {
        let strat = LocalStrategy::new();
        let strat = Arc::new(strat);
        let reader = {
            let strat = strat.clone();
            std::thread::spawn(move || strat.read())
        };
        std::thread::sleep(Duration::from_millis(50));
        strat.cancel();
        let result = reader.join().unwrap();
        assert!(result.is_err());
    }
}
