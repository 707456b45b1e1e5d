use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use launchlink_message::Message;

use crate::strategy::Strategy;

/// Background worker that isolates each blocking [`Strategy::read`] call so
/// it can be cancelled.
///
/// `Strategy::read()` may block indefinitely and has no built-in
/// cancellation, so each read attempt runs on its own short-lived child
/// thread; the worker waits on it with a bounded timeout and, on
/// [`ReadWorker::stop`], asks the strategy to cancel the in-flight read
/// rather than trying to forcibly kill the child thread (Rust has no safe,
/// portable primitive for that).
pub(crate) struct ReadWorker {
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// How long the worker waits on one in-flight read attempt before checking
/// whether it has been asked to stop.
const CHILD_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Grace period given to a strategy's `cancel()` to actually unblock the
/// in-flight read before the worker gives up waiting on it.
const CANCEL_GRACE: Duration = Duration::from_millis(200);

impl ReadWorker {
    pub(crate) fn spawn(
        strategy: Arc<dyn Strategy>,
        on_message: Arc<dyn Fn(Message) + Send + Sync>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let loop_stop = stop.clone();
        let loop_running = running.clone();
        let handle = thread::spawn(move || {
            read_loop(strategy, &loop_stop, on_message.as_ref());
            loop_running.store(false, Ordering::SeqCst);
        });

        ReadWorker {
            stop,
            running,
            handle: Some(handle),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal stop and wait for the worker to settle.
    ///
    /// `timeout = None` waits indefinitely. `timeout = Some(d)` polls for
    /// up to `d` and then detaches the background thread rather than
    /// blocking past the deadline: the bounded-shutdown guarantee binds
    /// how long `end_read_loop` takes to return, not how long a stubborn
    /// strategy takes to actually unwind in the background.
    pub(crate) fn stop(mut self, timeout: Option<Duration>) {
        self.stop.store(true, Ordering::SeqCst);
        match (timeout, self.handle.take()) {
            (None, Some(handle)) => {
                let _ = handle.join();
            }
            (Some(deadline), Some(handle)) => {
                let started = Instant::now();
                while self.running.load(Ordering::SeqCst) && started.elapsed() < deadline {
                    thread::sleep(Duration::from_millis(10));
                }
                drop(handle);
            }
            (_, None) => {}
        }
    }
}

fn read_loop(strategy: Arc<dyn Strategy>, stop: &AtomicBool, on_message: &(dyn Fn(Message) + Send + Sync)) {
    while !stop.load(Ordering::SeqCst) {
        let (tx, rx) = mpsc::channel();
        let child_strategy = strategy.clone();
        let _child = thread::spawn(move || {
            let result = child_strategy.read();
            let _ = tx.send(result);
        });

        loop {
            match rx.recv_timeout(CHILD_POLL_INTERVAL) {
                Ok(Ok(message)) => {
                    on_message(message);
                    break;
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "strategy read failed; retrying with a fresh read");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if stop.load(Ordering::SeqCst) {
                        strategy.cancel();
                        // Best-effort: give the in-flight read a moment to
                        // actually unblock before we give up on it.
                        let _ = rx.recv_timeout(CANCEL_GRACE);
                        return;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    tracing::error!("strategy read thread ended without a result");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchlink_message::{ComsError, MessageFields};
    use std::sync::Mutex;

    struct NeverReturns {
        cancelled: Arc<(Mutex<bool>, std::sync::Condvar)>,
    }

    impl Strategy for NeverReturns {
        fn read(&self) -> Result<Message, ComsError> {
            let (lock, cvar) = &*self.cancelled;
            let mut cancelled = lock.lock().unwrap();
            while !*cancelled {
                let (guard, _) = cvar
                    .wait_timeout(cancelled, Duration::from_millis(50))
                    .unwrap();
                cancelled = guard;
            }
            Err(ComsError::read("cancelled"))
        }

        fn write(&self, _m: &Message) -> Result<(), ComsError> {
            Ok(())
        }

        fn cancel(&self) {
            *self.cancelled.0.lock().unwrap() = true;
            self.cancelled.1.notify_all();
        }
    }

    #[test]
    fn stop_bounds_shutdown_even_with_a_blocking_strategy() {
        let strategy: Arc<dyn Strategy> = Arc::new(NeverReturns {
            cancelled: Arc::new((Mutex::new(false), std::sync::Condvar::new())),
        });
        let worker = ReadWorker::spawn(strategy, Arc::new(|_m: Message| {}));
        thread::sleep(Duration::from_millis(100));
        let started = Instant::now();
        worker.stop(Some(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn successful_reads_are_delivered_to_the_callback() {
        use crate::local::LocalStrategy;
        let (a, b) = LocalStrategy::linked_pair();
        let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let strategy: Arc<dyn Strategy> = Arc::new(b);
        let worker = ReadWorker::spawn(
            strategy,
            Arc::new(move |m: Message| sink.lock().unwrap().push(m)),
        );
        a.write(&Message::new(MessageFields::default())).unwrap();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(received.lock().unwrap().len(), 1);
        worker.stop(Some(Duration::from_secs(2)));
    }
}
