use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A periodic task that calls `resend` every `interval` until stopped.
///
/// Sleeping is implemented as an interruptible wait on a condvar rather
/// than `thread::sleep`, so [`Heartbeat::stop`] returns promptly instead of
/// waiting out the remainder of the current interval.
pub(crate) struct Heartbeat {
    signal: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub(crate) fn start(interval: Duration, resend: impl Fn() + Send + 'static) -> Self {
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let loop_signal = signal.clone();
        let handle = thread::spawn(move || {
            let (lock, cvar) = &*loop_signal;
            loop {
                let guard = lock.lock().unwrap();
                let (guard, result) = cvar.wait_timeout_while(guard, interval, |stopped| !*stopped).unwrap();
                if *guard {
                    return;
                }
                drop(guard);
                debug_assert!(result.timed_out());
                resend();
            }
        });
        Heartbeat {
            signal,
            handle: Some(handle),
        }
    }

    pub(crate) fn stop(mut self) {
        *self.signal.0.lock().unwrap() = true;
        self.signal.1.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
