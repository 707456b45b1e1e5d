use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use launchlink_core::{Driver, Queueable, Subscription};
use launchlink_message::{construct_message, ComsError, ComsInput, DataMap, Message};

use crate::heartbeat::Heartbeat;

/// Which end of the link a [`StationCore`] is playing. Ground and Launch
/// share everything in this module; the two differ only in which hook
/// touches `last_data` and in `GroundStation`'s command-transition
/// validator (layered on top in `ground.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Ground,
    Launch,
}

/// Shared endpoint state and lifecycle, common to [`crate::GroundStation`]
/// and [`crate::LaunchStation`].
pub struct StationCore {
    role: Role,
    driver: Driver,
    last_sent: Mutex<Option<Message>>,
    last_received: Mutex<Option<Message>>,
    last_data: Mutex<Option<DataMap>>,
    last_sent_time: Mutex<Option<Instant>>,
    last_received_time: Mutex<Option<Instant>>,
    queue: Mutex<Option<Arc<dyn Queueable>>>,
    send_interval: Mutex<Duration>,
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl StationCore {
    pub(crate) fn new(driver: Driver, role: Role) -> Arc<Self> {
        let core = Arc::new(StationCore {
            role,
            driver,
            last_sent: Mutex::new(None),
            last_received: Mutex::new(None),
            last_data: Mutex::new(None),
            last_sent_time: Mutex::new(None),
            last_received_time: Mutex::new(None),
            queue: Mutex::new(None),
            send_interval: Mutex::new(Duration::ZERO),
            heartbeat: Mutex::new(None),
        });

        let observer = Arc::downgrade(&core);
        core.driver.register(Subscription::new(
            move |m: &Message| {
                if let Some(core) = observer.upgrade() {
                    core.handle_receive(m);
                }
            },
            true,
        ));
        core.driver.start_read_loop();

        core
    }

    fn handle_receive(&self, m: &Message) {
        if self.role == Role::Ground {
            if let Some(data) = m.data() {
                *self.last_data.lock().unwrap() = Some(data.clone());
            }
        }
        *self.last_received.lock().unwrap() = Some(m.clone());
        *self.last_received_time.lock().unwrap() = Some(Instant::now());
        if let Some(queue) = self.queue.lock().unwrap().clone() {
            queue.append(m.clone());
        }
    }

    /// The `on_send` hook: for Launch only, copies `DATA` into `last_data`
    /// (Launch authoritatively produces telemetry). Run on every
    /// successful write, including resends.
    fn run_on_send_hook(&self, m: &Message) {
        if self.role == Role::Launch {
            if let Some(data) = m.data() {
                *self.last_data.lock().unwrap() = Some(data.clone());
            }
        }
    }

    /// Construct a message and write it through the driver. On success,
    /// runs the `on_send` hook, updates `last_sent`/`last_sent_time`, and
    /// restarts the heartbeat task if an interval is set. Shared by
    /// `GroundStation::send` (after validation) and `LaunchStation::send`
    /// (unconditionally).
    pub(crate) fn send_unvalidated(self: &Arc<Self>, input: impl Into<ComsInput>) -> bool {
        let message = match construct_message(input) {
            Ok(m) => m,
            Err(_) => return false,
        };
        match self.driver.write(message.clone(), true) {
            Ok(true) => {
                self.run_on_send_hook(&message);
                *self.last_sent.lock().unwrap() = Some(message.clone());
                *self.last_sent_time.lock().unwrap() = Some(Instant::now());
                let interval = *self.send_interval.lock().unwrap();
                if interval > Duration::ZERO {
                    self.replace_heartbeat(Some(interval));
                }
                true
            }
            _ => false,
        }
    }

    /// Re-send the last successfully sent message unchanged. Unlike
    /// `send`, this does not update `last_sent`/`last_sent_time` or touch
    /// the heartbeat task — it only runs the `on_send` hook and writes,
    /// exactly as much as a periodic heartbeat tick needs.
    pub fn resend_last(&self) {
        let Some(message) = self.last_sent.lock().unwrap().clone() else {
            tracing::warn!("resend_last called with no prior send");
            return;
        };
        if self.driver.write(message.clone(), true).unwrap_or(false) {
            self.run_on_send_hook(&message);
        }
    }

    pub fn set_send_interval(self: &Arc<Self>, seconds: Option<f64>) -> Result<(), ComsError> {
        let new_interval = match seconds {
            None => Duration::ZERO,
            Some(s) if s < 0.0 || !s.is_finite() => {
                return Err(ComsError::type_err(format!(
                    "send interval must be a non-negative number, got {s}"
                )));
            }
            Some(s) => Duration::from_secs_f64(s),
        };

        let mut current = self.send_interval.lock().unwrap();
        if *current == new_interval {
            return Ok(());
        }
        *current = new_interval;
        drop(current);

        self.replace_heartbeat(if new_interval > Duration::ZERO {
            Some(new_interval)
        } else {
            None
        });
        Ok(())
    }

    fn replace_heartbeat(self: &Arc<Self>, interval: Option<Duration>) {
        let previous = self.heartbeat.lock().unwrap().take();
        if let Some(hb) = previous {
            hb.stop();
        }
        if let Some(interval) = interval {
            let weak = Arc::downgrade(self);
            let hb = Heartbeat::start(interval, move || {
                if let Some(core) = weak.upgrade() {
                    core.resend_last();
                }
            });
            *self.heartbeat.lock().unwrap() = Some(hb);
        }
    }

    pub fn bind_queue(&self, queue: Option<Arc<dyn Queueable>>) {
        *self.queue.lock().unwrap() = queue;
    }

    pub fn last_sent(&self) -> Option<Message> {
        self.last_sent.lock().unwrap().clone()
    }

    pub fn last_received(&self) -> Option<Message> {
        self.last_received.lock().unwrap().clone()
    }

    pub fn last_sent_time(&self) -> Option<Instant> {
        *self.last_sent_time.lock().unwrap()
    }

    pub fn last_received_time(&self) -> Option<Instant> {
        *self.last_received_time.lock().unwrap()
    }

    pub fn data(&self) -> Option<DataMap> {
        self.last_data.lock().unwrap().clone()
    }

    /// The message fields a role's properties are computed from: Ground
    /// reads its own commanded (sent) state, Launch mirrors Ground's state
    /// as it was last received.
    fn command_source(&self) -> Option<Message> {
        match self.role {
            Role::Ground => self.last_sent(),
            Role::Launch => self.last_received(),
        }
    }

    pub fn abort(&self) -> bool {
        self.command_source().is_some_and(|m| m.abort() == 1)
    }

    pub fn qdm(&self) -> bool {
        self.command_source().is_some_and(|m| m.qdm() == 1)
    }

    pub fn stab(&self) -> bool {
        self.command_source().is_some_and(|m| m.stab() == 1)
    }

    pub fn launch(&self) -> bool {
        self.command_source().is_some_and(|m| m.launch() == 1)
    }

    pub fn armed(&self) -> bool {
        self.command_source()
            .is_some_and(|m| m.armed().unwrap_or(0) == 1)
    }

    /// `getLaunchFlag()` equivalent kept for parity with the ancestor API.
    pub fn get_launch_flag(&self) -> bool {
        self.launch()
    }
    pub fn get_qdm_flag(&self) -> bool {
        self.qdm()
    }
    pub fn get_abort_flag(&self) -> bool {
        self.abort()
    }
    pub fn get_stab_flag(&self) -> bool {
        self.stab()
    }
    pub fn get_armed_flag(&self) -> bool {
        self.armed()
    }

    /// Idempotent teardown: ends the read loop and stops any heartbeat.
    /// Safe to call explicitly (scoped release) and again from `Drop`.
    pub fn release(&self) {
        self.driver.end_read_loop(Some(Duration::from_secs(5)));
        if let Some(hb) = self.heartbeat.lock().unwrap().take() {
            hb.stop();
        }
    }
}

impl Drop for StationCore {
    fn drop(&mut self) {
        self.release();
    }
}
