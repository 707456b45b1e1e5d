use std::ops::Deref;
use std::sync::Arc;

use launchlink_core::Driver;
use launchlink_message::ComsInput;

use crate::station::{Role, StationCore};

/// The telemetry-producing end of the link: reflects whatever Ground last
/// commanded and reports its own `DATA` payload on send. No transition
/// validation — Ground already enforces the safety state machine.
pub struct LaunchStation {
    core: Arc<StationCore>,
}

impl LaunchStation {
    pub fn new(driver: Driver) -> Self {
        LaunchStation {
            core: StationCore::new(driver, Role::Launch),
        }
    }

    pub fn send(&self, input: impl Into<ComsInput>) -> bool {
        self.core.send_unvalidated(input)
    }
}

impl Deref for LaunchStation {
    type Target = StationCore;

    fn deref(&self) -> &StationCore {
        &self.core
    }
}
