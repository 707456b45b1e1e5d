use std::ops::Deref;
use std::sync::Arc;

use launchlink_core::Driver;
use launchlink_message::{construct_message, ComsInput, Message};

use crate::station::{Role, StationCore};

/// The commanding end of the link: arms, stabilizes, launches, aborts, or
/// quick-disconnects, subject to a one-way safety state machine.
pub struct GroundStation {
    core: Arc<StationCore>,
}

impl GroundStation {
    pub fn new(driver: Driver) -> Self {
        GroundStation {
            core: StationCore::new(driver, Role::Ground),
        }
    }

    /// Validate the proposed transition against the current commanded
    /// state and, if accepted, send it. Returns `false` without
    /// transmitting on a rejected transition or a malformed message.
    pub fn send(&self, input: impl Into<ComsInput>) -> bool {
        let Ok(candidate) = construct_message(input) else {
            return false;
        };
        if !self.accepts_transition(&candidate) {
            return false;
        }
        self.core.send_unvalidated(candidate)
    }

    fn accepts_transition(&self, candidate: &Message) -> bool {
        let current = self.core.last_sent();
        let c_armed = current.as_ref().is_some_and(|m| m.armed().unwrap_or(0) == 1);
        let c_abort = current.as_ref().is_some_and(|m| m.abort() == 1);
        let c_launch = current.as_ref().is_some_and(|m| m.launch() == 1);
        let c_qdm = current.as_ref().is_some_and(|m| m.qdm() == 1);
        let c_stab = current.as_ref().is_some_and(|m| m.stab() == 1);

        let n_armed = candidate.armed().unwrap_or(0) == 1;
        let n_abort = candidate.abort() == 1;
        let n_launch = candidate.launch() == 1;
        let n_qdm = candidate.qdm() == 1;

        // 1. Cannot un-arm.
        if c_armed && !n_armed {
            return false;
        }
        // 2. No action before arm.
        if !c_armed && (n_abort || n_launch || n_qdm || n_stab) {
            return false;
        }
        // 3. Latches are one-way: abort, launch, qdm never clear.
        if (c_abort && !n_abort) || (c_launch && !n_launch) || (c_qdm && !n_qdm) {
            return false;
        }
        // 4. Launch requires stability and no abort/qdm in flight.
        if n_launch && !c_launch && (!c_stab || c_qdm || c_abort) {
            return false;
        }
        true
    }
}

impl Deref for GroundStation {
    type Target = StationCore;

    fn deref(&self) -> &StationCore {
        &self.core
    }
}
