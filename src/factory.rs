use std::net::ToSocketAddrs;
use std::sync::Arc;

use launchlink_core::Driver;
use launchlink_message::ComsError;
use launchlink_transport::{SerialStrategy, SocketStrategy};

use crate::{GroundStation, LaunchStation};

/// Connects to a Launch endpoint already accepting at `addr`. By
/// convention Launch accepts and Ground connects (the opposite pairing
/// works too; the two are symmetric once the handshake completes).
pub fn ground_over_socket(addr: impl ToSocketAddrs) -> Result<GroundStation, ComsError> {
    let strategy = SocketStrategy::connect_to(addr)?;
    Ok(GroundStation::new(Driver::new(Arc::new(strategy))))
}

/// Binds and accepts exactly one Ground connection at `addr`.
pub fn launch_over_socket(addr: impl ToSocketAddrs) -> Result<LaunchStation, ComsError> {
    let strategy = SocketStrategy::accept_at(addr)?;
    Ok(LaunchStation::new(Driver::new(Arc::new(strategy))))
}

pub fn ground_over_serial(port: &str, baud_rate: u32) -> Result<GroundStation, ComsError> {
    let strategy = SerialStrategy::open(port, baud_rate)?;
    Ok(GroundStation::new(Driver::new(Arc::new(strategy))))
}

pub fn launch_over_serial(port: &str, baud_rate: u32) -> Result<LaunchStation, ComsError> {
    let strategy = SerialStrategy::open(port, baud_rate)?;
    Ok(LaunchStation::new(Driver::new(Arc::new(strategy))))
}
