//! Hardware- and network-facing [`launchlink_core::Strategy`] implementations.

mod serial;
mod socket;

pub use serial::SerialStrategy;
pub use socket::SocketStrategy;
