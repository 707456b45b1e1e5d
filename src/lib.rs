//! Ground/Launch command-and-telemetry link over local, serial, or TCP
//! transports.
//!
//! A [`GroundStation`] commands a [`LaunchStation`] (arm, stabilize,
//! launch, abort, quick-disconnect) and receives its telemetry; both sides
//! are built on the same [`launchlink_core::Driver`] and differ only in
//! which fields they track and, for Ground, a one-way safety validator on
//! every `send`.

mod factory;
mod ground;
mod heartbeat;
mod launch;
mod station;

pub use factory::{ground_over_serial, ground_over_socket, launch_over_serial, launch_over_socket};
pub use ground::GroundStation;
pub use launch::LaunchStation;
pub use station::StationCore;

pub use launchlink_core::{Driver, LocalStrategy, Queueable, Strategy, Subscription, SubscriptionId};
pub use launchlink_message::{construct_message, ComsError, ComsInput, DataMap, Message, MessageFields};
pub use launchlink_transport::{SerialStrategy, SocketStrategy};
