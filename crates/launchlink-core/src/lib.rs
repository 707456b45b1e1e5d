//! Transport-agnostic driver: strategy contract, cancellable read worker,
//! and subscriber fan-out, shared by both ends of a link.

mod driver;
mod local;
mod queue;
mod strategy;
mod subscriber;
mod worker;

pub use driver::Driver;
pub use local::LocalStrategy;
pub use queue::Queueable;
pub use strategy::Strategy;
pub use subscriber::{Subscription, SubscriptionId};
