use launchlink_message::Message;

/// A registered callback plus its error-tolerance policy.
///
/// `once` marks a one-shot subscription: after its first successful
/// delivery the driver deregisters it automatically, regardless of
/// `tolerate_errors`. [`crate::Driver::read`] is built on exactly this.
pub struct Subscription {
    pub(crate) callback: Box<dyn Fn(&Message) + Send + Sync>,
    pub(crate) tolerate_errors: bool,
    pub(crate) once: bool,
}

impl Subscription {
    /// A standing subscription that is retained across deliveries unless
    /// it panics and `tolerate_errors` is false.
    pub fn new(callback: impl Fn(&Message) + Send + Sync + 'static, tolerate_errors: bool) -> Self {
        Subscription {
            callback: Box::new(callback),
            tolerate_errors,
            once: false,
        }
    }

    /// A subscription that deregisters itself after its first delivery.
    pub fn once(callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        Subscription {
            callback: Box::new(callback),
            tolerate_errors: false,
            once: true,
        }
    }
}

/// Opaque handle returned by [`crate::Driver::register`], used to
/// [`crate::Driver::unregister`] later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);
