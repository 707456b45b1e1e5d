use launchlink_message::Message;

/// An append-only sink a station can bind its inbound messages to. No
/// back-pressure is applied; an `append` that panics is handled by the
/// binding subscription's own error-tolerance policy.
pub trait Queueable: Send + Sync {
    fn append(&self, m: Message);
}
