//! Notification port.

pub trait Notifier {
    /// Returns `false` if the message could not be delivered. Delivery
    /// failures are never fatal to the caller.
    fn send(&self, message: &str) -> bool;
}
