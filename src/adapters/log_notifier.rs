use crate::ports::notifier::Notifier;
use tracing::info;

/// Writes notifications to the log instead of an external channel.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &str) -> bool {
        info!(target: "pricegate::notify", "{message}");
        true
    }
}
