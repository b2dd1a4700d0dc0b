//! Notifiers for inbound direct messages.

use chat_core::{Message, Notifier};
use tracing::info;

/// Maximum preview length in notifications
const PREVIEW_LEN: usize = 80;

/// Notifier that writes a log line per inbound message
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &Message) {
        info!(
            sender_id = %message.sender_id,
            message_id = %message.id,
            preview = message.preview(PREVIEW_LEN),
            "New direct message"
        );
    }
}

/// Notifier that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _message: &Message) {}
}
