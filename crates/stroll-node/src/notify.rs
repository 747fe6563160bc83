//! Outcome notifications.
//!
//! [`LogNotifier`] writes every message to the log. [`Outbox`] keeps them in
//! memory so callers can inspect what would have been sent.

use parking_lot::Mutex;
use stroll_core::error::StrollError;
use stroll_core::traits::Notifier;
use tracing::info;

/// Notifier that emits messages through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, subject: &str, recipients: &[String], body: &str) -> Result<(), StrollError> {
        info!(
            subject,
            recipients = %recipients.join(", "),
            body,
            "notification"
        );
        Ok(())
    }
}

/// One message recorded by an [`Outbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub subject: String,
    pub recipients: Vec<String>,
    pub body: String,
}

/// In-memory notifier.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<SentMessage>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first.
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Remove and return every recorded message.
    pub fn drain(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Notifier for Outbox {
    fn send(&self, subject: &str, recipients: &[String], body: &str) -> Result<(), StrollError> {
        self.sent.lock().push(SentMessage {
            subject: subject.to_string(),
            recipients: recipients.to_vec(),
            body: body.to_string(),
        });
        Ok(())
    }
}
