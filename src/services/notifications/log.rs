use async_trait::async_trait;

use super::{Notification, Notifier};
use crate::errors::NotificationError;

/// Writes notifications to the log instead of delivering them. Used when no
/// email service is configured.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        tracing::info!(
            kind = notification.kind.as_str(),
            to = %notification.to_email,
            subject = %notification.subject,
            message = %notification.message,
            "email delivery not configured, logging notification"
        );
        Ok(())
    }
}
