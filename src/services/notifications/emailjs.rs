use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{Notification, Notifier};
use crate::errors::NotificationError;

const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EmailJsNotifier {
    service_id: String,
    template_id: String,
    public_key: String,
    private_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl EmailJsNotifier {
    pub fn new(
        service_id: String,
        template_id: String,
        public_key: String,
        private_key: String,
    ) -> Result<Self, NotificationError> {
        Self::with_timeout(service_id, template_id, public_key, private_key, SEND_TIMEOUT)
    }

    /// Bookings wait on dispatch, so every request is bounded by `timeout`.
    pub fn with_timeout(
        service_id: String,
        template_id: String,
        public_key: String,
        private_key: String,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            service_id,
            template_id,
            public_key,
            private_key,
            endpoint: EMAILJS_SEND_URL.to_string(),
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, notification: &Notification) -> serde_json::Value {
        let mut body = json!({
            "service_id": self.service_id,
            "template_id": self.template_id,
            "user_id": self.public_key,
            "template_params": notification.template_params(),
        });
        if !self.private_key.is_empty() {
            body["accessToken"] = json!(self.private_key);
        }
        body
    }
}

#[async_trait]
impl Notifier for EmailJsNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        if self.service_id.is_empty() || self.template_id.is_empty() {
            return Err(NotificationError::NotConfigured);
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(notification))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(kind = notification.kind.as_str(), "email dispatched");
        Ok(())
    }
}
