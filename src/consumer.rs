//! NATS subscriber for incoming assessment submissions

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Receives assessment submissions from NATS
pub struct SubmissionConsumer {
    client: Client,
    subject: String,
}

impl SubmissionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the submission subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to submission subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
