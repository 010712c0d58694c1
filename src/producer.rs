//! NATS publisher for assessment responses

use crate::types::AssessmentResponse;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes responses to the requester's reply inbox, or to a fixed subject
#[derive(Clone)]
pub struct ResponsePublisher {
    client: Client,
    fallback_subject: String,
}

impl ResponsePublisher {
    pub fn new(client: Client, fallback_subject: &str) -> Self {
        Self {
            client,
            fallback_subject: fallback_subject.to_string(),
        }
    }

    /// Publish a response, preferring the request's reply inbox
    pub async fn publish(&self, response: &AssessmentResponse, reply: Option<Subject>) -> Result<()> {
        let payload = serde_json::to_vec(response)?;
        let subject = reply
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.fallback_subject.clone());

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(
            submission_id = %response.submission_id,
            subject = %subject,
            success = response.is_success(),
            "Published assessment response"
        );

        Ok(())
    }

    pub fn fallback_subject(&self) -> &str {
        &self.fallback_subject
    }
}
