//! Server setup for local development & easier integration testing

use super::{
    prod::{answers_message, error_message, RedisEventPublisher},
    Notifier, ServerSetup,
};
use crate::pipeline::generator::ConfiguredGenerator;
use anyhow::Result;
use async_trait::async_trait;

/// Implementation of `ServerSetup` for local environments.
/// Notifications go to the log instead of a webhook.
#[derive(Debug, Clone)]
pub struct LocalSetup;

impl ServerSetup for LocalSetup {
    type Generator = ConfiguredGenerator;
    type Notifier = LogNotifier;
    type EventPublisher = RedisEventPublisher;
}

/// A `Notifier` that doesn't post anywhere, but logs the message
/// it would have sent via tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_answers(&self, document_url: &str, answers: &[String]) -> Result<()> {
        tracing::info!(
            document_url,
            content = %answers_message(answers),
            "Answers notification"
        );
        Ok(())
    }

    async fn notify_error(&self, document_url: &str, message: &str) -> Result<()> {
        tracing::warn!(
            document_url,
            content = %error_message(document_url, message),
            "Error notification"
        );
        Ok(())
    }
}
