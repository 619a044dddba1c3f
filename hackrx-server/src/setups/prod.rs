//! Production server setup code

use crate::{
    pipeline::generator::ConfiguredGenerator,
    settings,
    setups::{EventPublisher, Notifier, ServerSetup},
};
use anyhow::Result;
use async_trait::async_trait;
use hackrx_core::events::HackrxEvent;
use redis::{aio::ConnectionManager, AsyncCommands};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use std::time::Duration;

/// Discord refuses messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Answer listings stop growing once they would pass this many characters.
const ANSWERS_SOFT_LIMIT: usize = 1950;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_BACKOFF_BASE: u64 = 2;
const CONNECT_BACKOFF_FACTOR_MS: u64 = 100;
const CONNECT_RETRIES: usize = 2;

/// Production implementation of `ServerSetup`.
/// Actually calls out to other services configured in `settings.toml`.
#[derive(Clone, Debug, Default)]
pub struct ProdSetup;

impl ServerSetup for ProdSetup {
    type Generator = ConfiguredGenerator;
    type Notifier = DiscordNotifier;
    type EventPublisher = RedisEventPublisher;
}

/// Posts run results to a Discord webhook.
#[derive(Clone, Debug)]
pub struct DiscordNotifier {
    client: ClientWithMiddleware,
    webhook_url: String,
}

impl DiscordNotifier {
    /// Create a notifier for the configured webhook
    pub fn new(settings: &settings::Notifier, client: ClientWithMiddleware) -> Self {
        Self {
            client,
            webhook_url: settings.discord_webhook_url.clone(),
        }
    }

    /// Post a raw message. Messages over the Discord limit get cut short.
    pub async fn send(&self, content: &str) -> Result<()> {
        if self.webhook_url.is_empty() {
            tracing::warn!("Discord webhook URL not configured, dropping notification");
            return Ok(());
        }

        self.client
            .post(&self.webhook_url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&json!({ "content": clamp_message(content) }))
            .send()
            .await?
            .error_for_status()?;

        tracing::debug!("Sent notification to Discord");

        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify_answers(&self, _document_url: &str, answers: &[String]) -> Result<()> {
        self.send(&answers_message(answers)).await
    }

    async fn notify_error(&self, document_url: &str, message: &str) -> Result<()> {
        self.send(&error_message(document_url, message)).await
    }
}

/// Numbered answer listing, stopping early when it would get too long.
pub fn answers_message(answers: &[String]) -> String {
    let mut content = String::from("\nAnswers:\n");
    let mut length = content.chars().count();

    for (i, answer) in answers.iter().enumerate() {
        let line = format!("{}. {answer}\n", i + 1);
        let line_length = line.chars().count();

        if length + line_length > ANSWERS_SOFT_LIMIT {
            content.push_str(&format!(
                "... and {} more answers (truncated due to length)",
                answers.len() - i
            ));
            break;
        }

        content.push_str(&line);
        length += line_length;
    }

    content
}

/// Failure report for a document.
pub fn error_message(document_url: &str, message: &str) -> String {
    format!("HackRX Error - {message}\nDocument: {document_url}")
}

/// Cut `content` to the Discord message limit, marking the cut with `...`.
pub fn clamp_message(content: &str) -> String {
    if content.chars().count() <= DISCORD_MESSAGE_LIMIT {
        return content.to_string();
    }

    let mut clamped = content
        .chars()
        .take(DISCORD_MESSAGE_LIMIT - 3)
        .collect::<String>();
    clamped.push_str("...");
    clamped
}

/// Publishes events as JSON on a redis pub/sub channel.
///
/// All events share one managed connection, which reconnects on its own.
/// With events disabled, events are only logged.
#[derive(Clone)]
pub struct RedisEventPublisher {
    connection: Option<ConnectionManager>,
    channel: String,
}

impl std::fmt::Debug for RedisEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventPublisher")
            .field("connected", &self.connection.is_some())
            .field("channel", &self.channel)
            .finish()
    }
}

impl RedisEventPublisher {
    /// Connect to redis when events are enabled.
    /// Fails if the URL can't be parsed or redis stays unreachable after a few retries.
    pub async fn connect(settings: &settings::Events) -> Result<Self> {
        let connection = if settings.is_enabled {
            let client = redis::Client::open(settings.redis_url.as_str())?;
            let manager = ConnectionManager::new_with_backoff(
                client,
                CONNECT_BACKOFF_BASE,
                CONNECT_BACKOFF_FACTOR_MS,
                CONNECT_RETRIES,
            )
            .await?;
            tracing::info!(channel = %settings.channel, "Connected to redis");
            Some(manager)
        } else {
            None
        };

        Ok(Self {
            connection,
            channel: settings.channel.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &HackrxEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;

        let Some(connection) = &self.connection else {
            tracing::debug!(
                event_type = event.event_type(),
                %payload,
                "Events disabled, not publishing"
            );
            return Ok(());
        };

        // Clones share the underlying multiplexed connection
        let mut conn = connection.clone();
        let receivers: i64 = conn.publish(&self.channel, &payload).await?;

        tracing::info!(
            event_type = event.event_type(),
            channel = %self.channel,
            receivers,
            "Published event"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_client;
    use testresult::TestResult;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn test_answers_message_lists_answers() {
        let answers = vec!["Yes.".to_string(), "Two years.".to_string()];

        assert_eq!(
            answers_message(&answers),
            "\nAnswers:\n1. Yes.\n2. Two years.\n"
        );
    }

    #[test]
    fn test_answers_message_truncates_long_listings() {
        let answers = (0..10).map(|_| "x".repeat(300)).collect::<Vec<_>>();

        let message = answers_message(&answers);

        // Each line is 304 characters, so six fit after the header.
        assert!(message.contains("6. "));
        assert!(!message.contains("7. "));
        assert!(message.ends_with("... and 4 more answers (truncated due to length)"));
        assert!(message.chars().count() <= DISCORD_MESSAGE_LIMIT);
    }

    #[test]
    fn test_clamp_message() {
        assert_eq!(clamp_message("short"), "short");

        let clamped = clamp_message(&"é".repeat(2500));
        assert_eq!(clamped.chars().count(), DISCORD_MESSAGE_LIMIT);
        assert!(clamped.ends_with("..."));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message("https://example.com/policy.pdf", "Internal error: disk full"),
            "HackRX Error - Internal error: disk full\nDocument: https://example.com/policy.pdf"
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_discord_notifier_posts_content() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(body_json(json!({ "content": "\nAnswers:\n1. Yes.\n" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let settings = settings::Notifier {
            discord_webhook_url: format!("{}/webhook", server.uri()),
        };
        let notifier = DiscordNotifier::new(&settings, test_client());

        notifier
            .notify_answers("https://example.com/policy.pdf", &["Yes.".to_string()])
            .await?;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_discord_notifier_surfaces_webhook_failures() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let settings = settings::Notifier {
            discord_webhook_url: server.uri(),
        };
        let notifier = DiscordNotifier::new(&settings, test_client());

        assert!(notifier.notify_error("doc", "boom").await.is_err());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_unconfigured_discord_notifier_is_a_noop() -> TestResult {
        let notifier = DiscordNotifier::new(&settings::Notifier::default(), test_client());

        notifier.notify_error("doc", "boom").await?;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_disabled_events_only_log() -> TestResult {
        let publisher = RedisEventPublisher::connect(&settings::Events {
            is_enabled: false,
            redis_url: "redis://127.0.0.1:1".to_string(),
            channel: "hackrx_events".to_string(),
        })
        .await?;

        assert!(publisher.connection.is_none());

        publisher
            .publish(&HackrxEvent::NewFile {
                filehash: "abc".to_string(),
                filepath: "/tmp/document1.pdf".to_string(),
            })
            .await?;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_enabled_events_fail_to_connect_to_unreachable_redis() {
        let result = RedisEventPublisher::connect(&settings::Events {
            is_enabled: true,
            redis_url: "redis://127.0.0.1:1".to_string(),
            channel: "hackrx_events".to_string(),
        })
        .await;

        assert!(result.is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_enabled_events_reject_malformed_url() {
        let result = RedisEventPublisher::connect(&settings::Events {
            is_enabled: true,
            redis_url: "not a url".to_string(),
            channel: "hackrx_events".to_string(),
        })
        .await;

        assert!(result.is_err());
    }
}
