//! Background worker answering questions requested over the event channel.
//!
//! The worker listens for `run_hackrx` events, answers the questions against
//! the already stored document and publishes a `result` event.

use crate::{
    pipeline::{Generator, Pipeline, QuestionOutcome},
    setups::EventPublisher,
    store::DocumentStore,
};
use anyhow::{bail, Result};
use futures::StreamExt;
use hackrx_core::events::HackrxEvent;
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;

/// Handles events from the event channel
#[derive(Debug, Clone)]
pub struct Worker<G, P> {
    store: DocumentStore,
    pipeline: Arc<Pipeline<G>>,
    publisher: P,
}

impl<G: Generator, P: EventPublisher> Worker<G, P> {
    /// Create a worker answering from `store` and publishing with `publisher`
    pub fn new(store: DocumentStore, pipeline: Pipeline<G>, publisher: P) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
            publisher,
        }
    }

    /// Handle a raw channel payload, publishing the result if there is one.
    ///
    /// Payloads that aren't events, and events that aren't run requests, are ignored.
    pub async fn handle_payload(&self, payload: &str) -> Option<HackrxEvent> {
        let event = match serde_json::from_str::<HackrxEvent>(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(%err, "Ignoring payload that isn't an event");
                return None;
            }
        };

        let result = self.handle_event(event).await?;

        if let Err(err) = self.publisher.publish(&result).await {
            tracing::error!(%err, "Failed to publish result event");
        }

        Some(result)
    }

    /// Answer a `run_hackrx` event. Any other event yields `None`.
    pub async fn handle_event(&self, event: HackrxEvent) -> Option<HackrxEvent> {
        let (filehash, questions) = match event {
            HackrxEvent::RunHackrx {
                filehash,
                questions,
            } => (filehash, questions),
            other => {
                tracing::trace!(event_type = other.event_type(), "Ignoring event");
                return None;
            }
        };

        tracing::info!(
            %filehash,
            questions = questions.len(),
            "Processing questions"
        );

        let start = Instant::now();
        let answers = self.answer(&filehash, &questions).await;
        let processing_time = start.elapsed().as_secs_f64();

        tracing::info!(%filehash, processing_time, "Processed questions");

        Some(HackrxEvent::result(
            filehash,
            questions,
            answers,
            processing_time,
        ))
    }

    async fn answer(&self, filehash: &str, questions: &[String]) -> Vec<String> {
        let corpus = match self.store.lookup(filehash).await {
            Ok(document) => self
                .pipeline
                .load_corpus(&document.path)
                .await
                .map_err(anyhow::Error::from),
            Err(err) => Err(err.into()),
        };

        match corpus {
            Ok(corpus) => self
                .pipeline
                .answer_all(questions, &corpus)
                .await
                .iter()
                .map(QuestionOutcome::answer_text)
                .collect(),
            Err(err) => {
                tracing::warn!(%filehash, %err, "Can't answer questions for document");
                questions.iter().map(|_| format!("Error: {err}")).collect()
            }
        }
    }

    /// Subscribe to `channel` and handle events until cancelled.
    pub async fn run(
        &self,
        client: &redis::Client,
        channel: &str,
        token: CancellationToken,
    ) -> Result<()> {
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        tracing::info!(
            subject = "worker_start",
            category = "init",
            channel,
            "Listening for events"
        );

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                message = messages.next() => {
                    let Some(message) = message else {
                        bail!("Event channel closed");
                    };

                    match message.get_payload::<String>() {
                        Ok(payload) => {
                            self.handle_payload(&payload).await;
                        }
                        Err(err) => tracing::warn!(%err, "Ignoring unreadable message"),
                    }
                }
            }
        }

        tracing::info!("Stopped listening for events");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::generator::ExtractiveGenerator, settings, setups::test::TestEventPublisher,
        test_utils::test_client,
    };
    use assert_matches::assert_matches;
    use serde_json::json;
    use testresult::TestResult;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn worker(store: DocumentStore) -> Worker<ExtractiveGenerator, TestEventPublisher> {
        Worker::new(
            store,
            Pipeline::new(&settings::Pipeline::default(), ExtractiveGenerator),
            TestEventPublisher::default(),
        )
    }

    #[test_log::test(tokio::test)]
    async fn test_answers_run_events_for_stored_documents() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/policy.md"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Maternity expenses are covered after nine months."),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let store = DocumentStore::new(dir.path(), test_client());
        let document = store.fetch(&format!("{}/policy.md", server.uri())).await?;
        let worker = worker(store);

        let payload = json!({
            "event_type": "run_hackrx",
            "filehash": document.hash,
            "questions": ["Are maternity expenses covered?"],
        })
        .to_string();

        let result = worker.handle_payload(&payload).await;

        assert_matches!(
            &result,
            Some(HackrxEvent::Result { answers, status, .. })
                if answers == &vec!["Maternity expenses are covered after nine months.".to_string()]
                    && status == "result_ready"
        );
        assert_eq!(worker.publisher.get_events(), vec![result.unwrap()]);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_documents_yield_error_answers() -> TestResult {
        let dir = tempfile::tempdir()?;
        let worker = worker(DocumentStore::new(dir.path(), test_client()));

        let result = worker
            .handle_event(HackrxEvent::RunHackrx {
                filehash: "deadbeef".to_string(),
                questions: vec!["one".to_string(), "two".to_string()],
            })
            .await;

        assert_matches!(
            result,
            Some(HackrxEvent::Result { answers, questions, .. }) => {
                assert_eq!(questions.len(), 2);
                assert_eq!(answers.len(), 2);
                assert!(answers.iter().all(|a| a.starts_with("Error: ")));
            }
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_ignores_other_payloads() -> TestResult {
        let dir = tempfile::tempdir()?;
        let worker = worker(DocumentStore::new(dir.path(), test_client()));

        assert!(worker.handle_payload("not json").await.is_none());
        assert!(worker
            .handle_payload(r#"{"event_type": "new_file", "filehash": "a", "filepath": "b"}"#)
            .await
            .is_none());
        assert!(worker.publisher.get_events().is_empty());

        Ok(())
    }
}
