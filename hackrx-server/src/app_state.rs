//! The Axum Application State

use crate::{
    pipeline::Pipeline,
    settings,
    setups::ServerSetup,
    store::DocumentStore,
};
use anyhow::{anyhow, Result};
use std::sync::Arc;

#[derive(Clone)]
/// Global application route state.
pub struct AppState<S: ServerSetup> {
    /// Request authorization settings
    pub auth: Arc<settings::Auth>,
    /// Where downloaded documents are kept
    pub store: DocumentStore,
    /// Answers questions about stored documents
    pub pipeline: Arc<Pipeline<S::Generator>>,
    /// Reports run outcomes
    pub notifier: S::Notifier,
    /// Announces newly stored documents
    pub event_publisher: S::EventPublisher,
}

/// Builder for [`AppState`]
#[derive(Debug)]
pub struct AppStateBuilder<S: ServerSetup> {
    auth: settings::Auth,
    store: Option<DocumentStore>,
    pipeline: Option<Pipeline<S::Generator>>,
    notifier: Option<S::Notifier>,
    event_publisher: Option<S::EventPublisher>,
}

impl<S: ServerSetup> Default for AppStateBuilder<S> {
    fn default() -> Self {
        Self {
            auth: Default::default(),
            store: None,
            pipeline: None,
            notifier: None,
            event_publisher: None,
        }
    }
}

impl<S: ServerSetup> AppStateBuilder<S> {
    /// Finalize the builder and return the [`AppState`]
    pub fn finalize(self) -> Result<AppState<S>> {
        let store = self.store.ok_or_else(|| anyhow!("store is required"))?;

        let pipeline = self
            .pipeline
            .ok_or_else(|| anyhow!("pipeline is required"))?;

        let notifier = self
            .notifier
            .ok_or_else(|| anyhow!("notifier is required"))?;

        let event_publisher = self
            .event_publisher
            .ok_or_else(|| anyhow!("event_publisher is required"))?;

        Ok(AppState {
            auth: Arc::new(self.auth),
            store,
            pipeline: Arc::new(pipeline),
            notifier,
            event_publisher,
        })
    }

    /// Set the authorization settings
    pub fn with_auth(mut self, auth: settings::Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Set the document store
    pub fn with_store(mut self, store: DocumentStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the question answering pipeline
    pub fn with_pipeline(mut self, pipeline: Pipeline<S::Generator>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Set the notifier
    pub fn with_notifier(mut self, notifier: S::Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the event publisher
    pub fn with_event_publisher(mut self, event_publisher: S::EventPublisher) -> Self {
        self.event_publisher = Some(event_publisher);
        self
    }
}

impl<S> std::fmt::Debug for AppState<S>
where
    S: ServerSetup,
    S::Notifier: std::fmt::Debug,
    S::EventPublisher: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("auth", &self.auth)
            .field("store", &self.store)
            .field("notifier", &self.notifier)
            .field("event_publisher", &self.event_publisher)
            .finish()
    }
}
