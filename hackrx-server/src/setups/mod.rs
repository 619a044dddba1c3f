//! This abstracts hackrx-server side-effects into "setups".
//!
//! This module defines the traits, submodules define local, test & production
//! collections of implementations.
use crate::pipeline::Generator;
use anyhow::Result;
use async_trait::async_trait;
use hackrx_core::events::HackrxEvent;

pub mod local;
pub mod prod;

/// This trait groups type parameters to the server's `AppState` struct.
///
/// It captures the setup of the server, distinguishing between e.g.
/// unit testing & production setups.
pub trait ServerSetup: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Which implementation writes the answers
    type Generator: Generator;
    /// Which implementation reports answers and failures to humans
    type Notifier: Notifier;
    /// Which implementation announces document events to other processes
    type EventPublisher: EventPublisher;
}

/// Reports the outcome of a run somewhere humans look.
#[async_trait]
pub trait Notifier: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Report the answers produced for the document at `document_url`.
    async fn notify_answers(&self, document_url: &str, answers: &[String]) -> Result<()>;

    /// Report a failed run for the document at `document_url`.
    async fn notify_error(&self, document_url: &str, message: &str) -> Result<()>;
}

/// Announces [`HackrxEvent`]s, e.g. newly stored documents.
#[async_trait]
pub trait EventPublisher: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Publish a single event.
    async fn publish(&self, event: &HackrxEvent) -> Result<()>;
}
