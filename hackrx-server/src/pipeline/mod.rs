//! The question answering pipeline.
//!
//! Every question goes through the same three stages: the [`QueryEnhancer`]
//! extracts keywords, the [`Retriever`] picks the best chunks of the document
//! and a [`Generator`] writes the answer. Questions of one request run
//! concurrently, bounded by `max_workers`, and each gets its own time budget.

use crate::settings;
use futures::{stream, StreamExt};
use hackrx_core::answer::extract_decision;
use serde::Serialize;
use serde_json::Value;
use std::{
    io,
    path::Path,
    time::{Duration, Instant},
};

pub mod corpus;
pub mod enhancer;
pub mod generator;
pub mod retriever;

pub use corpus::{Chunk, Corpus};
pub use enhancer::{EnhancedQuery, QueryEnhancer};
pub use generator::Generator;
pub use retriever::Retriever;

/// What happened to a single question
#[derive(Clone, Debug, Serialize)]
pub struct QuestionOutcome {
    /// The question as asked
    pub question: String,
    /// The result of answering it
    #[serde(flatten)]
    pub result: Outcome,
}

/// Result of answering a question
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// The question went through all stages
    Success {
        /// The enhanced query
        enhanced: EnhancedQuery,
        /// Chunks the answer was generated from
        chunks: Vec<Chunk>,
        /// Raw generator output
        answer: Value,
        /// The decision extracted from `answer`
        generated_answer: String,
    },
    /// Some stage failed or the question ran out of time
    Error {
        /// What went wrong
        error: String,
    },
}

impl QuestionOutcome {
    fn failed(question: &str, error: impl Into<String>) -> Self {
        Self {
            question: question.to_string(),
            result: Outcome::Error {
                error: error.into(),
            },
        }
    }

    /// Whether the question was answered
    pub fn is_success(&self) -> bool {
        matches!(self.result, Outcome::Success { .. })
    }

    /// The answer returned to callers: the generated answer, or `Error: <reason>`.
    pub fn answer_text(&self) -> String {
        match &self.result {
            Outcome::Success {
                generated_answer, ..
            } => generated_answer.clone(),
            Outcome::Error { error } => format!("Error: {error}"),
        }
    }
}

/// Answers questions about a document
#[derive(Clone, Debug)]
pub struct Pipeline<G> {
    enhancer: QueryEnhancer,
    retriever: Retriever,
    generator: G,
    max_workers: usize,
    question_timeout: Duration,
    chunk_words: usize,
    chunk_overlap: usize,
}

impl<G: Generator> Pipeline<G> {
    /// Set up a pipeline with the given generator.
    pub fn new(settings: &settings::Pipeline, generator: G) -> Self {
        Self {
            enhancer: QueryEnhancer,
            retriever: Retriever::new(settings.top_k),
            generator,
            max_workers: settings.max_workers.max(1),
            question_timeout: settings.question_timeout(),
            chunk_words: settings.chunk_words,
            chunk_overlap: settings.chunk_overlap,
        }
    }

    /// Read a stored document into a [`Corpus`], chunked the way this pipeline expects.
    pub async fn load_corpus(&self, path: &Path) -> io::Result<Corpus> {
        Corpus::load(path, self.chunk_words, self.chunk_overlap).await
    }

    /// Run a single question through all stages.
    pub async fn answer(&self, question: &str, corpus: &Corpus) -> QuestionOutcome {
        let start = Instant::now();
        let outcome = self.run_stages(question, corpus).await;

        let status = if outcome.is_success() { "success" } else { "error" };
        metrics::increment_counter!("pipeline_questions_total", "status" => status);
        metrics::histogram!(
            "pipeline_question_duration_seconds",
            start.elapsed().as_secs_f64()
        );

        outcome
    }

    async fn run_stages(&self, question: &str, corpus: &Corpus) -> QuestionOutcome {
        let enhanced = self.enhancer.enhance(question);
        let chunks = self.retriever.retrieve_and_rerank(&enhanced, corpus);

        match self.generator.generate(question, &chunks).await {
            Ok(answer) => {
                let generated_answer = extract_decision(&answer);
                QuestionOutcome {
                    question: question.to_string(),
                    result: Outcome::Success {
                        enhanced,
                        chunks,
                        answer,
                        generated_answer,
                    },
                }
            }
            Err(e) => {
                tracing::warn!(question, err = %e, "Generating an answer failed");
                QuestionOutcome::failed(question, e.to_string())
            }
        }
    }

    /// Answer all questions, at most `max_workers` at a time.
    ///
    /// Outcomes are in question order. Questions that exceed the time budget
    /// get an error outcome instead of holding up the others.
    pub async fn answer_all(&self, questions: &[String], corpus: &Corpus) -> Vec<QuestionOutcome> {
        stream::iter(questions.iter().cloned())
            .map(|question: String| async move {
                match tokio::time::timeout(self.question_timeout, self.answer(&question, corpus))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(%question, "Question timed out");
                        QuestionOutcome::failed(
                            &question,
                            format!(
                                "Processing failed: timed out after {}ms",
                                self.question_timeout.as_millis()
                            ),
                        )
                    }
                }
            })
            .buffered(self.max_workers)
            .collect()
            .await
    }
}
