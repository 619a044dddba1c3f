//! Answer generation from retrieved chunks

use super::{
    corpus::Chunk,
    enhancer::{terms, QueryEnhancer},
};
use crate::settings::{self, GeneratorKind};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Decision given when the document doesn't cover a question
pub const NO_ANSWER: &str = "The document does not contain information to answer this question.";

const SYSTEM_PROMPT: &str = "You answer questions about a document using only the context \
    passages you are given. Reply with a JSON object of the form \
    {\"decision\": \"<one or two sentence answer>\", \"justification\": \"<supporting quote>\"}. \
    If the context does not answer the question, say so in the decision.";

/// Produces an answer for a question from retrieved chunks.
///
/// Answers are JSON values; the decision is later pulled out of them
/// with [`hackrx_core::answer::extract_decision`].
#[async_trait]
pub trait Generator: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Generate an answer to `question` from `chunks`, best chunk first.
    async fn generate(&self, question: &str, chunks: &[Chunk]) -> Result<Value>;
}

/// Answers with the sentence from the retrieved chunks that shares the most
/// keywords with the question.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractiveGenerator;

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, question: &str, chunks: &[Chunk]) -> Result<Value> {
        let keywords = QueryEnhancer
            .enhance(question)
            .keywords
            .into_iter()
            .collect::<HashSet<_>>();

        let mut best: Option<(usize, &str, &Chunk)> = None;
        for chunk in chunks {
            for sentence in sentences(&chunk.text) {
                let hits = terms(sentence)
                    .filter(|term| keywords.contains(term))
                    .collect::<HashSet<_>>()
                    .len();

                if hits > best.map(|(best_hits, _, _)| best_hits).unwrap_or(0) {
                    best = Some((hits, sentence, chunk));
                }
            }
        }

        Ok(match best {
            Some((_, sentence, chunk)) => json!({
                "decision": sentence,
                "justification": chunk.text,
                "sources": chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            }),
            None => json!({
                "decision": NO_ANSWER,
                "sources": [],
            }),
        })
    }
}

/// Split text into sentences, keeping their closing punctuation.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return None;
        }

        let mut end = trimmed.len();
        let mut chars = trimmed.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let at_boundary = chars.peek().map(|(_, next)| next.is_whitespace()).unwrap_or(true);
            if matches!(c, '.' | '!' | '?') && at_boundary {
                end = i + c.len_utf8();
                break;
            }
        }

        rest = &trimmed[end..];
        Some(trimmed[..end].trim())
    })
}

/// Asks an OpenAI-compatible chat completions API.
#[derive(Clone, Debug)]
pub struct ChatGenerator {
    client: ClientWithMiddleware,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatGenerator {
    /// Create a generator talking to `endpoint` (the API base URL).
    pub fn new(
        client: ClientWithMiddleware,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, question: &str, chunks: &[Chunk]) -> Result<Value> {
        let context = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Context:\n{context}\n\nQuestion: {question}"),
                },
            ],
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let completion = request
            .send()
            .await?
            .error_for_status()?
            .json::<ChatCompletion>()
            .await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat completion contained no message"))?;

        Ok(match serde_json::from_str::<Value>(&content) {
            Ok(answer @ Value::Object(_)) => answer,
            _ => json!({ "answer": content }),
        })
    }
}

/// The generator chosen in the settings file
#[derive(Clone, Debug)]
pub enum ConfiguredGenerator {
    /// See [`ExtractiveGenerator`]
    Extractive(ExtractiveGenerator),
    /// See [`ChatGenerator`]
    Chat(ChatGenerator),
}

impl ConfiguredGenerator {
    /// Build the generator described by `settings`.
    pub fn from_settings(settings: &settings::Generator, client: ClientWithMiddleware) -> Self {
        match settings.kind {
            GeneratorKind::Extractive => Self::Extractive(ExtractiveGenerator),
            GeneratorKind::Chat => Self::Chat(ChatGenerator::new(
                client,
                settings.endpoint.clone(),
                settings.model.clone(),
                settings.api_key.clone(),
            )),
        }
    }
}

#[async_trait]
impl Generator for ConfiguredGenerator {
    async fn generate(&self, question: &str, chunks: &[Chunk]) -> Result<Value> {
        match self {
            Self::Extractive(generator) => generator.generate(question, chunks).await,
            Self::Chat(generator) => generator.generate(question, chunks).await,
        }
    }
}
