//! Stored documents as searchable text chunks

use super::enhancer::terms;
use serde::Serialize;
use std::{collections::HashMap, io, path::Path};

/// Extensions we can read text out of
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "xml", "eml"];
/// Extensions whose markup gets stripped before reading
const MARKUP_EXTENSIONS: &[&str] = &["html", "htm", "xml", "svg"];

/// A passage of a document handed to the generator
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chunk {
    /// Position of the chunk in the document
    pub index: usize,
    /// The passage
    pub text: String,
    /// Retrieval score, higher is better
    pub score: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct Passage {
    pub(crate) text: String,
    pub(crate) term_counts: HashMap<String, usize>,
}

/// A document split into overlapping word windows
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    passages: Vec<Passage>,
}

impl Corpus {
    /// A corpus without any text
    pub fn empty() -> Self {
        Self::default()
    }

    /// Split `text` into windows of `chunk_words` words, where neighbouring
    /// windows share `overlap` words.
    pub fn from_text(text: &str, chunk_words: usize, overlap: usize) -> Self {
        let words = text.split_whitespace().collect::<Vec<_>>();
        let chunk_words = chunk_words.max(1);
        let step = chunk_words.saturating_sub(overlap).max(1);

        let mut passages = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + chunk_words).min(words.len());
            let text = words[start..end].join(" ");

            let mut term_counts = HashMap::new();
            for term in terms(&text) {
                *term_counts.entry(term).or_insert(0) += 1;
            }

            passages.push(Passage { text, term_counts });

            if end == words.len() {
                break;
            }
            start += step;
        }

        Self { passages }
    }

    /// Read the document at `path`.
    ///
    /// Formats we can't read text from (PDFs, office documents, images)
    /// give an empty corpus.
    pub async fn load(path: &Path, chunk_words: usize, overlap: usize) -> io::Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let is_markup = MARKUP_EXTENSIONS.contains(&extension.as_str());
        if !is_markup && !TEXT_EXTENSIONS.contains(&extension.as_str()) {
            tracing::debug!(?path, %extension, "No text extraction for this format");
            return Ok(Self::empty());
        }

        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8_lossy(&bytes);
        let text = if is_markup {
            strip_markup(&text)
        } else {
            text.into_owned()
        };

        Ok(Self::from_text(&text, chunk_words, overlap))
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Whether there is any text at all
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub(crate) fn passages(&self) -> &[Passage] {
        &self.passages
    }
}

/// Drop tags, scripts and styles, keeping the text in between.
pub fn strip_markup(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        rest = &rest[open..];

        let lowercase = rest.get(..8).unwrap_or(rest).to_ascii_lowercase();
        let skip_until = if lowercase.starts_with("<script") {
            Some("</script>")
        } else if lowercase.starts_with("<style") {
            Some("</style>")
        } else {
            None
        };

        let end = match skip_until {
            Some(closing) => rest
                .to_ascii_lowercase()
                .find(closing)
                .map(|i| i + closing.len()),
            None => rest.find('>').map(|i| i + 1),
        };

        match end {
            Some(end) => {
                text.push(' ');
                rest = &rest[end..];
            }
            None => {
                rest = "";
            }
        }
    }
    text.push_str(rest);

    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}
