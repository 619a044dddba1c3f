//! Query enhancement: turning a question into search keywords

use serde::Serialize;

/// Words that carry no meaning for retrieval
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "been", "before", "being", "between", "both", "but", "by", "can", "could", "did",
    "do", "does", "doing", "during", "each", "for", "from", "had", "has", "have", "having", "he",
    "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my", "no", "nor", "not",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own", "per",
    "same", "shall", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "upon", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "within", "would", "you", "your",
    "yours",
];

/// A question prepared for retrieval
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnhancedQuery {
    /// The question as asked
    pub original: String,
    /// Lowercased question with punctuation removed
    pub normalized: String,
    /// Distinct search terms, in order of appearance
    pub keywords: Vec<String>,
}

/// Turns questions into [`EnhancedQuery`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryEnhancer;

impl QueryEnhancer {
    /// Normalize the question and extract its keywords.
    pub fn enhance(&self, question: &str) -> EnhancedQuery {
        let words = words(question).collect::<Vec<_>>();

        let mut keywords: Vec<String> = Vec::new();
        for keyword in words.iter().filter_map(|word| term(word)) {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }

        EnhancedQuery {
            original: question.to_string(),
            normalized: words.join(" "),
            keywords,
        }
    }
}

/// Lowercased alphanumeric words of `text`
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

/// The search term for a lowercased word, or `None` for stopwords.
///
/// Plural `s` is dropped so "claims" and "claim" match.
pub fn term(word: &str) -> Option<String> {
    if STOPWORDS.contains(&word) {
        return None;
    }

    let is_plural = word.len() > 3 && word.ends_with('s') && !word.ends_with("ss");
    let stem = if is_plural {
        &word[..word.len() - 1]
    } else {
        word
    };

    Some(stem.to_string())
}

/// All search terms of `text`, with repetitions
pub fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    words(text).filter_map(|word| term(&word))
}
