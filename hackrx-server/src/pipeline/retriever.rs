//! Keyword retrieval over a [`Corpus`]

use super::{
    corpus::{Chunk, Corpus},
    enhancer::EnhancedQuery,
};
use std::cmp::Ordering;

/// Finds the chunks of a corpus that best match a query
#[derive(Clone, Copy, Debug)]
pub struct Retriever {
    top_k: usize,
}

impl Retriever {
    /// A retriever returning at most `top_k` chunks
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Score every chunk against the query keywords, rerank by how many
    /// distinct keywords each chunk covers and keep the best `top_k`.
    ///
    /// Chunks that match no keyword are never returned.
    pub fn retrieve_and_rerank(&self, query: &EnhancedQuery, corpus: &Corpus) -> Vec<Chunk> {
        if query.keywords.is_empty() || corpus.is_empty() {
            return Vec::new();
        }

        let passages = corpus.passages();
        let total = passages.len() as f64;

        let idf = query
            .keywords
            .iter()
            .map(|keyword| {
                let df = passages
                    .iter()
                    .filter(|p| p.term_counts.contains_key(keyword))
                    .count() as f64;
                (1.0 + total / (1.0 + df)).ln()
            })
            .collect::<Vec<_>>();

        let mut scored = passages
            .iter()
            .enumerate()
            .filter_map(|(index, passage)| {
                let mut score = 0.0;
                let mut covered = 0;
                for (keyword, idf) in query.keywords.iter().zip(&idf) {
                    if let Some(&tf) = passage.term_counts.get(keyword) {
                        score += (1.0 + (tf as f64).ln()) * idf;
                        covered += 1;
                    }
                }

                if covered == 0 {
                    return None;
                }

                let coverage = covered as f64 / query.keywords.len() as f64;
                Some(Chunk {
                    index,
                    text: passage.text.clone(),
                    score: score * coverage,
                })
            })
            .collect::<Vec<_>>();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        scored.truncate(self.top_k);

        tracing::debug!(
            keywords = ?query.keywords,
            retrieved = scored.len(),
            "Retrieved chunks"
        );

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::enhancer::QueryEnhancer;

    fn corpus() -> Corpus {
        Corpus::from_text(
            "The grace period for premium payment is thirty days. \
             Pre-existing diseases are covered after thirty six months of continuous coverage. \
             Cataract surgery has a waiting period of two years. \
             The policy covers organ donor expenses.",
            12,
            0,
        )
    }

    #[test_log::test]
    fn test_best_chunk_first() {
        let query = QueryEnhancer.enhance("What is the grace period for premium payments?");
        let chunks = Retriever::new(3).retrieve_and_rerank(&query, &corpus());

        assert!(!chunks.is_empty());
        assert!(chunks[0].text.contains("grace period"));
        assert!(chunks.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test_log::test]
    fn test_top_k_limits() {
        let query = QueryEnhancer.enhance("period");
        let chunks = Retriever::new(1).retrieve_and_rerank(&query, &corpus());
        assert_eq!(chunks.len(), 1);
    }

    #[test_log::test]
    fn test_no_match_no_chunks() {
        let query = QueryEnhancer.enhance("Is dental implant treatment included?");
        assert!(Retriever::new(3)
            .retrieve_and_rerank(&query, &corpus())
            .is_empty());

        let query = QueryEnhancer.enhance("grace");
        assert!(Retriever::new(3)
            .retrieve_and_rerank(&query, &Corpus::empty())
            .is_empty());
    }
}
