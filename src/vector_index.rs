//! Per-document nearest-neighbour index over chunk embeddings.
//!
//! A document holds at most a few thousand chunks, so an exhaustive cosine scan is fast enough
//! and keeps the index free of tuning parameters. The [`VectorIndex`] trait is the seam for
//! swapping in an approximate index later.

use crate::processing::Chunk;
use std::cmp::Ordering;
use thiserror::Error;

/// Errors raised while building or querying an index.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// No chunks were supplied.
    #[error("cannot build an index without chunks")]
    Empty,
    /// The number of embeddings differs from the number of chunks.
    #[error("expected {chunks} embeddings, got {embeddings}")]
    LengthMismatch {
        /// Chunks supplied to the index.
        chunks: usize,
        /// Embeddings supplied to the index.
        embeddings: usize,
    },
    /// A vector's dimension differs from the index dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the first embedding.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// Chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// Similarity search over one document's chunks.
pub trait VectorIndex: Send + Sync {
    /// Number of indexed chunks.
    fn len(&self) -> usize;

    /// Whether the index holds no chunks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return up to `k` chunks ordered by descending similarity to `vector`.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;
}

struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
    norm: f32,
}

/// Flat in-memory index scanning every entry per query.
pub struct InMemoryVectorIndex {
    entries: Vec<Entry>,
    dimension: usize,
}

impl InMemoryVectorIndex {
    /// Build an index from chunks and their parallel embeddings.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }
        if chunks.len() != embeddings.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimension = embeddings[0].len();
        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            if embedding.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            let norm = l2_norm(&embedding);
            entries.push(Entry {
                chunk,
                embedding,
                norm,
            });
        }

        Ok(Self { entries, dimension })
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine(vector, query_norm, &entry.embedding, entry.norm), entry))
            .collect();

        // Ties keep document order so equal scores cite earlier text first.
        scored.sort_by(|(left_score, left), (right_score, right)| {
            right_score
                .partial_cmp(left_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.chunk.position.cmp(&right.chunk.position))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(left: &[f32], left_norm: f32, right: &[f32], right_norm: f32) -> f32 {
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    dot / (left_norm * right_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(position: usize, page: u32, text: &str) -> Chunk {
        Chunk {
            position,
            page,
            text: text.to_string(),
        }
    }

    fn sample_index() -> InMemoryVectorIndex {
        InMemoryVectorIndex::build(
            vec![
                chunk(0, 1, "north"),
                chunk(1, 1, "east"),
                chunk(2, 2, "north-east"),
            ],
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        )
        .expect("index")
    }

    #[test]
    fn query_orders_by_similarity() {
        let hits = sample_index().query(&[0.1, 1.0], 3).expect("query");
        let texts: Vec<&str> = hits.iter().map(|hit| hit.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["north", "north-east", "east"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn query_caps_results_at_k_and_len() {
        let index = sample_index();
        assert_eq!(index.query(&[1.0, 0.0], 1).expect("query").len(), 1);
        assert_eq!(index.query(&[1.0, 0.0], 10).expect("query").len(), 3);
        assert!(index.query(&[1.0, 0.0], 0).expect("query").is_empty());
    }

    #[test]
    fn equal_scores_keep_document_order() {
        let index = InMemoryVectorIndex::build(
            vec![chunk(0, 1, "a"), chunk(1, 1, "b")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .expect("index");
        let hits = index.query(&[1.0, 0.0], 2).expect("query");
        assert_eq!(hits[0].chunk.position, 0);
        assert_eq!(hits[1].chunk.position, 1);
    }

    #[test]
    fn build_rejects_mismatched_inputs() {
        assert_eq!(
            InMemoryVectorIndex::build(Vec::new(), Vec::new()).err(),
            Some(IndexError::Empty)
        );
        assert_eq!(
            InMemoryVectorIndex::build(vec![chunk(0, 1, "a")], Vec::new()).err(),
            Some(IndexError::LengthMismatch {
                chunks: 1,
                embeddings: 0
            })
        );
        assert_eq!(
            InMemoryVectorIndex::build(
                vec![chunk(0, 1, "a"), chunk(1, 1, "b")],
                vec![vec![1.0, 0.0], vec![1.0]],
            )
            .err(),
            Some(IndexError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn query_rejects_wrong_dimension() {
        let error = sample_index().query(&[1.0, 0.0, 0.0], 2).unwrap_err();
        assert_eq!(
            error,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }
}
