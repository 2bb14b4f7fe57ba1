//! Read-only queries over a loaded model
//!
//! A [`Searcher`] shares the model's store through an `Arc`, never mutates
//! it, and can be cloned freely across threads.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::store::VectorStore;

/// Minimal read access needed by similarity search
pub trait VectorSource {
    fn vocab(&self) -> &[String];
    fn vector_at(&self, index: usize) -> Result<&[f64]>;
}

impl VectorSource for VectorStore {
    fn vocab(&self) -> &[String] {
        VectorStore::vocab(self)
    }

    fn vector_at(&self, index: usize) -> Result<&[f64]> {
        VectorStore::vector_at(self, index)
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub word: String,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct Searcher {
    store: Arc<VectorStore>,
    word_index: Arc<FxHashMap<String, usize>>,
    norms: Arc<[f64]>,
}

impl Searcher {
    pub fn new(store: Arc<VectorStore>) -> Self {
        let mut word_index =
            FxHashMap::with_capacity_and_hasher(store.len(), Default::default());
        // First occurrence wins for repeated tokens
        for (i, word) in store.vocab().iter().enumerate() {
            word_index.entry(word.clone()).or_insert(i);
        }
        let norms: Arc<[f64]> = store.iter().map(|(_, v)| norm(v)).collect();
        Self {
            store,
            word_index: Arc::new(word_index),
            norms,
        }
    }

    pub fn layer_size(&self) -> usize {
        self.store.layer_size()
    }

    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.word_index.get(word).copied()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word_index.contains_key(word)
    }

    /// The stored (unnormalised) vector for `word`
    pub fn raw_vector(&self, word: &str) -> Result<&[f64]> {
        let index = self
            .index_of(word)
            .ok_or_else(|| Error::UnknownWord(word.to_string()))?;
        self.store.vector_at(index)
    }

    /// Cosine similarity between two words
    pub fn cosine_similarity(&self, a: &str, b: &str) -> Result<f64> {
        let ia = self
            .index_of(a)
            .ok_or_else(|| Error::UnknownWord(a.to_string()))?;
        let ib = self
            .index_of(b)
            .ok_or_else(|| Error::UnknownWord(b.to_string()))?;
        let dot = dot(self.store.vector_at(ia)?, self.store.vector_at(ib)?);
        Ok(cosine(dot, self.norms[ia], self.norms[ib]))
    }

    /// The `k` words closest to `word`, excluding `word` itself
    pub fn nearest(&self, word: &str, k: usize) -> Result<Vec<Match>> {
        let index = self
            .index_of(word)
            .ok_or_else(|| Error::UnknownWord(word.to_string()))?;
        let query = self.store.vector_at(index)?;
        Ok(self.rank(query, k, Some(index)))
    }

    /// The `k` words closest to an arbitrary vector
    pub fn nearest_to_vector(&self, vector: &[f64], k: usize) -> Result<Vec<Match>> {
        if vector.len() != self.layer_size() {
            return Err(Error::VectorCountMismatch {
                expected: self.layer_size(),
                actual: vector.len(),
            });
        }
        Ok(self.rank(vector, k, None))
    }

    fn rank(&self, query: &[f64], k: usize, exclude: Option<usize>) -> Vec<Match> {
        let query_norm = norm(query);
        let mut scored: Vec<(usize, f64)> = self
            .store
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != exclude)
            .map(|(i, (_, v))| (i, cosine(dot(query, v), query_norm, self.norms[i])))
            .collect();

        let by_score = |a: &(usize, f64), b: &(usize, f64)| {
            b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k, by_score);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_score);

        scored
            .into_iter()
            .map(|(i, similarity)| Match {
                word: self.store.vocab()[i].clone(),
                similarity,
            })
            .collect()
    }
}

impl VectorSource for Searcher {
    fn vocab(&self) -> &[String] {
        self.store.vocab()
    }

    fn vector_at(&self, index: usize) -> Result<&[f64]> {
        self.store.vector_at(index)
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

#[inline]
fn cosine(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    let denom = norm_a * norm_b;
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}
