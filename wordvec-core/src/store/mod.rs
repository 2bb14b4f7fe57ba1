//! Segmented vector store
//!
//! Vectors live in an arena of fixed-capacity `f64` segments rather than
//! one contiguous allocation, so that no single buffer exceeds what a
//! memory-mapped region can address. [`SegmentLayout`] maps a vocabulary
//! index to its segment and offset.
//!
//! A store is assembled once, either from a dense array
//! ([`VectorStore::from_dense`]) or slot by slot through a
//! [`StoreBuilder`], and is read-only afterwards.

mod layout;

pub use layout::SegmentLayout;

use std::borrow::Cow;

use crate::config::MAX_PREALLOC;
use crate::error::{Error, Result};

/// Vocabulary plus its vectors, partitioned into segments
#[derive(Debug, Clone)]
pub struct VectorStore {
    vocab: Vec<String>,
    layout: SegmentLayout,
    segments: Vec<Box<[f64]>>,
}

impl VectorStore {
    /// Partition a flat `vocab.len() * layer_size` array into segments of at
    /// most `max_segment_doubles` doubles.
    ///
    /// When everything fits in one segment the array is adopted as-is.
    pub fn from_dense(
        vocab: Vec<String>,
        layer_size: usize,
        vectors: Vec<f64>,
        max_segment_doubles: usize,
    ) -> Result<Self> {
        let layout = SegmentLayout::new(vocab.len(), layer_size, max_segment_doubles)?;
        let expected = vocab.len().checked_mul(layer_size).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "{} vectors of layer size {} overflow the address space",
                vocab.len(),
                layer_size
            ))
        })?;
        if vectors.len() != expected {
            return Err(Error::VectorCountMismatch {
                expected,
                actual: vectors.len(),
            });
        }

        let segments = match layout.num_segments() {
            0 => Vec::new(),
            1 => vec![vectors.into_boxed_slice()],
            _ => vectors
                .chunks(layout.vectors_per_segment() * layer_size)
                .map(Box::from)
                .collect(),
        };

        Ok(Self {
            vocab,
            layout,
            segments,
        })
    }

    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    pub fn layer_size(&self) -> usize {
        self.layout.layer_size()
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Raw contents of one segment
    pub fn segment(&self, segment: usize) -> Option<&[f64]> {
        self.segments.get(segment).map(|s| &s[..])
    }

    /// The `layer_size` components of vector `index`
    pub fn vector_at(&self, index: usize) -> Result<&[f64]> {
        if index >= self.vocab.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.vocab.len(),
            });
        }
        let (segment, offset) = self.layout.locate(index);
        Ok(&self.segments[segment][offset..offset + self.layout.layer_size()])
    }

    /// `(token, vector)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        let layer_size = self.layout.layer_size();
        self.segments
            .iter()
            .flat_map(move |segment| segment.chunks_exact(layer_size))
            .zip(&self.vocab)
            .map(|(vector, token)| (token.as_str(), vector))
    }

    /// All vectors as one contiguous array in index order.
    ///
    /// Borrows when the store has a single segment, copies otherwise.
    pub fn flatten(&self) -> Cow<'_, [f64]> {
        match self.segments.as_slice() {
            [] => Cow::Borrowed(&[]),
            [only] => Cow::Borrowed(only),
            segments => {
                let total = self.vocab.len() * self.layout.layer_size();
                let mut flat = Vec::with_capacity(total);
                for segment in segments {
                    flat.extend_from_slice(segment);
                }
                Cow::Owned(flat)
            }
        }
    }

    /// Bytes held by the segments
    pub fn estimated_memory_bytes(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.len() * std::mem::size_of::<f64>())
            .sum()
    }
}

/// Fills a pre-allocated store one vector at a time, in index order.
///
/// Decoders own the builder until every slot is written; only
/// [`StoreBuilder::finish`] hands out a [`VectorStore`], so a failed decode
/// never exposes a partially-filled store.
#[derive(Debug)]
pub struct StoreBuilder {
    vocab: Vec<String>,
    layout: SegmentLayout,
    segments: Vec<Box<[f64]>>,
}

impl StoreBuilder {
    /// Allocate zeroed segments for `vocab_size` vectors: all full except
    /// possibly the last, which holds the remainder.
    pub fn allocate(
        vocab_size: usize,
        layer_size: usize,
        max_segment_doubles: usize,
    ) -> Result<Self> {
        let layout = SegmentLayout::new(vocab_size, layer_size, max_segment_doubles)?;
        let segments = (0..layout.num_segments())
            .map(|seg| vec![0.0f64; layout.segment_len(seg)].into_boxed_slice())
            .collect();
        Ok(Self {
            vocab: Vec::with_capacity(vocab_size.min(MAX_PREALLOC)),
            layout,
            segments,
        })
    }

    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// Number of vectors written so far
    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.vocab.len() == self.layout.num_vectors()
    }

    /// Record the next token and return the slot for its vector
    pub fn next_slot(&mut self, token: String) -> Result<&mut [f64]> {
        let index = self.vocab.len();
        if index >= self.layout.num_vectors() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.layout.num_vectors(),
            });
        }
        self.vocab.push(token);
        let (segment, offset) = self.layout.locate(index);
        let layer_size = self.layout.layer_size();
        Ok(&mut self.segments[segment][offset..offset + layer_size])
    }

    /// Seal the store. Fails unless every slot has been written.
    pub fn finish(self) -> Result<VectorStore> {
        if !self.is_full() {
            return Err(Error::VectorCountMismatch {
                expected: self.layout.num_vectors(),
                actual: self.vocab.len(),
            });
        }
        Ok(VectorStore {
            vocab: self.vocab,
            layout: self.layout,
            segments: self.segments,
        })
    }
}
