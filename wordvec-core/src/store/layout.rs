//! Segment geometry: which segment holds a vector and where

use crate::error::{Error, Result};

/// Partitioning of `num_vectors` vectors of `layer_size` doubles into
/// fixed-capacity segments.
///
/// Every segment except the last holds exactly `vectors_per_segment`
/// vectors. The last one holds the remainder, or a full complement when
/// the count divides evenly. A vector never straddles two segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    num_vectors: usize,
    layer_size: usize,
    vectors_per_segment: usize,
}

impl SegmentLayout {
    pub fn new(num_vectors: usize, layer_size: usize, max_segment_doubles: usize) -> Result<Self> {
        if layer_size == 0 {
            return Err(Error::InvalidConfig(
                "layer size must be positive".to_string(),
            ));
        }
        let vectors_per_segment = max_segment_doubles / layer_size;
        if vectors_per_segment == 0 {
            return Err(Error::InvalidConfig(format!(
                "a segment of {} doubles cannot hold a single vector of layer size {}",
                max_segment_doubles, layer_size
            )));
        }
        Ok(Self {
            num_vectors,
            layer_size,
            vectors_per_segment,
        })
    }

    #[inline]
    pub fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    #[inline]
    pub fn layer_size(&self) -> usize {
        self.layer_size
    }

    #[inline]
    pub fn vectors_per_segment(&self) -> usize {
        self.vectors_per_segment
    }

    pub fn num_segments(&self) -> usize {
        self.num_vectors.div_ceil(self.vectors_per_segment)
    }

    /// Number of vectors stored in segment `segment`
    pub fn segment_vectors(&self, segment: usize) -> usize {
        let start = segment * self.vectors_per_segment;
        self.num_vectors
            .saturating_sub(start)
            .min(self.vectors_per_segment)
    }

    /// Length of segment `segment`, in doubles
    pub fn segment_len(&self, segment: usize) -> usize {
        self.segment_vectors(segment) * self.layer_size
    }

    /// Map a global vector index to `(segment, offset in doubles)`
    #[inline]
    pub fn locate(&self, index: usize) -> (usize, usize) {
        (
            index / self.vectors_per_segment,
            (index % self.vectors_per_segment) * self.layer_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evenly_divisible_has_no_remainder_segment() {
        // 4 doubles per vector, 8 vectors per segment
        let layout = SegmentLayout::new(24, 4, 35).unwrap();
        assert_eq!(layout.vectors_per_segment(), 8);
        assert_eq!(layout.num_segments(), 3);
        for seg in 0..3 {
            assert_eq!(layout.segment_vectors(seg), 8);
            assert_eq!(layout.segment_len(seg), 32);
        }
    }

    #[test]
    fn test_remainder_goes_to_last_segment() {
        let layout = SegmentLayout::new(21, 4, 32).unwrap();
        assert_eq!(layout.num_segments(), 3);
        assert_eq!(layout.segment_vectors(0), 8);
        assert_eq!(layout.segment_vectors(1), 8);
        assert_eq!(layout.segment_vectors(2), 5);
        assert_eq!(layout.segment_vectors(3), 0);
    }

    #[test]
    fn test_locate() {
        let layout = SegmentLayout::new(21, 4, 32).unwrap();
        assert_eq!(layout.locate(0), (0, 0));
        assert_eq!(layout.locate(7), (0, 28));
        assert_eq!(layout.locate(8), (1, 0));
        assert_eq!(layout.locate(20), (2, 16));
    }

    #[test]
    fn test_empty_and_invalid() {
        let layout = SegmentLayout::new(0, 3, 30).unwrap();
        assert_eq!(layout.num_segments(), 0);

        assert!(matches!(
            SegmentLayout::new(10, 0, 30),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            SegmentLayout::new(10, 31, 30),
            Err(Error::InvalidConfig(_))
        ));
    }
}
