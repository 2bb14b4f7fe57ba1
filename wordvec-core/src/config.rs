//! Configuration for model loading

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest segment we will build, in doubles.
///
/// Segments mirror what a single memory-mapped region can address with a
/// signed 32-bit length: `i32::MAX` bytes, eight bytes per double.
pub const MAX_SEGMENT_DOUBLES: usize = i32::MAX as usize / 8;

/// Distance the mapped view advances on each remap (1 GiB)
pub const REMAP_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Largest single mapped view over an input file
pub const MAP_WINDOW: u64 = i32::MAX as u64;

/// Upper bound on speculative pre-allocation from untrusted length fields
pub(crate) const MAX_PREALLOC: usize = 1 << 20;

/// Byte order of the `f32` values in a binary model file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// What the C word2vec tool writes on x86 and ARM
    #[default]
    Little,
    Big,
}

/// Options for decoding binary models.
///
/// Deserializable so a tool can read them from a JSON file; missing fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Byte order of the float data (writing is always little-endian)
    pub byte_order: Endianness,
    /// Capacity of each in-memory segment, in doubles
    pub max_segment_doubles: usize,
    /// Cursor position within a view that triggers a remap
    pub remap_threshold: u64,
    /// Upper bound on the length of a single mapped view
    pub map_window: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            byte_order: Endianness::Little,
            max_segment_doubles: MAX_SEGMENT_DOUBLES,
            remap_threshold: REMAP_THRESHOLD,
            map_window: MAP_WINDOW,
        }
    }
}

impl LoadOptions {
    pub fn with_byte_order(mut self, byte_order: Endianness) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_max_segment_doubles(mut self, max_segment_doubles: usize) -> Self {
        self.max_segment_doubles = max_segment_doubles;
        self
    }

    /// Override the remap geometry. Mostly useful for exercising the remap
    /// path without gigabyte-sized inputs.
    pub fn with_remap(mut self, remap_threshold: u64, map_window: u64) -> Self {
        self.remap_threshold = remap_threshold;
        self.map_window = map_window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_segment_doubles == 0 {
            return Err(Error::InvalidConfig(
                "max_segment_doubles must be positive".to_string(),
            ));
        }
        if self.remap_threshold == 0 {
            return Err(Error::InvalidConfig(
                "remap_threshold must be positive".to_string(),
            ));
        }
        // The cursor may sit just past the threshold when a remap happens,
        // so the window has to reach beyond it.
        if self.map_window <= self.remap_threshold {
            return Err(Error::InvalidConfig(format!(
                "map_window ({}) must exceed remap_threshold ({})",
                self.map_window, self.remap_threshold
            )));
        }
        Ok(())
    }
}
