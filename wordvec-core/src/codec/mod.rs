//! Model file formats
//!
//! - [`binary`] - the C word2vec binary layout (`f32` on disk)
//! - [`text`] - the C word2vec text layout
//! - [`compact`] - lossless length-prefixed `f64` layout
//!
//! Every decoder builds a fresh [`VectorStore`](crate::store::VectorStore)
//! and only returns it once the whole input has been consumed.

pub mod binary;
pub mod compact;
pub mod mapped;
pub mod text;

pub use compact::CompactModel;
pub use mapped::{MapSource, MappedCursor, Remap};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// On-disk model format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Binary,
    Text,
    Compact,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Binary, Format::Text, Format::Compact];

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bin" => Some(Format::Binary),
            "txt" | "vec" => Some(Format::Text),
            "wvc" => Some(Format::Compact),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Binary => "binary",
            Format::Text => "text",
            Format::Compact => "compact",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Format::Binary),
            "text" | "txt" => Ok(Format::Text),
            "compact" | "wvc" => Ok(Format::Compact),
            other => Err(Error::InvalidConfig(format!(
                "unknown model format '{}', expected one of: binary, text, compact",
                other
            ))),
        }
    }
}
