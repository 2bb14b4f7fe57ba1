//! wordvec - storage and codecs for word embedding models
//!
//! This library provides:
//! - A segmented vector store that spreads billions of bytes of vectors over
//!   fixed-capacity buffers, never splitting a vector across two of them
//! - Bit-compatible reading and writing of the C word2vec binary format,
//!   memory-mapping inputs larger than a single mapping can address
//! - The C word2vec text format
//! - A lossless compact format for exchanging models between processes
//! - Read-only similarity search over a loaded model

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod progress;
pub mod search;
pub mod store;

pub use codec::{CompactModel, Format};
pub use config::{Endianness, LoadOptions};
pub use error::{Error, Result};
pub use model::Model;
pub use progress::{LogProgress, NoProgress, ProgressSink, WriterProgress};
pub use search::{Match, Searcher, VectorSource};
pub use store::{SegmentLayout, StoreBuilder, VectorStore};
