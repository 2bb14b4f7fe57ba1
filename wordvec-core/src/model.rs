//! Word embedding model
//!
//! A [`Model`] is a vocabulary plus one vector per token, backed by a
//! segmented [`VectorStore`]. It is obtained from a trainer
//! ([`Model::from_trainer`]) or by loading one of the supported
//! [`Format`]s, and can be saved to any of them.
//!
//! ```no_run
//! use wordvec_core::{Format, Model};
//!
//! let model = Model::from_bin_file("vectors.bin")?;
//! model.save("vectors.wvc", Format::Compact)?;
//!
//! let searcher = model.for_search();
//! for m in searcher.nearest("king", 5)? {
//!     println!("{} {:.4}", m.word, m.similarity);
//! }
//! # Ok::<(), wordvec_core::Error>(())
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::codec::{CompactModel, Format, binary, compact, text};
use crate::config::{LoadOptions, MAX_SEGMENT_DOUBLES};
use crate::error::{Error, Result};
#[cfg(feature = "native")]
use crate::progress::NoProgress;
use crate::progress::ProgressSink;
use crate::search::Searcher;
use crate::store::VectorStore;

#[derive(Debug, Clone)]
pub struct Model {
    store: Arc<VectorStore>,
}

impl Model {
    pub fn from_store(store: VectorStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Take over the output of a trainer: the vocabulary, the vector width,
    /// and `vocab.len() * layer_size` components in vocabulary order.
    pub fn from_trainer(vocab: Vec<String>, layer_size: usize, vectors: Vec<f64>) -> Result<Self> {
        let store = VectorStore::from_dense(vocab, layer_size, vectors, MAX_SEGMENT_DOUBLES)?;
        Ok(Self::from_store(store))
    }

    pub fn vocab(&self) -> &[String] {
        self.store.vocab()
    }

    pub fn layer_size(&self) -> usize {
        self.store.layer_size()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn vector_at(&self, index: usize) -> Result<&[f64]> {
        self.store.vector_at(index)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Read-only query handle sharing this model's vectors
    pub fn for_search(&self) -> Searcher {
        Searcher::new(Arc::clone(&self.store))
    }

    // ---- compact -------------------------------------------------------

    pub fn to_compact(&self) -> CompactModel {
        CompactModel::from_store(&self.store)
    }

    pub fn from_compact(model: CompactModel) -> Result<Self> {
        model.into_store(MAX_SEGMENT_DOUBLES).map(Self::from_store)
    }

    pub fn write_compact<W: Write>(&self, writer: &mut W) -> Result<()> {
        compact::encode(&self.store, writer)
    }

    pub fn read_compact<R: Read>(reader: &mut R) -> Result<Self> {
        compact::decode(reader, MAX_SEGMENT_DOUBLES).map(Self::from_store)
    }

    pub fn from_compact_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_compact(&mut reader)
    }

    pub fn save_compact_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_compact(&mut writer)
    }

    // ---- text ----------------------------------------------------------

    pub fn from_text_file(path: impl AsRef<Path>) -> Result<Self> {
        text::decode_file(path.as_ref(), MAX_SEGMENT_DOUBLES).map(Self::from_store)
    }

    /// Decode already-materialised lines. `source_name` is used in errors.
    pub fn from_text_lines<L: AsRef<str>>(source_name: &str, lines: &[L]) -> Result<Self> {
        text::decode(source_name, lines, MAX_SEGMENT_DOUBLES).map(Self::from_store)
    }

    pub fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        text::encode(&self.store, writer)
    }

    pub fn save_text_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_text(&mut writer)
    }

    // ---- binary --------------------------------------------------------

    /// Load a little-endian binary model with default options
    #[cfg(feature = "native")]
    pub fn from_bin_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bin_file_with(path, &LoadOptions::default(), &NoProgress)
    }

    #[cfg(feature = "native")]
    pub fn from_bin_file_with(
        path: impl AsRef<Path>,
        options: &LoadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let store = binary::decode(&file, &path.display().to_string(), options, progress)?;
        Ok(Self::from_store(store))
    }

    /// Decode a binary model held in memory
    pub fn from_bin_bytes(
        bytes: &[u8],
        options: &LoadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Self> {
        binary::decode(&bytes, "<memory>", options, progress).map(Self::from_store)
    }

    pub fn write_bin<W: Write>(&self, writer: &mut W) -> Result<()> {
        binary::encode(&self.store, writer)
    }

    pub fn save_bin_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_bin(&mut writer)
    }

    // ---- any format ----------------------------------------------------

    /// Load `path` as `format`. `options` and `progress` apply to the
    /// binary format; the segment capacity applies to all of them.
    #[cfg(feature = "native")]
    pub fn load(
        path: impl AsRef<Path>,
        format: Format,
        options: &LoadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Self> {
        let path = path.as_ref();
        options.validate()?;
        log::debug!("Loading {} model from {}", format, path.display());
        let store = match format {
            Format::Binary => return Self::from_bin_file_with(path, options, progress),
            Format::Text => text::decode_file(path, options.max_segment_doubles)?,
            Format::Compact => {
                let mut reader = BufReader::new(File::open(path)?);
                compact::decode(&mut reader, options.max_segment_doubles)?
            }
        };
        Ok(Self::from_store(store))
    }

    pub fn save(&self, path: impl AsRef<Path>, format: Format) -> Result<()> {
        let path = path.as_ref();
        log::debug!("Saving {} model to {}", format, path.display());
        match format {
            Format::Binary => self.save_bin_file(path),
            Format::Text => self.save_text_file(path),
            Format::Compact => self.save_compact_file(path),
        }
    }

    /// Guess the format of `path` from its extension
    pub fn detect_format(path: impl AsRef<Path>) -> Result<Format> {
        let path = path.as_ref();
        Format::from_path(path).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "cannot infer model format from '{}'",
                path.display()
            ))
        })
    }
}
