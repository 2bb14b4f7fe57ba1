//! Compact, lossless model format
//!
//! Unlike the word2vec formats this keeps full `f64` precision and has no
//! line-based parsing ambiguity, so it is the preferred form for handing a
//! model between processes running this library.
//!
//! Layout (all little-endian):
//! ```text
//! magic: u32 ("WVCM")
//! version: u32
//! layer_size: u32
//! vocab_len: u64
//!   per token: len: u32 + utf8 bytes
//! vectors_len: u64
//!   vectors_len x f64
//! ```

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::config::MAX_PREALLOC;
use crate::error::{Error, Result};
use crate::store::VectorStore;

const COMPACT_MAGIC: u32 = 0x5756434D; // "WVCM"
const COMPACT_VERSION: u32 = 1;

/// The three fields that make up a model, with vectors flattened in
/// vocabulary order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactModel {
    pub layer_size: usize,
    pub vocab: Vec<String>,
    pub vectors: Vec<f64>,
}

impl CompactModel {
    pub fn from_store(store: &VectorStore) -> Self {
        Self {
            layer_size: store.layer_size(),
            vocab: store.vocab().to_vec(),
            vectors: store.flatten().into_owned(),
        }
    }

    pub fn into_store(self, max_segment_doubles: usize) -> Result<VectorStore> {
        VectorStore::from_dense(self.vocab, self.layer_size, self.vectors, max_segment_doubles)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_parts(writer, self.layer_size, &self.vocab, &self.vectors)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        read_parts(reader).map_err(|e| match e {
            Error::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                Error::Corruption("compact model is truncated".to_string())
            }
            other => other,
        })
    }
}

/// Write `store` without materialising an intermediate [`CompactModel`]
pub fn encode<W: Write>(store: &VectorStore, writer: &mut W) -> Result<()> {
    write_parts(writer, store.layer_size(), store.vocab(), &store.flatten())
}

pub fn decode<R: Read>(reader: &mut R, max_segment_doubles: usize) -> Result<VectorStore> {
    CompactModel::read(reader)?.into_store(max_segment_doubles)
}

fn write_parts<W: Write>(
    writer: &mut W,
    layer_size: usize,
    vocab: &[String],
    vectors: &[f64],
) -> Result<()> {
    let layer_size = u32::try_from(layer_size).map_err(|_| {
        Error::InvalidConfig(format!("layer size {} does not fit in u32", layer_size))
    })?;

    writer.write_u32::<LittleEndian>(COMPACT_MAGIC)?;
    writer.write_u32::<LittleEndian>(COMPACT_VERSION)?;
    writer.write_u32::<LittleEndian>(layer_size)?;

    writer.write_u64::<LittleEndian>(vocab.len() as u64)?;
    for token in vocab {
        let bytes = token.as_bytes();
        let len = u32::try_from(bytes.len())
            .map_err(|_| Error::InvalidConfig(format!("token of {} bytes", bytes.len())))?;
        writer.write_u32::<LittleEndian>(len)?;
        writer.write_all(bytes)?;
    }

    writer.write_u64::<LittleEndian>(vectors.len() as u64)?;
    for &value in vectors {
        writer.write_f64::<LittleEndian>(value)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_parts<R: Read>(reader: &mut R) -> Result<CompactModel> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != COMPACT_MAGIC {
        return Err(Error::Corruption(format!(
            "invalid compact model magic {:#010x}",
            magic
        )));
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != COMPACT_VERSION {
        return Err(Error::Corruption(format!(
            "unsupported compact model version {}",
            version
        )));
    }
    let layer_size = reader.read_u32::<LittleEndian>()? as usize;

    let vocab_len = reader.read_u64::<LittleEndian>()? as usize;
    let mut vocab = Vec::with_capacity(vocab_len.min(MAX_PREALLOC));
    let mut bytes = Vec::new();
    for i in 0..vocab_len {
        let len = reader.read_u32::<LittleEndian>()? as usize;
        bytes.clear();
        reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let token = std::str::from_utf8(&bytes)
            .map_err(|e| Error::Corruption(format!("token #{} is not UTF-8: {}", i, e)))?;
        vocab.push(token.to_string());
    }

    let vectors_len = reader.read_u64::<LittleEndian>()? as usize;
    let expected = vocab_len.checked_mul(layer_size).ok_or_else(|| {
        Error::Corruption(format!(
            "{} vectors of layer size {} overflow",
            vocab_len, layer_size
        ))
    })?;
    if vectors_len != expected {
        return Err(Error::VectorCountMismatch {
            expected,
            actual: vectors_len,
        });
    }
    let mut vectors = Vec::with_capacity(vectors_len.min(MAX_PREALLOC));
    let mut chunk = [0f64; 1024];
    let mut remaining = vectors_len;
    while remaining > 0 {
        let n = remaining.min(chunk.len());
        reader.read_f64_into::<LittleEndian>(&mut chunk[..n])?;
        vectors.extend_from_slice(&chunk[..n]);
        remaining -= n;
    }

    Ok(CompactModel {
        layer_size,
        vocab,
        vectors,
    })
}
