//! Error types for wordvec

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Expected a space in the first line of '{source_name}': '{header}'")]
    MalformedHeader { source_name: String, header: String },

    #[error(
        "For file '{source_name}', vocab size is {expected}, but there are {actual} word vectors in the file"
    )]
    VocabSizeMismatch {
        source_name: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "For file '{source_name}', on line {line}, layer size is {expected}, but found {actual} values in the word vector"
    )]
    LayerSizeMismatch {
        source_name: String,
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Expected {expected} vector components, got {actual}")]
    VectorCountMismatch { expected: usize, actual: usize },

    #[error("Vector index {index} out of range for vocabulary of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown word: {0}")]
    UnknownWord(String),

    #[error("Parse error in '{source_name}' on line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;
