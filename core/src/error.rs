//! Error types for trec-core

use std::io;

/// A document that could not be turned into analyzable text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("document #{position} ({docno:?}): {reason}")]
pub struct IngestError {
    /// External document number, empty when the collection did not supply one.
    pub docno: String,
    /// Arrival position in the input stream.
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("cannot build an index from an empty collection")]
    EmptyCollection,

    #[error("analyzer mismatch: index built with {index}, query analyzed with {query}")]
    ConfigMismatch { index: String, query: String },

    #[error("run {run:?} shares no query ids with the qrels")]
    NoOverlap { run: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("index corruption: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
