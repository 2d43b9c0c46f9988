use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: u32,
    pub num_terms: usize,
    pub total_terms: u64,
    /// Analyzer fingerprint, readable without decoding the index payload.
    pub fingerprint: String,
    /// Human-readable analyzer summary.
    pub analyzer: String,
    pub created_at: String,
}

impl MetaFile {
    pub fn describe(index: &InvertedIndex) -> Self {
        Self {
            version: FORMAT_VERSION,
            num_docs: index.num_docs(),
            num_terms: index.num_terms(),
            total_terms: index.total_terms(),
            fingerprint: index.fingerprint().to_string(),
            analyzer: index.analyzer_config().to_string(),
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    pub fn exists(&self) -> bool {
        self.index().is_file() && self.meta().is_file()
    }
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let mut f = BufWriter::new(File::create(paths.index())?);
    bincode::serialize_into(&mut f, index)?;
    f.flush()?;
    let meta = MetaFile::describe(index);
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index saved");
    Ok(meta)
}

/// Load and validate an index written by [`save_index`].
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::Corruption(format!(
            "index format version {} (expected {FORMAT_VERSION})",
            meta.version
        )));
    }
    let f = BufReader::new(File::open(paths.index())?);
    let index: InvertedIndex = bincode::deserialize_from(f)?;
    if index.fingerprint() != meta.fingerprint || index.num_docs() != meta.num_docs {
        return Err(Error::Corruption("meta.json does not describe index.bin".into()));
    }
    index.validate()?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, analyzer = %meta.analyzer, "index loaded");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
