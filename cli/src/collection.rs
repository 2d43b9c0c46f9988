use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use trec_core::trec::read_collection_file;
use trec_core::RawDocument;
use walkdir::WalkDir;

/// Collection files under `root` in file-name order, so docIds are stable
/// across runs. With a prefix, only files whose name starts with it are kept.
/// An unreadable root fails; unreadable entries below it are logged and skipped.
pub fn collection_files(root: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(err).with_context(|| format!("walking collection {}", root.display()));
            }
            Err(err) => {
                tracing::warn!(path = ?err.path(), error = %err, "skipping unreadable collection entry");
                continue;
            }
        };
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        let name = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if prefix.map_or(true, |pre| name.starts_with(pre)) {
            files.push(p.to_path_buf());
        }
    }
    Ok(files)
}

pub fn load_collection(root: &Path, prefix: Option<&str>) -> Result<Vec<RawDocument>> {
    let files = collection_files(root, prefix)?;
    tracing::info!(root = %root.display(), files = files.len(), "reading collection");
    let mut documents = Vec::new();
    for file in files {
        let docs = read_collection_file(&file).with_context(|| format!("reading {}", file.display()))?;
        tracing::debug!(file = %file.display(), docs = docs.len(), "collection file read");
        documents.extend(docs);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_sorted_and_filters_prefix() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("AP880213"), "<DOC><DOCNO>B</DOCNO><TEXT>b</TEXT></DOC>").unwrap();
        fs::write(dir.path().join("AP880212"), "<DOC><DOCNO>A</DOCNO><TEXT>a</TEXT></DOC>").unwrap();
        fs::write(dir.path().join("README"), "<DOC><DOCNO>X</DOCNO><TEXT>x</TEXT></DOC>").unwrap();
        let docs = load_collection(dir.path(), Some("AP")).unwrap();
        let docnos: Vec<&str> = docs.iter().map(|d| d.docno.as_str()).collect();
        assert_eq!(docnos, vec!["A", "B"]);
        assert_eq!(load_collection(dir.path(), None).unwrap().len(), 3);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no_such_collection");
        assert!(collection_files(&missing, None).is_err());
        assert!(load_collection(&missing, Some("AP")).is_err());
    }
}
