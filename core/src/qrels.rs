use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One relevance judgment. Labels above zero are relevant; zero and below
/// are judged nonrelevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qrel {
    pub query_id: String,
    pub docno: String,
    pub label: i32,
}

impl Qrel {
    pub fn new(query_id: impl Into<String>, docno: impl Into<String>, label: i32) -> Self {
        Self { query_id: query_id.into(), docno: docno.into(), label }
    }
}

/// Judgments grouped by query id. A repeated `(query, doc)` pair keeps the
/// last label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qrels {
    judgments: BTreeMap<String, HashMap<String, i32>>,
}

impl Qrels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, qrel: Qrel) {
        self.judgments.entry(qrel.query_id).or_default().insert(qrel.docno, qrel.label);
    }

    pub fn contains_query(&self, query_id: &str) -> bool {
        self.judgments.contains_key(query_id)
    }

    pub fn judgments(&self, query_id: &str) -> Option<&HashMap<String, i32>> {
        self.judgments.get(query_id)
    }

    pub fn query_ids(&self) -> impl Iterator<Item = &str> {
        self.judgments.keys().map(String::as_str)
    }

    pub fn num_queries(&self) -> usize {
        self.judgments.len()
    }

    pub fn num_relevant(&self, query_id: &str) -> usize {
        self.judgments(query_id).map_or(0, |j| j.values().filter(|&&l| l > 0).count())
    }

    /// `qid iteration docno label`, whitespace separated.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut qrels = Qrels::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() != 4 {
                return Err(Error::Parse { line: i + 1, message: format!("expected 4 columns, found {}", cols.len()) });
            }
            let label: i32 = cols[3]
                .parse()
                .map_err(|_| Error::Parse { line: i + 1, message: format!("bad relevance label {:?}", cols[3]) })?;
            qrels.insert(Qrel::new(cols[0], cols[2], label));
        }
        Ok(qrels)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::read(text.as_bytes())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }
}

impl FromIterator<Qrel> for Qrels {
    fn from_iter<I: IntoIterator<Item = Qrel>>(iter: I) -> Self {
        let mut qrels = Qrels::new();
        for qrel in iter {
            qrels.insert(qrel);
        }
        qrels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_columns() {
        let qrels = Qrels::parse("51 0 AP880212-0001 1\n51 0 AP880212-0002 0\n52 0 AP880213-0003 2\n").unwrap();
        assert_eq!(qrels.num_queries(), 2);
        assert_eq!(qrels.num_relevant("51"), 1);
        assert_eq!(qrels.judgments("52").unwrap()["AP880213-0003"], 2);
    }

    #[test]
    fn rejects_short_lines() {
        assert!(matches!(Qrels::parse("51 AP880212-0001 1\n"), Err(Error::Parse { line: 1, .. })));
    }
}
