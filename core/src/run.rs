//! TREC run files: `qid Q0 docno rank score tag`, one line per retrieved
//! document.

use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use crate::ranking::RankedResult;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub docno: String,
    pub rank: u32,
    pub score: f64,
}

/// Ranked lists of one model over a topic set, keyed by query id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    pub name: String,
    pub queries: BTreeMap<String, Vec<RunRow>>,
}

impl Run {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), queries: BTreeMap::new() }
    }

    /// Translate internal docIds into the collection's docnos.
    pub fn from_ranked(name: impl Into<String>, index: &InvertedIndex, results: &[RankedResult]) -> Result<Self> {
        let mut run = Run::new(name);
        for result in results {
            let mut rows = Vec::with_capacity(result.hits.len());
            for hit in &result.hits {
                let docno = index
                    .docno(hit.doc_id)
                    .ok_or_else(|| Error::Corruption(format!("doc {} has no docno", hit.doc_id)))?;
                rows.push(RunRow { docno: docno.to_string(), rank: hit.rank, score: hit.score });
            }
            run.queries.insert(result.query_id.clone(), rows);
        }
        Ok(run)
    }

    pub fn num_queries(&self) -> usize {
        self.queries.len()
    }

    pub fn num_rows(&self) -> usize {
        self.queries.values().map(Vec::len).sum()
    }

    pub fn rows(&self, query_id: &str) -> &[RunRow] {
        self.queries.get(query_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every field must be a single non-empty token or the file would not
    /// read back.
    pub fn check_writable(&self) -> Result<()> {
        check_field("run name", &self.name)?;
        for (qid, rows) in &self.queries {
            check_field("query id", qid)?;
            for row in rows {
                check_field("docno", &row.docno)?;
            }
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, mut out: W) -> Result<()> {
        self.check_writable()?;
        for (qid, rows) in &self.queries {
            for row in rows {
                writeln!(out, "{} Q0 {} {} {:.6} {}", qid, row.docno, row.rank, row.score, self.name)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_trec_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Rows are grouped by query and re-sorted by rank. The run name is
    /// taken from the first line's tag.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut run = Run::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let lineno = i + 1;
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() != 6 {
                return Err(Error::Parse { line: lineno, message: format!("expected 6 columns, found {}", cols.len()) });
            }
            let rank: u32 = cols[3]
                .parse()
                .map_err(|_| Error::Parse { line: lineno, message: format!("bad rank {:?}", cols[3]) })?;
            let score: f64 = cols[4]
                .parse()
                .map_err(|_| Error::Parse { line: lineno, message: format!("bad score {:?}", cols[4]) })?;
            if run.name.is_empty() {
                run.name = cols[5].to_string();
            }
            run.queries
                .entry(cols[0].to_string())
                .or_default()
                .push(RunRow { docno: cols[2].to_string(), rank, score });
        }
        for rows in run.queries.values_mut() {
            rows.sort_by_key(|r| r.rank);
        }
        Ok(run)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::read(text.as_bytes())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.check_writable()?;
        self.write(BufWriter::new(File::create(path)?))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }
}

fn check_field(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(Error::Config(format!("{what} {value:?} cannot be written to a run file")));
    }
    Ok(())
}
