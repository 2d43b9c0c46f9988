use crate::analyzer::AnalyzerConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Occurrences of the term in this document.
    pub tf: u32,
}

/// Immutable term → postings mapping with the collection statistics the
/// ranking models need. Produced by [`crate::builder::IndexBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub(crate) analyzer: AnalyzerConfig,
    pub(crate) fingerprint: String,
    pub(crate) dictionary: HashMap<String, TermId>,
    pub(crate) terms: Vec<String>,
    pub(crate) postings: Vec<Vec<Posting>>, // indexed by TermId, sorted by doc_id
    pub(crate) df: Vec<u32>,
    pub(crate) cf: Vec<u64>,
    pub(crate) doc_lengths: Vec<u32>,
    pub(crate) docnos: Vec<String>,
    pub(crate) total_terms: u64,
}

impl InvertedIndex {
    pub fn analyzer_config(&self) -> &AnalyzerConfig {
        &self.analyzer
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn num_docs(&self) -> u32 {
        self.doc_lengths.len() as u32
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Total analyzed tokens in the collection.
    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    pub fn average_doc_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        self.total_terms as f64 / self.doc_lengths.len() as f64
    }

    pub fn doc_length(&self, doc_id: DocId) -> Option<u32> {
        self.doc_lengths.get(doc_id as usize).copied()
    }

    pub fn docno(&self, doc_id: DocId) -> Option<&str> {
        self.docnos.get(doc_id as usize).map(String::as_str)
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn term(&self, term_id: TermId) -> Option<&str> {
        self.terms.get(term_id as usize).map(String::as_str)
    }

    /// Postings for `term`; empty when the term is not in the vocabulary.
    pub fn postings(&self, term: &str) -> &[Posting] {
        match self.term_id(term) {
            Some(tid) => &self.postings[tid as usize],
            None => &[],
        }
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.term_id(term).map_or(0, |tid| self.df[tid as usize])
    }

    pub fn collection_freq(&self, term: &str) -> u64 {
        self.term_id(term).map_or(0, |tid| self.cf[tid as usize])
    }

    /// Vocabulary in term-id order.
    pub fn terms(&self) -> impl Iterator<Item = (TermId, &str)> {
        self.terms.iter().enumerate().map(|(i, t)| (i as TermId, t.as_str()))
    }

    /// Check the structural invariants: postings sorted by ascending docId with
    /// no duplicates, `df == |postings|`, consistent collection counts.
    pub fn validate(&self) -> Result<()> {
        let n = self.terms.len();
        if self.postings.len() != n || self.df.len() != n || self.cf.len() != n || self.dictionary.len() != n {
            return Err(Error::Corruption(format!(
                "vocabulary tables disagree: terms={} postings={} df={} cf={} dictionary={}",
                n,
                self.postings.len(),
                self.df.len(),
                self.cf.len(),
                self.dictionary.len()
            )));
        }
        if self.docnos.len() != self.doc_lengths.len() {
            return Err(Error::Corruption(format!(
                "{} docnos for {} documents",
                self.docnos.len(),
                self.doc_lengths.len()
            )));
        }
        let num_docs = self.num_docs();
        let mut occurrences: u64 = 0;
        for (tid, term) in self.terms.iter().enumerate() {
            if self.dictionary.get(term) != Some(&(tid as TermId)) {
                return Err(Error::Corruption(format!("term {term:?} not interned as {tid}")));
            }
            let plist = &self.postings[tid];
            if plist.windows(2).any(|w| w[0].doc_id >= w[1].doc_id) {
                return Err(Error::Corruption(format!("postings for {term:?} are not strictly ascending")));
            }
            if plist.last().map_or(false, |p| p.doc_id >= num_docs) {
                return Err(Error::Corruption(format!("postings for {term:?} reference unknown documents")));
            }
            if self.df[tid] as usize != plist.len() {
                return Err(Error::Corruption(format!(
                    "df({term:?}) = {} but {} postings",
                    self.df[tid],
                    plist.len()
                )));
            }
            let cf: u64 = plist.iter().map(|p| p.tf as u64).sum();
            if cf != self.cf[tid] {
                return Err(Error::Corruption(format!("cf({term:?}) = {} but postings sum to {cf}", self.cf[tid])));
            }
            occurrences += cf;
        }
        let lengths: u64 = self.doc_lengths.iter().map(|&l| l as u64).sum();
        if occurrences != self.total_terms || lengths != self.total_terms {
            return Err(Error::Corruption(format!(
                "total terms {} disagrees with postings ({occurrences}) or lengths ({lengths})",
                self.total_terms
            )));
        }
        if self.fingerprint != self.analyzer.fingerprint() {
            return Err(Error::Corruption("analyzer fingerprint does not match its configuration".into()));
        }
        Ok(())
    }
}
