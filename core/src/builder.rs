use crate::analyzer::{Analyzer, AnalyzerConfig};
use crate::error::{Error, IngestError, Result};
use crate::index::{DocId, InvertedIndex, Posting, TermId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document as delivered by a collection adapter, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub docno: String,
    pub body: Vec<u8>,
}

impl RawDocument {
    pub fn new(docno: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { docno: docno.into(), body: body.into() }
    }
}

/// What to do with a document that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPolicy {
    #[default]
    FailFast,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Documents per partial index.
    pub batch_size: usize,
    /// Worker threads; 0 uses the global rayon pool.
    pub threads: usize,
    pub ingest_policy: IngestPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { batch_size: 1024, threads: 0, ingest_policy: IngestPolicy::FailFast }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub index: InvertedIndex,
    /// Documents dropped under [`IngestPolicy::Skip`].
    pub skipped: Vec<IngestError>,
}

/// Postings for a contiguous docId range. Partials are merged in ascending
/// range order, which keeps every postings list sorted.
#[derive(Debug)]
struct PartialIndex {
    base: DocId,
    dictionary: HashMap<String, TermId>,
    terms: Vec<String>,
    postings: Vec<Vec<Posting>>,
    cf: Vec<u64>,
    doc_lengths: Vec<u32>,
    total_terms: u64,
}

impl PartialIndex {
    fn new(base: DocId) -> Self {
        Self {
            base,
            dictionary: HashMap::new(),
            terms: Vec::new(),
            postings: Vec::new(),
            cf: Vec::new(),
            doc_lengths: Vec::new(),
            total_terms: 0,
        }
    }

    fn next_doc_id(&self) -> DocId {
        self.base + self.doc_lengths.len() as DocId
    }

    fn intern(&mut self, term: &str) -> TermId {
        if let Some(&tid) = self.dictionary.get(term) {
            return tid;
        }
        let tid = self.terms.len() as TermId;
        self.dictionary.insert(term.to_string(), tid);
        self.terms.push(term.to_string());
        self.postings.push(Vec::new());
        self.cf.push(0);
        tid
    }

    fn add_document(&mut self, tokens: &[String]) {
        let doc_id = self.next_doc_id();
        // first-occurrence order keeps term ids independent of hashing
        let mut order: Vec<TermId> = Vec::new();
        let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
        for token in tokens {
            let tid = self.intern(token);
            let count = tf_counts.entry(tid).or_insert(0);
            if *count == 0 {
                order.push(tid);
            }
            *count += 1;
        }
        for tid in order {
            let tf = tf_counts[&tid];
            self.postings[tid as usize].push(Posting { doc_id, tf });
            self.cf[tid as usize] += tf as u64;
        }
        self.doc_lengths.push(tokens.len() as u32);
        self.total_terms += tokens.len() as u64;
    }

    fn absorb(&mut self, other: PartialIndex) -> Result<()> {
        if other.base != self.next_doc_id() {
            return Err(Error::Corruption(format!(
                "partial index starting at doc {} merged after doc {}",
                other.base,
                self.next_doc_id()
            )));
        }
        for ((term, plist), cf) in other.terms.into_iter().zip(other.postings).zip(other.cf) {
            let tid = self.intern(&term) as usize;
            self.postings[tid].extend(plist);
            self.cf[tid] += cf;
        }
        self.doc_lengths.extend(other.doc_lengths);
        self.total_terms += other.total_terms;
        Ok(())
    }

    fn finish(self, analyzer: AnalyzerConfig, docnos: Vec<String>) -> Result<InvertedIndex> {
        if self.doc_lengths.is_empty() {
            return Err(Error::EmptyCollection);
        }
        let df = self.postings.iter().map(|p| p.len() as u32).collect();
        let fingerprint = analyzer.fingerprint();
        Ok(InvertedIndex {
            analyzer,
            fingerprint,
            dictionary: self.dictionary,
            terms: self.terms,
            postings: self.postings,
            df,
            cf: self.cf,
            doc_lengths: self.doc_lengths,
            docnos,
            total_terms: self.total_terms,
        })
    }
}

pub struct IndexBuilder {
    analyzer: Analyzer,
    config: BuildConfig,
}

impl IndexBuilder {
    pub fn new(analyzer: AnalyzerConfig, config: BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { analyzer: Analyzer::new(analyzer), config })
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Documents are borrowed, so one loaded collection can feed several
    /// builders.
    pub fn build(&self, documents: &[RawDocument]) -> Result<BuildOutcome> {
        if self.config.threads == 0 {
            return self.build_in_pool(documents);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|e| Error::Config(format!("cannot start {} indexing threads: {e}", self.config.threads)))?;
        pool.install(|| self.build_in_pool(documents))
    }

    fn build_in_pool(&self, documents: &[RawDocument]) -> Result<BuildOutcome> {
        let received = documents.len();
        let decoded: Vec<std::result::Result<(&str, &str), IngestError>> = documents
            .par_iter()
            .enumerate()
            .map(|(position, doc)| decode(position, doc))
            .collect();

        let mut accepted: Vec<(&str, &str)> = Vec::with_capacity(decoded.len());
        let mut skipped = Vec::new();
        for item in decoded {
            match item {
                Ok(doc) => accepted.push(doc),
                Err(err) => match self.config.ingest_policy {
                    IngestPolicy::FailFast => return Err(err.into()),
                    IngestPolicy::Skip => {
                        tracing::warn!(docno = %err.docno, position = err.position, reason = %err.reason, "skipping document");
                        skipped.push(err);
                    }
                },
            }
        }
        if accepted.is_empty() {
            return Err(Error::EmptyCollection);
        }
        if accepted.len() > DocId::MAX as usize {
            return Err(Error::Config(format!("{} documents exceed the docId range", accepted.len())));
        }

        let batch_size = self.config.batch_size;
        let partials: Vec<PartialIndex> = accepted
            .par_chunks(batch_size)
            .enumerate()
            .map(|(batch, chunk)| {
                let mut partial = PartialIndex::new((batch * batch_size) as DocId);
                for (_, text) in chunk {
                    partial.add_document(&self.analyzer.analyze(text));
                }
                tracing::debug!(batch, docs = chunk.len(), terms = partial.terms.len(), "partial index built");
                partial
            })
            .collect();

        let batches = partials.len();
        let mut merged = PartialIndex::new(0);
        for partial in partials {
            merged.absorb(partial)?;
        }
        let docnos = accepted.iter().map(|(docno, _)| docno.to_string()).collect();
        let index = merged.finish(self.analyzer.config().clone(), docnos)?;
        tracing::info!(
            received,
            num_docs = index.num_docs(),
            num_terms = index.num_terms(),
            skipped = skipped.len(),
            batches,
            analyzer = %index.analyzer_config(),
            "index built"
        );
        Ok(BuildOutcome { index, skipped })
    }
}

fn decode(position: usize, doc: &RawDocument) -> std::result::Result<(&str, &str), IngestError> {
    let docno = doc.docno.trim();
    if docno.is_empty() {
        return Err(IngestError { docno: String::new(), position, reason: "missing DOCNO".into() });
    }
    match std::str::from_utf8(&doc.body) {
        Ok(text) => Ok((docno, text)),
        Err(e) => Err(IngestError {
            docno: docno.to_string(),
            position,
            reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
        }),
    }
}

/// Build with default [`BuildConfig`], failing on the first undecodable document.
pub fn build(documents: Vec<RawDocument>, analyzer: AnalyzerConfig) -> Result<InvertedIndex> {
    Ok(IndexBuilder::new(analyzer, BuildConfig::default())?.build(&documents)?.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{StemmerKind, StopwordList};

    fn docs(texts: &[&str]) -> Vec<RawDocument> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| RawDocument::new(format!("D{i}"), *t))
            .collect()
    }

    #[test]
    fn records_tf_lengths_and_collection_counts() {
        let index = build(docs(&["hello hello hello world", "hello rust"]), AnalyzerConfig::default()).unwrap();
        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.postings("hello"), &[Posting { doc_id: 0, tf: 3 }, Posting { doc_id: 1, tf: 1 }]);
        assert_eq!(index.doc_freq("hello"), 2);
        assert_eq!(index.collection_freq("hello"), 4);
        assert_eq!(index.doc_length(0), Some(4));
        assert_eq!(index.total_terms(), 6);
        assert!((index.average_doc_length() - 3.0).abs() < 1e-12);
        assert_eq!(index.docno(1), Some("D1"));
        index.validate().unwrap();
    }

    #[test]
    fn stopwords_shrink_document_length() {
        let config = AnalyzerConfig::new(StemmerKind::None, Some(StopwordList::new(["the", "on"])));
        let index = build(docs(&["the dog sat on the mat"]), config).unwrap();
        assert_eq!(index.doc_length(0), Some(3));
        assert!(index.postings("the").is_empty());
    }

    #[test]
    fn empty_collection_is_rejected() {
        assert!(matches!(build(Vec::new(), AnalyzerConfig::default()), Err(Error::EmptyCollection)));
    }

    #[test]
    fn fail_fast_on_invalid_utf8() {
        let mut input = docs(&["fine"]);
        input.push(RawDocument::new("BAD", vec![0x66, 0xff, 0x66]));
        match build(input, AnalyzerConfig::default()) {
            Err(Error::Ingest(err)) => {
                assert_eq!(err.docno, "BAD");
                assert_eq!(err.position, 1);
            }
            other => panic!("expected ingest error, got {other:?}"),
        }
    }

    #[test]
    fn skip_policy_does_not_consume_doc_ids() {
        let config = BuildConfig { ingest_policy: IngestPolicy::Skip, ..BuildConfig::default() };
        let builder = IndexBuilder::new(AnalyzerConfig::default(), config).unwrap();
        let input = vec![
            RawDocument::new("A", "alpha"),
            RawDocument::new("", "orphan"),
            RawDocument::new("B", "beta"),
        ];
        let outcome = builder.build(&input).unwrap();
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.index.num_docs(), 2);
        assert_eq!(outcome.index.docno(1), Some("B"));
        assert_eq!(outcome.index.postings("beta")[0].doc_id, 1);
    }

    #[test]
    fn batched_build_matches_single_batch() {
        let texts = ["a b c", "b c d", "c d e e", "a e", "f", "a a a b"];
        let single = IndexBuilder::new(AnalyzerConfig::default(), BuildConfig { batch_size: 100, ..BuildConfig::default() })
            .unwrap()
            .build(&docs(&texts))
            .unwrap()
            .index;
        for batch_size in 1..=4 {
            let config = BuildConfig { batch_size, threads: 2, ..BuildConfig::default() };
            let batched = IndexBuilder::new(AnalyzerConfig::default(), config).unwrap().build(&docs(&texts)).unwrap().index;
            assert_eq!(batched, single, "batch_size {batch_size}");
        }
    }

    #[test]
    fn one_collection_feeds_several_builders() {
        let collection = docs(&["the running dogs", "a dog runs", "cats ran"]);
        let plain = IndexBuilder::new(AnalyzerConfig::default(), BuildConfig::default()).unwrap();
        let stemmed = IndexBuilder::new(
            AnalyzerConfig::new(StemmerKind::Porter, Some(StopwordList::english())),
            BuildConfig::default(),
        )
        .unwrap();
        let a = plain.build(&collection).unwrap().index;
        let b = stemmed.build(&collection).unwrap().index;
        assert_eq!(a.doc_freq("dogs"), 1);
        assert_eq!(b.doc_freq("dog"), 2);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(collection.len(), 3);
        assert_eq!(b.docno(2), Some(collection[2].docno.as_str()));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let config = BuildConfig { batch_size: 0, ..BuildConfig::default() };
        assert!(matches!(IndexBuilder::new(AnalyzerConfig::default(), config), Err(Error::Config(_))));
    }
}
