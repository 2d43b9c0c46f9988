//! Indexing, ranking and evaluation for TREC-style retrieval experiments.
//!
//! Documents go through an [`Analyzer`] into an [`InvertedIndex`] built by
//! [`IndexBuilder`]; a [`Ranker`] scores analyzed queries against it with
//! BM25, TF-IDF or a Dirichlet language model; the resulting [`Run`] is
//! scored against [`Qrels`] by the [`Evaluator`].

pub mod analyzer;
pub mod builder;
pub mod compare;
pub mod error;
pub mod eval;
pub mod index;
pub mod persist;
pub mod qrels;
pub mod query;
pub mod ranking;
pub mod run;
pub mod trec;

pub use analyzer::{Analyzer, AnalyzerConfig, StemmerKind, StopwordList};
pub use builder::{BuildConfig, BuildOutcome, IndexBuilder, IngestPolicy, RawDocument};
pub use compare::ComparisonTable;
pub use error::{Error, IngestError, Result};
pub use eval::{evaluate_runs, EvaluationReport, Evaluator, IdAlignment, Metric};
pub use index::{DocId, InvertedIndex, Posting, TermId};
pub use qrels::{Qrel, Qrels};
pub use query::{AnalyzedQuery, Query};
pub use ranking::{rank_all, ModelConfig, RankedResult, Ranker, RankingConfig, RankingModel, ScoredDoc};
pub use run::{Run, RunRow};
