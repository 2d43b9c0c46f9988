//! Ranking models and the shared ranking step.
//!
//! A [`RankingModel`] only accumulates scores for the documents its query
//! terms match. [`Ranker`] owns everything the models have in common: the
//! analyzer check, the deterministic ordering and the `top_k` cut.

mod bm25;
mod dirichlet;
mod tfidf;

pub use bm25::{bm25_idf, bm25_tf, Bm25};
pub use dirichlet::{dirichlet_log_prob, DirichletLm};
pub use tfidf::{tfidf_weight, TfIdf};

use crate::error::{Error, Result};
use crate::index::{DocId, InvertedIndex};
use crate::query::AnalyzedQuery;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

pub type Scores = HashMap<DocId, f64>;

pub trait RankingModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score every document matched by at least one of `terms`. Each entry is
    /// a distinct term and its frequency in the query.
    fn accumulate(&self, index: &InvertedIndex, terms: &[(&str, u32)]) -> Scores;
}

fn default_k1() -> f64 {
    0.9
}
fn default_b() -> f64 {
    0.4
}
fn default_mu() -> f64 {
    2000.0
}
fn default_top_k() -> usize {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum ModelConfig {
    Bm25 {
        #[serde(default = "default_k1")]
        k1: f64,
        #[serde(default = "default_b")]
        b: f64,
    },
    Tfidf,
    Dirichlet {
        #[serde(default = "default_mu")]
        mu: f64,
    },
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Bm25 { k1: default_k1(), b: default_b() }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        match *self {
            ModelConfig::Bm25 { k1, b } => {
                if !(k1.is_finite() && k1 >= 0.0) {
                    return Err(Error::Config(format!("bm25 k1 must be a non-negative number, got {k1}")));
                }
                if !(0.0..=1.0).contains(&b) {
                    return Err(Error::Config(format!("bm25 b must lie in [0, 1], got {b}")));
                }
            }
            ModelConfig::Tfidf => {}
            ModelConfig::Dirichlet { mu } => {
                if !(mu.is_finite() && mu > 0.0) {
                    return Err(Error::Config(format!("dirichlet mu must be positive, got {mu}")));
                }
            }
        }
        Ok(())
    }

    pub fn model(&self) -> Result<Box<dyn RankingModel>> {
        self.validate()?;
        Ok(match *self {
            ModelConfig::Bm25 { k1, b } => Box::new(Bm25 { k1, b }),
            ModelConfig::Tfidf => Box::new(TfIdf),
            ModelConfig::Dirichlet { mu } => Box::new(DirichletLm { mu }),
        })
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelConfig::Bm25 { k1, b } => write!(f, "BM25(k1={k1}, b={b})"),
            ModelConfig::Tfidf => f.write_str("TF_IDF"),
            ModelConfig::Dirichlet { mu } => write!(f, "DirichletLM(mu={mu})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(flatten)]
    pub model: ModelConfig,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { model: ModelConfig::default(), top_k: default_top_k() }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be positive".into()));
        }
        self.model.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
    /// 1-based.
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub query_id: String,
    pub hits: Vec<ScoredDoc>,
}

pub struct Ranker {
    model: Box<dyn RankingModel>,
    top_k: usize,
}

impl Ranker {
    pub fn new(config: &RankingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { model: config.model.model()?, top_k: config.top_k })
    }

    pub fn with_model(model: Box<dyn RankingModel>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::Config("top_k must be positive".into()));
        }
        Ok(Self { model, top_k })
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn rank(&self, index: &InvertedIndex, query: &AnalyzedQuery) -> Result<RankedResult> {
        if query.fingerprint != index.fingerprint() {
            return Err(Error::ConfigMismatch {
                index: index.fingerprint().to_string(),
                query: query.fingerprint.clone(),
            });
        }
        let scores = self.model.accumulate(index, &query.weighted_terms());
        Ok(RankedResult { query_id: query.id.clone(), hits: order(scores, self.top_k) })
    }
}

impl fmt::Debug for Ranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ranker")
            .field("model", &self.model.name())
            .field("top_k", &self.top_k)
            .finish()
    }
}

fn by_score_then_doc(a: &(DocId, f64), b: &(DocId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Score descending, ties by ascending docId, truncated to `top_k`.
pub fn order(scores: Scores, top_k: usize) -> Vec<ScoredDoc> {
    let mut scored: Vec<(DocId, f64)> = scores.into_iter().collect();
    if top_k == 0 {
        return Vec::new();
    }
    if scored.len() > top_k {
        scored.select_nth_unstable_by(top_k - 1, by_score_then_doc);
        scored.truncate(top_k);
    }
    scored.sort_unstable_by(by_score_then_doc);
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (doc_id, score))| ScoredDoc { doc_id, score, rank: i as u32 + 1 })
        .collect()
}

#[derive(Debug)]
pub struct QueryFailure {
    pub query_id: String,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct BatchRanking {
    /// In the order the queries were given.
    pub results: Vec<RankedResult>,
    pub failures: Vec<QueryFailure>,
}

/// Rank every query in parallel against one shared index. A failing query is
/// recorded and the rest of the batch continues.
pub fn rank_all(ranker: &Ranker, index: &InvertedIndex, queries: &[AnalyzedQuery]) -> BatchRanking {
    let outcomes: Vec<Result<RankedResult>> = queries.par_iter().map(|q| ranker.rank(index, q)).collect();
    let mut batch = BatchRanking::default();
    for (query, outcome) in queries.iter().zip(outcomes) {
        match outcome {
            Ok(result) => batch.results.push(result),
            Err(error) => {
                tracing::warn!(query_id = %query.id, %error, "query failed");
                batch.failures.push(QueryFailure { query_id: query.id.clone(), error });
            }
        }
    }
    tracing::info!(
        model = ranker.model_name(),
        queries = queries.len(),
        failed = batch.failures.len(),
        "ranking complete"
    );
    batch
}
