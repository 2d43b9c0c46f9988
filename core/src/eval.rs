//! Retrieval effectiveness metrics computed from a [`Run`] and [`Qrels`],
//! following trec_eval's definitions and metric names.

use crate::error::{Error, Result};
use crate::qrels::Qrels;
use crate::run::{Run, RunRow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Floor applied to average precision before taking logs for `gm_map`.
const GM_MAP_FLOOR: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    Map,
    GmMap,
    Rprec,
    Bpref,
    RecipRank,
    /// `P_k`
    Precision(usize),
    /// `recall_k`
    Recall(usize),
    NumRet,
    NumRel,
    NumRelRet,
}

impl Metric {
    /// Metrics reported when none are requested.
    pub fn standard() -> Vec<Metric> {
        vec![
            Metric::Map,
            Metric::Rprec,
            Metric::Precision(10),
            Metric::Precision(20),
            Metric::Precision(100),
            Metric::Recall(1000),
            Metric::Bpref,
            Metric::RecipRank,
        ]
    }

    fn is_count(&self) -> bool {
        matches!(self, Metric::NumRet | Metric::NumRel | Metric::NumRelRet)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Map => f.write_str("map"),
            Metric::GmMap => f.write_str("gm_map"),
            Metric::Rprec => f.write_str("Rprec"),
            Metric::Bpref => f.write_str("bpref"),
            Metric::RecipRank => f.write_str("recip_rank"),
            Metric::Precision(k) => write!(f, "P_{k}"),
            Metric::Recall(k) => write!(f, "recall_{k}"),
            Metric::NumRet => f.write_str("num_ret"),
            Metric::NumRel => f.write_str("num_rel"),
            Metric::NumRelRet => f.write_str("num_rel_ret"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let cutoff = |rest: &str| -> Result<usize> {
            match rest.parse::<usize>() {
                Ok(k) if k > 0 => Ok(k),
                _ => Err(Error::Config(format!("bad cutoff in metric {s:?}"))),
            }
        };
        match s.trim() {
            "map" => Ok(Metric::Map),
            "gm_map" => Ok(Metric::GmMap),
            "Rprec" | "rprec" => Ok(Metric::Rprec),
            "bpref" => Ok(Metric::Bpref),
            "recip_rank" => Ok(Metric::RecipRank),
            "num_ret" => Ok(Metric::NumRet),
            "num_rel" => Ok(Metric::NumRel),
            "num_rel_ret" => Ok(Metric::NumRelRet),
            other => {
                if let Some(rest) = other.strip_prefix("P_").or_else(|| other.strip_prefix("P@")) {
                    Ok(Metric::Precision(cutoff(rest)?))
                } else if let Some(rest) = other.strip_prefix("recall_").or_else(|| other.strip_prefix("recall@")) {
                    Ok(Metric::Recall(cutoff(rest)?))
                } else {
                    Err(Error::Config(format!("unknown metric {other:?}")))
                }
            }
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Metric> for String {
    fn from(m: Metric) -> Self {
        m.to_string()
    }
}

/// Run rows whose query id has no judgments at all. They are dropped before
/// evaluation and reported here instead of silently vanishing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdAlignment {
    pub dropped_rows: usize,
    pub unmatched_query_ids: Vec<String>,
}

impl IdAlignment {
    pub fn between(run: &Run, qrels: &Qrels) -> Self {
        let mut alignment = IdAlignment::default();
        for (qid, rows) in &run.queries {
            if !qrels.contains_query(qid) {
                alignment.dropped_rows += rows.len();
                alignment.unmatched_query_ids.push(qid.clone());
            }
        }
        alignment
    }

    pub fn is_clean(&self) -> bool {
        self.unmatched_query_ids.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub run: String,
    pub per_query: BTreeMap<String, BTreeMap<Metric, f64>>,
    pub aggregate: BTreeMap<Metric, f64>,
    pub alignment: IdAlignment,
}

impl EvaluationReport {
    pub fn empty(run: impl Into<String>, alignment: IdAlignment) -> Self {
        Self { run: run.into(), alignment, ..Self::default() }
    }

    pub fn num_queries(&self) -> usize {
        self.per_query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_query.is_empty()
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.aggregate.get(&metric).copied()
    }

    pub fn query(&self, query_id: &str, metric: Metric) -> Option<f64> {
        self.per_query.get(query_id).and_then(|m| m.get(&metric)).copied()
    }
}

/// trec_eval layout: `metric<TAB>query<TAB>value`, aggregates under `all`.
impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (qid, values) in &self.per_query {
            for (metric, value) in values {
                writeln!(f, "{:<15}\t{}\t{:.4}", metric.to_string(), qid, value)?;
            }
        }
        writeln!(f, "{:<15}\tall\t{}", "num_q", self.per_query.len())?;
        for (metric, value) in &self.aggregate {
            writeln!(f, "{:<15}\tall\t{:.4}", metric.to_string(), value)?;
        }
        Ok(())
    }
}

/// Read the `all` lines of a report produced by the `Display` impl.
pub fn parse_aggregates(text: &str) -> Result<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    for (i, line) in text.lines().enumerate() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != 3 || cols[1] != "all" {
            continue;
        }
        let value: f64 = cols[2]
            .parse()
            .map_err(|_| Error::Parse { line: i + 1, message: format!("bad value {:?}", cols[2]) })?;
        out.insert(cols[0].to_string(), value);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    metrics: Vec<Metric>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self { metrics: Metric::standard() }
    }
}

impl Evaluator {
    pub fn new<I: IntoIterator<Item = Metric>>(metrics: I) -> Result<Self> {
        let mut metrics: Vec<Metric> = metrics.into_iter().collect();
        metrics.sort();
        metrics.dedup();
        if metrics.is_empty() {
            return Err(Error::Config("no metrics requested".into()));
        }
        if metrics.iter().any(|m| matches!(m, Metric::Precision(0) | Metric::Recall(0))) {
            return Err(Error::Config("metric cutoffs must be positive".into()));
        }
        Ok(Self { metrics })
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Evaluate the queries present in both `run` and `qrels`, optionally
    /// restricted to `query_ids`.
    pub fn evaluate(&self, run: &Run, qrels: &Qrels, query_ids: Option<&[String]>) -> Result<EvaluationReport> {
        let alignment = IdAlignment::between(run, qrels);
        if !alignment.is_clean() {
            tracing::warn!(
                run = %run.name,
                dropped_rows = alignment.dropped_rows,
                unmatched = ?alignment.unmatched_query_ids,
                "run query ids without judgments were dropped"
            );
        }

        let wanted: Option<HashSet<&str>> = query_ids.map(|ids| ids.iter().map(String::as_str).collect());
        let evaluated: Vec<(&str, &HashMap<String, i32>)> = run
            .queries
            .keys()
            .map(String::as_str)
            .filter(|qid| wanted.as_ref().map_or(true, |w| w.contains(qid)))
            .filter_map(|qid| qrels.judgments(qid).map(|j| (qid, j)))
            .collect();
        if evaluated.is_empty() {
            return Err(Error::NoOverlap { run: run.name.clone() });
        }

        let per_query: BTreeMap<String, BTreeMap<Metric, f64>> = evaluated
            .par_iter()
            .map(|&(qid, judgments)| (qid.to_string(), self.evaluate_query(qid, run.rows(qid), judgments)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let aggregate = self.aggregate(&per_query);
        tracing::debug!(run = %run.name, queries = per_query.len(), "evaluation complete");
        Ok(EvaluationReport { run: run.name.clone(), per_query, aggregate, alignment })
    }

    fn evaluate_query(&self, qid: &str, rows: &[RunRow], judgments: &HashMap<String, i32>) -> BTreeMap<Metric, f64> {
        let stats = QueryStats::new(rows, judgments);
        if stats.num_rel == 0 {
            tracing::warn!(query_id = qid, "query has no relevant documents; recall-based metrics are 0");
        }
        self.metrics.iter().map(|&m| (m, stats.value(m))).collect()
    }

    fn aggregate(&self, per_query: &BTreeMap<String, BTreeMap<Metric, f64>>) -> BTreeMap<Metric, f64> {
        let n = per_query.len() as f64;
        let mut out = BTreeMap::new();
        for &metric in &self.metrics {
            let values = per_query.values().filter_map(|m| m.get(&metric).copied());
            let value = match metric {
                m if m.is_count() => values.sum::<f64>(),
                Metric::GmMap => (values.map(|ap| ap.max(GM_MAP_FLOOR).ln()).sum::<f64>() / n).exp(),
                _ => values.sum::<f64>() / n,
            };
            out.insert(metric, value);
        }
        out
    }
}

/// Relevance of one query's ranked list, after dropping repeated docnos.
struct QueryStats {
    /// Per retrieved document: relevant, judged nonrelevant.
    ranked: Vec<(bool, bool)>,
    num_rel: usize,
    num_nonrel: usize,
}

impl QueryStats {
    fn new(rows: &[RunRow], judgments: &HashMap<String, i32>) -> Self {
        let mut seen: HashSet<&str> = HashSet::with_capacity(rows.len());
        let ranked = rows
            .iter()
            .filter(|row| seen.insert(row.docno.as_str()))
            .map(|row| match judgments.get(&row.docno) {
                Some(&label) => (label > 0, label == 0),
                None => (false, false),
            })
            .collect();
        let num_rel = judgments.values().filter(|&&l| l > 0).count();
        // negative labels mark documents outside the pool
        let num_nonrel = judgments.values().filter(|&&l| l == 0).count();
        Self { ranked, num_rel, num_nonrel }
    }

    fn relevant_in_top(&self, k: usize) -> usize {
        self.ranked.iter().take(k).filter(|(rel, _)| *rel).count()
    }

    fn value(&self, metric: Metric) -> f64 {
        let r = self.num_rel;
        match metric {
            Metric::Map | Metric::GmMap => self.average_precision(),
            Metric::Rprec => {
                if r == 0 {
                    0.0
                } else {
                    self.relevant_in_top(r) as f64 / r as f64
                }
            }
            Metric::Bpref => self.bpref(),
            Metric::RecipRank => self
                .ranked
                .iter()
                .position(|(rel, _)| *rel)
                .map_or(0.0, |i| 1.0 / (i + 1) as f64),
            Metric::Precision(k) => self.relevant_in_top(k) as f64 / k as f64,
            Metric::Recall(k) => {
                if r == 0 {
                    0.0
                } else {
                    self.relevant_in_top(k) as f64 / r as f64
                }
            }
            Metric::NumRet => self.ranked.len() as f64,
            Metric::NumRel => r as f64,
            Metric::NumRelRet => self.relevant_in_top(self.ranked.len()) as f64,
        }
    }

    fn average_precision(&self) -> f64 {
        if self.num_rel == 0 {
            return 0.0;
        }
        let mut found = 0usize;
        let mut sum = 0.0;
        for (i, (rel, _)) in self.ranked.iter().enumerate() {
            if *rel {
                found += 1;
                sum += found as f64 / (i + 1) as f64;
            }
        }
        sum / self.num_rel as f64
    }

    fn bpref(&self) -> f64 {
        let r = self.num_rel;
        if r == 0 {
            return 0.0;
        }
        let denom = r.min(self.num_nonrel) as f64;
        let mut nonrel_above = 0usize;
        let mut sum = 0.0;
        for &(rel, judged_nonrel) in &self.ranked {
            if rel {
                sum += if self.num_nonrel == 0 { 1.0 } else { 1.0 - nonrel_above.min(r) as f64 / denom };
            } else if judged_nonrel {
                nonrel_above += 1;
            }
        }
        sum / r as f64
    }
}

/// Evaluate several named runs against the same judgments. A run that shares
/// no query ids with the qrels gets an empty report instead of failing the
/// whole batch.
pub fn evaluate_runs(evaluator: &Evaluator, runs: &BTreeMap<String, Run>, qrels: &Qrels) -> BTreeMap<String, EvaluationReport> {
    let mut reports = BTreeMap::new();
    for (name, run) in runs {
        let report = match evaluator.evaluate(run, qrels, None) {
            Ok(mut report) => {
                report.run = name.clone();
                report
            }
            Err(error) => {
                tracing::warn!(run = %name, %error, "run not evaluated");
                EvaluationReport::empty(name.clone(), IdAlignment::between(run, qrels))
            }
        };
        reports.insert(name.clone(), report);
    }
    reports
}
