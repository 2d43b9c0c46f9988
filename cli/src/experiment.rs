//! A whole evaluation campaign described in one JSON file: which analyzer
//! configurations to index the collection under, which models to run on
//! which index, and which metrics to report.

use crate::align::TitleFallback;
use crate::collection::load_collection;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use trec_core::persist::{load_index, load_meta, save_index, IndexPaths};
use trec_core::trec::read_topics;
use trec_core::{
    evaluate_runs, rank_all, AnalyzedQuery, Analyzer, AnalyzerConfig, BuildConfig, ComparisonTable, EvaluationReport,
    Evaluator, IndexBuilder, InvertedIndex, Metric, Qrels, Query, Ranker, RankingConfig, RawDocument, Run, StemmerKind,
    StopwordList,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopwordSource {
    English,
    File(PathBuf),
}

impl StopwordSource {
    pub fn load(&self) -> Result<StopwordList> {
        match self {
            StopwordSource::English => Ok(StopwordList::english()),
            StopwordSource::File(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("reading stopwords {}", path.display()))?;
                Ok(StopwordList::from_text(&text))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexSpec {
    pub stemmer: StemmerKind,
    pub stopwords: Option<StopwordSource>,
}

impl IndexSpec {
    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        let stopwords = self.stopwords.as_ref().map(StopwordSource::load).transpose()?;
        Ok(AnalyzerConfig::new(self.stemmer, stopwords))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunSpec {
    pub name: String,
    pub index: String,
    #[serde(flatten)]
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentConfig {
    pub collection: PathBuf,
    #[serde(default)]
    pub file_prefix: Option<String>,
    pub topics: PathBuf,
    pub qrels: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub build: BuildConfig,
    pub indexes: BTreeMap<String, IndexSpec>,
    pub runs: Vec<RunSpec>,
    #[serde(default = "Metric::standard")]
    pub metrics: Vec<Metric>,
    /// Reuse an index already on disk when its analyzer matches.
    #[serde(default = "default_reuse")]
    pub reuse_indexes: bool,
}

fn default_reuse() -> bool {
    true
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: ExperimentConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.build.validate()?;
        if self.runs.is_empty() {
            bail!("experiment defines no runs");
        }
        let mut names = std::collections::HashSet::new();
        for run in &self.runs {
            if !self.indexes.contains_key(&run.index) {
                bail!("run {:?} refers to unknown index {:?}", run.name, run.index);
            }
            if !names.insert(run.name.as_str()) {
                bail!("run name {:?} is used twice", run.name);
            }
            if run.name.is_empty() || run.name.contains(char::is_whitespace) {
                bail!("run name {:?} must be a single non-empty word", run.name);
            }
            run.ranking.validate().with_context(|| format!("run {:?}", run.name))?;
        }
        Evaluator::new(self.metrics.iter().copied())?;
        Ok(())
    }

    fn index_dir(&self, name: &str) -> PathBuf {
        self.output_dir.join("indices").join(format!("index_{name}"))
    }
}

pub struct ExperimentOutcome {
    pub runs: BTreeMap<String, Run>,
    pub reports: BTreeMap<String, EvaluationReport>,
    pub table: ComparisonTable,
}

pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentOutcome> {
    let topics: Vec<Query> =
        read_topics(&config.topics).with_context(|| format!("reading topics {}", config.topics.display()))?;
    let qrels = Qrels::load(&config.qrels).with_context(|| format!("reading qrels {}", config.qrels.display()))?;
    tracing::info!(topics = topics.len(), judged_queries = qrels.num_queries(), "experiment inputs loaded");

    let indexes = prepare_indexes(config)?;

    let runs_dir = config.output_dir.join("search_results");
    fs::create_dir_all(&runs_dir)?;
    let mut runs = BTreeMap::new();
    for run_spec in &config.runs {
        let index = &indexes[&run_spec.index];
        let run = search(index, &topics, &run_spec.ranking, &run_spec.name)?;
        let path = runs_dir.join(format!("{}_results.txt", run_spec.name));
        run.save(&path).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(run = %run_spec.name, queries = run.num_queries(), rows = run.num_rows(), "run written");
        runs.insert(run_spec.name.clone(), run);
    }

    let fallback = TitleFallback::from_topics(&topics);
    for run in runs.values_mut() {
        fallback.apply(run, &qrels);
    }
    let evaluator = Evaluator::new(config.metrics.iter().copied())?;
    let reports = evaluate_runs(&evaluator, &runs, &qrels);

    let eval_dir = config.output_dir.join("eval_results");
    fs::create_dir_all(&eval_dir)?;
    for (name, report) in &reports {
        let path = eval_dir.join(format!("{name}_eval.txt"));
        fs::write(&path, report.to_string()).with_context(|| format!("writing {}", path.display()))?;
    }

    let metrics = config.metrics.iter().map(|m| m.to_string()).collect();
    let table = ComparisonTable::from_reports(metrics, &reports);
    let table_path = config.output_dir.join("eval_comparison.csv");
    fs::write(&table_path, table.to_csv()).with_context(|| format!("writing {}", table_path.display()))?;
    tracing::info!(path = %table_path.display(), "comparison table written");

    Ok(ExperimentOutcome { runs, reports, table })
}

fn prepare_indexes(config: &ExperimentConfig) -> Result<BTreeMap<String, InvertedIndex>> {
    let used: std::collections::BTreeSet<&str> = config.runs.iter().map(|r| r.index.as_str()).collect();
    let mut documents: Option<Vec<RawDocument>> = None;
    let mut out = BTreeMap::new();
    for (name, index_spec) in config.indexes.iter().filter(|(name, _)| used.contains(name.as_str())) {
        let analyzer = index_spec.analyzer_config()?;
        let paths = IndexPaths::new(config.index_dir(name));
        if config.reuse_indexes && paths.exists() {
            let meta = load_meta(&paths)?;
            if meta.fingerprint == analyzer.fingerprint() {
                out.insert(name.clone(), load_index(&paths)?);
                continue;
            }
            tracing::warn!(index = %name, "stored index was built with another analyzer; rebuilding");
        }
        if documents.is_none() {
            documents = Some(load_collection(&config.collection, config.file_prefix.as_deref())?);
        }
        let docs = documents.as_deref().unwrap_or_default();
        let outcome = IndexBuilder::new(analyzer, config.build.clone())?
            .build(docs)
            .with_context(|| format!("building index {name}"))?;
        save_index(&paths, &outcome.index)?;
        out.insert(name.clone(), outcome.index);
    }
    Ok(out)
}

/// Analyze the topics for `index` and rank them in parallel.
pub fn search(index: &InvertedIndex, topics: &[Query], ranking: &RankingConfig, run_name: &str) -> Result<Run> {
    let analyzer = Analyzer::new(index.analyzer_config().clone());
    let queries: Vec<AnalyzedQuery> = topics.iter().map(|q| AnalyzedQuery::new(q, &analyzer)).collect();
    let ranker = Ranker::new(ranking)?;
    tracing::info!(run = run_name, model = %ranking.model, top_k = ranking.top_k, "ranking topics");
    let batch = rank_all(&ranker, index, &queries);
    Ok(Run::from_ranked(run_name, index, &batch.results)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trec_core::ModelConfig;

    const COLLECTION: &str = "<DOC>\n<DOCNO> AP-1 </DOCNO>\n<TEXT>Oil spill off the Alaskan coast.</TEXT>\n</DOC>\n\
<DOC>\n<DOCNO> AP-2 </DOCNO>\n<TEXT>Airbus subsidies dispute in Europe.</TEXT>\n</DOC>\n\
<DOC>\n<DOCNO> AP-3 </DOCNO>\n<TEXT>Tanker spills oil; oil reaches the beaches.</TEXT>\n</DOC>\n";

    const TOPICS: &str = "<top>\n<num> Number: 051\n<title> Topic: Airbus Subsidies\n</top>\n\
<top>\n<num> Number: 052\n<title> Topic: Oil Spills\n</top>\n";

    const QRELS: &str = "51 0 AP-2 1\n51 0 AP-1 0\n52 0 AP-1 1\n52 0 AP-3 1\n52 0 AP-2 0\n";

    fn write_inputs(dir: &Path) -> String {
        fs::create_dir_all(dir.join("AP")).unwrap();
        fs::write(dir.join("AP/AP880212"), COLLECTION).unwrap();
        fs::write(dir.join("topics.txt"), TOPICS).unwrap();
        fs::write(dir.join("qrels.txt"), QRELS).unwrap();
        format!(
            r#"{{
                "collection": "{root}/AP",
                "file_prefix": "AP",
                "topics": "{root}/topics.txt",
                "qrels": "{root}/qrels.txt",
                "output_dir": "{root}/var",
                "build": {{ "batch_size": 2 }},
                "indexes": {{
                    "nostop_nostem": {{}},
                    "stop_porter": {{ "stemmer": "porter", "stopwords": "english" }}
                }},
                "runs": [
                    {{ "name": "BM25_nostop_nostem", "index": "nostop_nostem", "model": "bm25" }},
                    {{ "name": "BM25_stop_porter", "index": "stop_porter", "model": "bm25", "k1": 1.2, "b": 0.75 }},
                    {{ "name": "TFIDF_stop_porter", "index": "stop_porter", "model": "tfidf" }},
                    {{ "name": "Dirichlet_stop_porter_500", "index": "stop_porter", "model": "dirichlet", "mu": 500 }}
                ],
                "metrics": ["map", "P_10", "recip_rank"]
            }}"#,
            root = dir.display()
        )
    }

    #[test]
    fn parses_runs_with_flattened_model() {
        let dir = tempdir().unwrap();
        let config: ExperimentConfig = serde_json::from_str(&write_inputs(dir.path())).unwrap();
        config.validate().unwrap();
        assert_eq!(config.runs[1].ranking.model, ModelConfig::Bm25 { k1: 1.2, b: 0.75 });
        assert_eq!(config.runs[3].ranking.model, ModelConfig::Dirichlet { mu: 500.0 });
        assert_eq!(config.runs[0].ranking.top_k, 1000);
        assert_eq!(config.indexes["stop_porter"].stopwords, Some(StopwordSource::English));
        assert_eq!(config.build.batch_size, 2);
    }

    #[test]
    fn unknown_index_is_rejected() {
        let dir = tempdir().unwrap();
        let json = write_inputs(dir.path()).replace(r#""index": "stop_porter", "model": "tfidf""#, r#""index": "missing", "model": "tfidf""#);
        let config: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn end_to_end_experiment() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("experiment.json");
        fs::write(&config_path, write_inputs(dir.path())).unwrap();
        let config = ExperimentConfig::load(&config_path).unwrap();

        let outcome = run_experiment(&config).unwrap();
        assert_eq!(outcome.runs.len(), 4);
        // stemming maps "spills" onto "spill", so AP-3 is found for topic 52
        let stemmed = &outcome.runs["BM25_stop_porter"];
        assert!(stemmed.rows("52").iter().any(|r| r.docno == "AP-3"));
        let report = &outcome.reports["BM25_stop_porter"];
        assert_eq!(report.num_queries(), 2);
        assert_eq!(report.query("51", Metric::RecipRank), Some(1.0));

        let var = dir.path().join("var");
        assert!(var.join("search_results/TFIDF_stop_porter_results.txt").is_file());
        assert!(var.join("eval_results/Dirichlet_stop_porter_500_eval.txt").is_file());
        assert!(var.join("indices/index_stop_porter/meta.json").is_file());
        let csv = fs::read_to_string(var.join("eval_comparison.csv")).unwrap();
        assert!(csv.starts_with("Model,map,P_10,recip_rank\n"));
        assert_eq!(csv.lines().count(), 5);

        // second pass reuses the stored indexes and produces identical runs
        let again = run_experiment(&config).unwrap();
        assert_eq!(again.runs, outcome.runs);
    }
}
