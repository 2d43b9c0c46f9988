use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use trec_core::eval::parse_aggregates;
use trec_core::persist::{load_index, save_index, IndexPaths};
use trec_core::trec::read_topics;
use trec_core::{
    evaluate_runs, AnalyzerConfig, BuildConfig, ComparisonTable, EvaluationReport, Evaluator, IndexBuilder, IngestPolicy, Metric,
    ModelConfig, Qrels, RankingConfig, Run, StemmerKind, StopwordList,
};

mod align;
mod collection;
mod experiment;

use align::TitleFallback;
use collection::load_collection;
use experiment::{run_experiment, search, ExperimentConfig};

#[derive(Parser)]
#[command(name = "trec-bench")]
#[command(about = "Index a TREC collection, rank topics and evaluate runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a directory of SGML collection files
    Build {
        /// Collection file or directory
        #[arg(long)]
        collection: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Only read files whose name starts with this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// none | porter
        #[arg(long, default_value = "none")]
        stemmer: String,
        /// Remove the built-in English stopword list
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Remove stopwords read from this file (one per line)
        #[arg(long, conflicts_with = "stopwords")]
        stopword_file: Option<PathBuf>,
        #[arg(long, default_value_t = 1024)]
        batch_size: usize,
        /// Worker threads; 0 uses all cores
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Skip undecodable documents instead of aborting
        #[arg(long, default_value_t = false)]
        skip_bad: bool,
    },
    /// Rank a topic file against an index and write a TREC run
    Search {
        #[arg(long)]
        index: PathBuf,
        /// TREC topic file or qid<TAB>query lines
        #[arg(long)]
        topics: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Run tag written in the last column
        #[arg(long)]
        run_name: String,
        /// bm25 | tfidf | dirichlet
        #[arg(long, default_value = "bm25")]
        model: String,
        #[arg(long, default_value_t = 0.9)]
        k1: f64,
        #[arg(long, default_value_t = 0.4)]
        b: f64,
        #[arg(long, default_value_t = 2000.0)]
        mu: f64,
        #[arg(long, default_value_t = 1000)]
        hits: usize,
    },
    /// Score one or more runs against relevance judgments
    Evaluate {
        #[arg(long, required = true, num_args = 1..)]
        run: Vec<PathBuf>,
        #[arg(long)]
        qrels: PathBuf,
        /// Recover query ids of runs that used topic titles
        #[arg(long)]
        topics: Option<PathBuf>,
        /// Comma separated trec_eval names, e.g. map,P_10,bpref
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
        /// Directory for <run>_eval.txt reports; printed to stdout if absent
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Tabulate evaluation reports as CSV
    Compare {
        /// NAME=PATH of a saved evaluation report
        #[arg(long, required = true, num_args = 1..)]
        report: Vec<String>,
        /// Column order; defaults to the metrics of the first report
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a full experiment described by a JSON file
    Experiment {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { collection, output, prefix, stemmer, stopwords, stopword_file, batch_size, threads, skip_bad } => {
            let stemmer: StemmerKind = stemmer.parse()?;
            let stopwords = match (stopwords, stopword_file) {
                (_, Some(path)) => Some(StopwordList::from_text(
                    &fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?,
                )),
                (true, None) => Some(StopwordList::english()),
                (false, None) => None,
            };
            let ingest_policy = if skip_bad { IngestPolicy::Skip } else { IngestPolicy::FailFast };
            let config = BuildConfig { batch_size, threads, ingest_policy };
            build_index(&collection, prefix.as_deref(), &output, AnalyzerConfig::new(stemmer, stopwords), config)
        }
        Commands::Search { index, topics, output, run_name, model, k1, b, mu, hits } => {
            let model = match model.to_ascii_lowercase().as_str() {
                "bm25" => ModelConfig::Bm25 { k1, b },
                "tfidf" | "tf_idf" => ModelConfig::Tfidf,
                "dirichlet" | "lm" => ModelConfig::Dirichlet { mu },
                other => bail!("unknown model {other:?}"),
            };
            let ranking = RankingConfig { model, top_k: hits };
            let index = load_index(&IndexPaths::new(&index))?;
            let topics = read_topics(&topics).with_context(|| format!("reading topics {}", topics.display()))?;
            let run = search(&index, &topics, &ranking, &run_name)?;
            run.save(&output)?;
            tracing::info!(output = %output.display(), queries = run.num_queries(), rows = run.num_rows(), "run written");
            Ok(())
        }
        Commands::Evaluate { run, qrels, topics, metrics, output } => {
            evaluate(&run, &qrels, topics.as_deref(), &metrics, output.as_deref())
        }
        Commands::Compare { report, metrics, output } => compare(&report, metrics, output.as_deref()),
        Commands::Experiment { config } => {
            let config = ExperimentConfig::load(&config)?;
            let outcome = run_experiment(&config)?;
            tracing::info!(runs = outcome.runs.len(), evaluated = outcome.reports.len(), "experiment complete");
            print!("{}", outcome.table.to_csv());
            Ok(())
        }
    }
}

fn build_index(
    collection: &Path,
    prefix: Option<&str>,
    output: &Path,
    analyzer: AnalyzerConfig,
    config: BuildConfig,
) -> Result<()> {
    let documents = load_collection(collection, prefix)?;
    let outcome = IndexBuilder::new(analyzer, config)?.build(&documents)?;
    for skipped in &outcome.skipped {
        tracing::warn!(%skipped, "document skipped");
    }
    let meta = save_index(&IndexPaths::new(output), &outcome.index)?;
    tracing::info!(
        output = %output.display(),
        docs = meta.num_docs,
        terms = meta.num_terms,
        skipped = outcome.skipped.len(),
        "index written"
    );
    Ok(())
}

fn evaluate(
    run_paths: &[PathBuf],
    qrels: &Path,
    topics: Option<&Path>,
    metrics: &[String],
    output: Option<&Path>,
) -> Result<()> {
    let qrels = Qrels::load(qrels).with_context(|| format!("reading qrels {}", qrels.display()))?;
    let evaluator = if metrics.is_empty() {
        Evaluator::default()
    } else {
        Evaluator::new(metrics.iter().map(|m| m.parse::<Metric>()).collect::<trec_core::Result<Vec<_>>>()?)?
    };
    let fallback = topics.map(read_topics).transpose()?.map(|t| TitleFallback::from_topics(&t));

    let mut runs = BTreeMap::new();
    for path in run_paths {
        let mut run = Run::load(path).with_context(|| format!("reading run {}", path.display()))?;
        if run.name.is_empty() {
            run.name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        }
        if let Some(fallback) = &fallback {
            fallback.apply(&mut run, &qrels);
        }
        runs.insert(run.name.clone(), run);
    }

    let reports = evaluate_runs(&evaluator, &runs, &qrels);
    if reports.values().all(EvaluationReport::is_empty) {
        bail!("no run shares a query id with the qrels");
    }
    for (name, report) in &reports {
        match output {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                fs::write(dir.join(format!("{name}_eval.txt")), report.to_string())?;
            }
            None => print!("{report}"),
        }
    }
    Ok(())
}

fn compare(specs: &[String], metrics: Vec<String>, output: Option<&Path>) -> Result<()> {
    let mut table = ComparisonTable::new(metrics);
    for entry in specs {
        let (name, path) = entry.split_once('=').with_context(|| format!("expected NAME=PATH, got {entry:?}"))?;
        let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        let aggregates = parse_aggregates(&text)?;
        if table.metrics.is_empty() {
            table.metrics = aggregates.keys().cloned().collect();
        }
        table.insert(name, aggregates);
    }
    let csv = table.to_csv();
    match output {
        Some(path) => fs::write(path, csv)?,
        None => print!("{csv}"),
    }
    Ok(())
}
