use trec_core::builder::build;
use trec_core::{
    AnalyzedQuery, Analyzer, AnalyzerConfig, Error, Evaluator, Metric, ModelConfig, Qrel, Qrels, Query,
    RawDocument, Ranker, RankingConfig, Run, RunRow, StemmerKind, StopwordList,
};

fn three_docs() -> Vec<RawDocument> {
    vec![
        RawDocument::new("D0", "the cat sat"),
        RawDocument::new("D1", "the dog sat on the mat"),
        RawDocument::new("D2", "cats and dogs"),
    ]
}

fn stop_config() -> AnalyzerConfig {
    AnalyzerConfig::new(StemmerKind::None, Some(StopwordList::new(["the", "on", "and"])))
}

#[test]
fn exact_term_matching_without_stemming() {
    let config = stop_config();
    let index = build(three_docs(), config.clone()).unwrap();
    let query = AnalyzedQuery::new(&Query::new("q", "cat dog"), &Analyzer::new(config));

    for model in [ModelConfig::default(), ModelConfig::Tfidf, ModelConfig::Dirichlet { mu: 500.0 }] {
        let ranker = Ranker::new(&RankingConfig { model, top_k: 1000 }).unwrap();
        let result = ranker.rank(&index, &query).unwrap();
        let docs: Vec<u32> = result.hits.iter().map(|h| h.doc_id).collect();
        // "cat" only in D0, "dog" only in D1; "cats"/"dogs" in D2 never match
        assert_eq!(docs.len(), 2, "{model}");
        assert!(docs.contains(&0) && docs.contains(&1), "{model}");
        assert!(!docs.contains(&2), "{model}");
    }
}

#[test]
fn stemming_lets_plural_forms_match() {
    let config = AnalyzerConfig::new(StemmerKind::Porter, Some(StopwordList::new(["the", "on", "and"])));
    let index = build(three_docs(), config.clone()).unwrap();
    let query = AnalyzedQuery::new(&Query::new("q", "cat dog"), &Analyzer::new(config));
    let result = Ranker::new(&RankingConfig::default()).unwrap().rank(&index, &query).unwrap();
    assert_eq!(result.hits.len(), 3);
    // D2 matches both terms
    assert_eq!(result.hits[0].doc_id, 2);
}

#[test]
fn query_from_other_analyzer_is_rejected() {
    let index = build(three_docs(), stop_config()).unwrap();
    let query = AnalyzedQuery::new(&Query::new("q", "cat"), &Analyzer::new(AnalyzerConfig::default()));
    let ranker = Ranker::new(&RankingConfig::default()).unwrap();
    assert!(matches!(ranker.rank(&index, &query), Err(Error::ConfigMismatch { .. })));
    // the index is untouched and still answers matching queries
    let ok = AnalyzedQuery::new(&Query::new("q", "cat"), &Analyzer::new(stop_config()));
    assert_eq!(ranker.rank(&index, &ok).unwrap().hits.len(), 1);
}

#[test]
fn qrels_scenario() {
    let qrels: Qrels = [Qrel::new("q1", "d1", 1), Qrel::new("q1", "d2", 0), Qrel::new("q1", "d3", 1)]
        .into_iter()
        .collect();
    let mut run = Run::new("scenario");
    run.queries.insert(
        "q1".into(),
        ["d2", "d1", "d3"]
            .iter()
            .enumerate()
            .map(|(i, d)| RunRow { docno: d.to_string(), rank: i as u32 + 1, score: 3.0 - i as f64 })
            .collect(),
    );
    let evaluator = Evaluator::new([
        Metric::Precision(3),
        Metric::Precision(10),
        Metric::Rprec,
        Metric::RecipRank,
        Metric::Recall(1000),
        Metric::Map,
        Metric::Bpref,
    ])
    .unwrap();
    let report = evaluator.evaluate(&run, &qrels, None).unwrap();
    let get = |m| report.query("q1", m).unwrap();
    assert!((get(Metric::Precision(3)) - 2.0 / 3.0).abs() < 1e-12);
    assert!((get(Metric::Precision(10)) - 0.2).abs() < 1e-12);
    assert_eq!(get(Metric::Rprec), 0.5);
    assert_eq!(get(Metric::RecipRank), 0.5);
    assert_eq!(get(Metric::Recall(1000)), 1.0);
    // AP = (1/2 + 2/3) / 2
    assert!((get(Metric::Map) - 7.0 / 12.0).abs() < 1e-12);
    // bpref: R=2, N=1, one judged nonrelevant above both hits
    assert_eq!(get(Metric::Bpref), 0.0);
    assert_eq!(report.get(Metric::Rprec), Some(0.5));
}

#[test]
fn no_overlap_is_an_error_not_a_panic() {
    let qrels: Qrels = [Qrel::new("51", "d1", 1)].into_iter().collect();
    let run = Run::parse("Airbus_Subsidies Q0 d1 1 1.0 tag\n").unwrap();
    match Evaluator::default().evaluate(&run, &qrels, None) {
        Err(Error::NoOverlap { run }) => assert_eq!(run, "tag"),
        other => panic!("expected NoOverlap, got {other:?}"),
    }
}

#[test]
fn zero_relevant_query_scores_zero_recall() {
    let qrels: Qrels = [Qrel::new("q", "d1", 0)].into_iter().collect();
    let run = Run::parse("q Q0 d1 1 1.0 tag\n").unwrap();
    let report = Evaluator::new([Metric::Recall(1000), Metric::Map]).unwrap().evaluate(&run, &qrels, None).unwrap();
    assert_eq!(report.get(Metric::Recall(1000)), Some(0.0));
    assert_eq!(report.get(Metric::Map), Some(0.0));
}
