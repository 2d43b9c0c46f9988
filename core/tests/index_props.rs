//! Property tests for the index and ranking invariants.

use proptest::prelude::*;
use trec_core::builder::{build, BuildConfig, IndexBuilder, RawDocument};
use trec_core::{AnalyzedQuery, Analyzer, AnalyzerConfig, ModelConfig, Query, Ranker, RankingConfig};

fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f]{1,3}").unwrap()
}

fn document_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(word_strategy(), 0..12).prop_map(|words| words.join(" "))
}

fn corpus_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(document_strategy(), 1..20)
}

fn raw(corpus: &[String]) -> Vec<RawDocument> {
    corpus
        .iter()
        .enumerate()
        .map(|(i, text)| RawDocument::new(format!("DOC-{i}"), text.as_str()))
        .collect()
}

fn model_strategy() -> impl Strategy<Value = ModelConfig> {
    prop_oneof![
        (0.0f64..3.0, 0.0f64..=1.0).prop_map(|(k1, b)| ModelConfig::Bm25 { k1, b }),
        Just(ModelConfig::Tfidf),
        (1.0f64..5000.0).prop_map(|mu| ModelConfig::Dirichlet { mu }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_postings_sorted_and_df_exact(corpus in corpus_strategy()) {
        let index = build(raw(&corpus), AnalyzerConfig::default()).unwrap();
        for (_, term) in index.terms() {
            let postings = index.postings(term);
            for w in postings.windows(2) {
                prop_assert!(w[0].doc_id < w[1].doc_id, "postings for {:?} out of order", term);
            }
            let mut ids: Vec<u32> = postings.iter().map(|p| p.doc_id).collect();
            ids.dedup();
            prop_assert_eq!(index.doc_freq(term) as usize, ids.len());
        }
        prop_assert!(index.validate().is_ok());
    }

    #[test]
    fn prop_lengths_match_analysis(corpus in corpus_strategy()) {
        let analyzer = Analyzer::new(AnalyzerConfig::default());
        let index = build(raw(&corpus), AnalyzerConfig::default()).unwrap();
        prop_assert_eq!(index.num_docs() as usize, corpus.len());
        for (i, text) in corpus.iter().enumerate() {
            prop_assert_eq!(index.doc_length(i as u32), Some(analyzer.analyze(text).len() as u32));
        }
    }

    #[test]
    fn prop_batching_does_not_change_the_index(corpus in corpus_strategy(), batch_size in 1usize..8) {
        let whole = build(raw(&corpus), AnalyzerConfig::default()).unwrap();
        let config = BuildConfig { batch_size, ..BuildConfig::default() };
        let batched = IndexBuilder::new(AnalyzerConfig::default(), config).unwrap().build(&raw(&corpus)).unwrap().index;
        prop_assert_eq!(batched, whole);
    }

    #[test]
    fn prop_ranking_monotone_and_deterministic(
        corpus in corpus_strategy(),
        query in prop::collection::vec(word_strategy(), 1..4),
        model in model_strategy(),
        top_k in 1usize..30,
    ) {
        let config = AnalyzerConfig::default();
        let index = build(raw(&corpus), config.clone()).unwrap();
        let q = AnalyzedQuery::new(&Query::new("q", query.join(" ")), &Analyzer::new(config));
        let ranker = Ranker::new(&RankingConfig { model, top_k }).unwrap();
        let first = ranker.rank(&index, &q).unwrap();
        let second = ranker.rank(&index, &q).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert!(first.hits.len() <= top_k);
        for (i, hit) in first.hits.iter().enumerate() {
            prop_assert_eq!(hit.rank as usize, i + 1);
        }
        for w in first.hits.windows(2) {
            prop_assert!(w[0].score >= w[1].score);
            if w[0].score == w[1].score {
                prop_assert!(w[0].doc_id < w[1].doc_id);
            }
        }
        // only documents containing a query term are returned
        for hit in &first.hits {
            prop_assert!(q.terms.iter().any(|t| index.postings(t).iter().any(|p| p.doc_id == hit.doc_id)));
        }
    }
}
