use super::{RankingModel, Scores};
use crate::index::InvertedIndex;

/// Raw tf times `ln(N / df)`; zero when `df` is zero.
pub fn tfidf_weight(tf: u32, n_docs: u32, df: u32) -> f64 {
    if df == 0 {
        return 0.0;
    }
    tf as f64 * (n_docs as f64 / df as f64).ln()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TfIdf;

impl RankingModel for TfIdf {
    fn name(&self) -> &'static str {
        "TF_IDF"
    }

    fn accumulate(&self, index: &InvertedIndex, terms: &[(&str, u32)]) -> Scores {
        let mut scores = Scores::new();
        let n = index.num_docs();
        for &(term, qtf) in terms {
            let postings = index.postings(term);
            let df = postings.len() as u32;
            for p in postings {
                *scores.entry(p.doc_id).or_insert(0.0) += qtf as f64 * tfidf_weight(p.tf, n, df);
            }
        }
        scores
    }
}
