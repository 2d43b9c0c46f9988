use super::{RankingModel, Scores};
use crate::index::InvertedIndex;

/// Okapi BM25 IDF with +1 inside the log, so it never goes negative.
pub fn bm25_idf(n_docs: u32, df: u32) -> f64 {
    let n = n_docs as f64;
    let df = df.min(n_docs) as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Saturated, length-normalized term frequency.
pub fn bm25_tf(tf: u32, doc_len: u32, avg_doc_len: f64, k1: f64, b: f64) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f64;
    let rel_len = if avg_doc_len > 0.0 { doc_len as f64 / avg_doc_len } else { 1.0 };
    tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * rel_len))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25 {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25 {
    fn default() -> Self {
        Self { k1: 0.9, b: 0.4 }
    }
}

impl RankingModel for Bm25 {
    fn name(&self) -> &'static str {
        "BM25"
    }

    fn accumulate(&self, index: &InvertedIndex, terms: &[(&str, u32)]) -> Scores {
        let mut scores = Scores::new();
        let n = index.num_docs();
        let avgdl = index.average_doc_length();
        for &(term, qtf) in terms {
            let postings = index.postings(term);
            if postings.is_empty() {
                continue;
            }
            let idf = bm25_idf(n, postings.len() as u32);
            for p in postings {
                let dl = index.doc_length(p.doc_id).unwrap_or(0);
                let w = idf * bm25_tf(p.tf, dl, avgdl, self.k1, self.b);
                *scores.entry(p.doc_id).or_insert(0.0) += qtf as f64 * w;
            }
        }
        scores
    }
}
