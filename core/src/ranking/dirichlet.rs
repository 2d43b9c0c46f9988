use super::{RankingModel, Scores};
use crate::index::{DocId, InvertedIndex};

/// `ln((tf + mu * p_c) / (doc_len + mu))`
pub fn dirichlet_log_prob(tf: u32, doc_len: u32, p_collection: f64, mu: f64) -> f64 {
    ((tf as f64 + mu * p_collection) / (doc_len as f64 + mu)).ln()
}

/// Query likelihood with Dirichlet smoothing. Every query term with a nonzero
/// collection frequency contributes to every candidate document, including
/// documents that do not contain it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirichletLm {
    pub mu: f64,
}

impl Default for DirichletLm {
    fn default() -> Self {
        Self { mu: 2000.0 }
    }
}

impl RankingModel for DirichletLm {
    fn name(&self) -> &'static str {
        "DirichletLM"
    }

    fn accumulate(&self, index: &InvertedIndex, terms: &[(&str, u32)]) -> Scores {
        let total = index.total_terms();
        let known: Vec<(&str, u32, f64)> = terms
            .iter()
            .filter_map(|&(term, qtf)| {
                let cf = index.collection_freq(term);
                (cf > 0 && total > 0).then(|| (term, qtf, cf as f64 / total as f64))
            })
            .collect();

        let mut candidates: Vec<DocId> = known
            .iter()
            .flat_map(|&(term, _, _)| index.postings(term).iter().map(|p| p.doc_id))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut scores = Scores::with_capacity(candidates.len());
        for &doc_id in &candidates {
            let dl = index.doc_length(doc_id).unwrap_or(0);
            let mut score = 0.0;
            for &(term, qtf, p_c) in &known {
                let postings = index.postings(term);
                let tf = postings
                    .binary_search_by_key(&doc_id, |p| p.doc_id)
                    .map_or(0, |i| postings[i].tf);
                score += qtf as f64 * dirichlet_log_prob(tf, dl, p_c, self.mu);
            }
            scores.insert(doc_id, score);
        }
        scores
    }
}
