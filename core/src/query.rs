use crate::analyzer::Analyzer;
use serde::{Deserialize, Serialize};

/// A topic as read from a topics file. The id is opaque; it is never parsed
/// as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
}

impl Query {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A query run through an [`Analyzer`]; remembers which configuration
/// produced its terms so it can only be scored against a matching index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedQuery {
    pub id: String,
    pub terms: Vec<String>,
    pub fingerprint: String,
}

impl AnalyzedQuery {
    pub fn new(query: &Query, analyzer: &Analyzer) -> Self {
        Self {
            id: query.id.clone(),
            terms: analyzer.analyze(&query.text),
            fingerprint: analyzer.fingerprint().to_string(),
        }
    }

    /// Distinct terms with their query frequency, in first-occurrence order.
    pub fn weighted_terms(&self) -> Vec<(&str, u32)> {
        let mut out: Vec<(&str, u32)> = Vec::new();
        for term in &self.terms {
            match out.iter_mut().find(|(t, _)| *t == term.as_str()) {
                Some((_, qtf)) => *qtf += 1,
                None => out.push((term.as_str(), 1)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerConfig;

    #[test]
    fn weighted_terms_keep_first_occurrence_order() {
        let analyzer = Analyzer::new(AnalyzerConfig::default());
        let q = AnalyzedQuery::new(&Query::new("51", "oil spill oil tanker"), &analyzer);
        assert_eq!(q.weighted_terms(), vec![("oil", 2), ("spill", 1), ("tanker", 1)]);
        assert_eq!(q.fingerprint, analyzer.fingerprint());
    }
}
