use crate::eval::EvaluationReport;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Aggregate metrics of several runs side by side, one row per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonTable {
    pub metrics: Vec<String>,
    pub rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ComparisonTable {
    pub fn new(metrics: Vec<String>) -> Self {
        Self { metrics, rows: BTreeMap::new() }
    }

    pub fn insert(&mut self, run: impl Into<String>, aggregates: BTreeMap<String, f64>) {
        self.rows.insert(run.into(), aggregates);
    }

    /// Uses the metric order of the first report when `metrics` is empty.
    pub fn from_reports<'a, I>(metrics: Vec<String>, reports: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a EvaluationReport)>,
    {
        let mut table = Self::new(metrics);
        for (name, report) in reports {
            let aggregates: BTreeMap<String, f64> =
                report.aggregate.iter().map(|(m, v)| (m.to_string(), *v)).collect();
            if table.metrics.is_empty() {
                table.metrics = report.aggregate.keys().map(|m| m.to_string()).collect();
            }
            table.insert(name.clone(), aggregates);
        }
        table
    }

    /// `Model,<metric>...` header; missing values are written as 0.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Model");
        for metric in &self.metrics {
            out.push(',');
            out.push_str(metric);
        }
        out.push('\n');
        for (run, values) in &self.rows {
            out.push_str(run);
            for metric in &self.metrics {
                let _ = write!(out, ",{:.4}", values.get(metric).copied().unwrap_or(0.0));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_fills_missing_with_zero() {
        let mut table = ComparisonTable::new(vec!["map".into(), "P_10".into()]);
        table.insert("TFIDF_stop_porter", [("map".to_string(), 0.21)].into_iter().collect());
        table.insert("BM25_stop_porter", [("map".to_string(), 0.25), ("P_10".to_string(), 0.4)].into_iter().collect());
        assert_eq!(
            table.to_csv(),
            "Model,map,P_10\nBM25_stop_porter,0.2500,0.4000\nTFIDF_stop_porter,0.2100,0.0000\n"
        );
    }
}
