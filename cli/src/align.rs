//! Query id reconciliation for runs produced by tools that wrote the topic
//! title instead of its number.

use std::collections::HashMap;
use trec_core::{Qrels, Query, Run};

pub struct TitleFallback {
    title_to_qid: HashMap<String, String>,
}

impl TitleFallback {
    pub fn from_topics(topics: &[Query]) -> Self {
        let title_to_qid = topics.iter().map(|q| (normalize(&q.text), q.id.clone())).collect();
        Self { title_to_qid }
    }

    /// Rename run queries that have no judgments but whose id is a known
    /// topic title. A rename that would collide with an existing query is
    /// skipped; the evaluator then reports those rows as dropped.
    pub fn apply(&self, run: &mut Run, qrels: &Qrels) -> usize {
        let unmatched: Vec<String> = run.queries.keys().filter(|qid| !qrels.contains_query(qid)).cloned().collect();
        let mut remapped = 0;
        for old in unmatched {
            let Some(new) = self.title_to_qid.get(&normalize(&old)) else { continue };
            if run.queries.contains_key(new) {
                tracing::warn!(run = %run.name, title = %old, qid = %new, "title maps onto an existing query id");
                continue;
            }
            if let Some(rows) = run.queries.remove(&old) {
                run.queries.insert(new.clone(), rows);
                remapped += 1;
            }
        }
        if remapped > 0 {
            tracing::info!(run = %run.name, remapped, "query ids recovered from topic titles");
        }
        remapped
    }
}

fn normalize(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trec_core::{Evaluator, Qrel, RunRow};

    #[test]
    fn titles_become_topic_numbers() {
        let topics = vec![Query::new("51", "Airbus Subsidies"), Query::new("52", "South African Sanctions")];
        let qrels: Qrels = [Qrel::new("51", "d1", 1), Qrel::new("52", "d2", 1)].into_iter().collect();
        let mut run = Run::parse("52 Q0 d2 1 1.0 t\nUnknown Q0 d3 1 1.0 t\n").unwrap();
        let rows = run.rows("52").to_vec();
        run.queries.insert("Airbus  Subsidies".into(), rows.iter().map(|r| RunRow { docno: "d1".into(), ..r.clone() }).collect());

        let fallback = TitleFallback::from_topics(&topics);
        assert_eq!(fallback.apply(&mut run, &qrels), 1);
        assert!(run.queries.contains_key("51"));

        let report = Evaluator::default().evaluate(&run, &qrels, None).unwrap();
        assert_eq!(report.num_queries(), 2);
        assert_eq!(report.alignment.unmatched_query_ids, vec!["Unknown".to_string()]);
    }
}
