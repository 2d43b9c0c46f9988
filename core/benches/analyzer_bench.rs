use criterion::{criterion_group, criterion_main, Criterion};
use trec_core::{Analyzer, AnalyzerConfig, StemmerKind, StopwordList};

const TEXT: &str = "The Federal Reserve Board on Friday approved the acquisition of a Texas bank holding \
company, saying the merger would not substantially lessen competition in the region. Officials said \
the transaction, valued at about $150 million, was expected to close by the end of the year.";

fn bench_analyze(c: &mut Criterion) {
    let plain = Analyzer::new(AnalyzerConfig::default());
    let full = Analyzer::new(AnalyzerConfig::new(StemmerKind::Porter, Some(StopwordList::english())));
    c.bench_function("analyze_nostop_nostem", |b| b.iter(|| plain.analyze(TEXT)));
    c.bench_function("analyze_stop_porter", |b| b.iter(|| full.analyze(TEXT)));
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
