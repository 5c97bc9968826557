//! Benchmarks for the phrase matcher and ranking engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use sekhmet::extract::{NegationPolicy, SymptomExtractor};
use sekhmet::lexicon::SymptomLexicon;
use sekhmet::rank::{OverlapStrategy, Ranker};
use sekhmet::signature::SignatureTable;

fn bench_extract(c: &mut Criterion) {
    let lexicon = Arc::new(SymptomLexicon::bundled().unwrap());
    let extractor = SymptomExtractor::new(lexicon, NegationPolicy::default());
    let text = "I have had a terrible headache and nausea since yesterday, \
                plus a hacking cough and a stuffy nose, but no fever and I \
                don't have chills or trouble breathing";

    c.bench_function("extract_long_utterance", |bench| {
        bench.iter(|| black_box(extractor.extract(text)))
    });
}

fn bench_rank(c: &mut Criterion) {
    let lexicon = SymptomLexicon::bundled().unwrap();
    let signatures = Arc::new(SignatureTable::bundled(&lexicon).unwrap());
    let ranker = Ranker::new(Arc::new(OverlapStrategy::new(signatures)), 5);
    let evidence: BTreeSet<String> = ["headache", "nausea", "cough", "congestion"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("rank_overlap", |bench| {
        bench.iter(|| black_box(ranker.rank(&evidence).unwrap()))
    });
}

criterion_group!(benches, bench_extract, bench_rank);
criterion_main!(benches);
