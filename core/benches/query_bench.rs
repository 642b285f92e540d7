use cns_core::normalizer::normalize;
use cns_core::{Document, SearchEngine};
use criterion::{criterion_group, criterion_main, Criterion};

const BODY: &str = "O Plenário do Conselho Nacional de Saúde, em sua Reunião Ordinária, \
    no uso de suas competências regimentais e atribuições conferidas pela Lei nº 8.080, \
    resolve aprovar as diretrizes para a política de saúde mental e atenção psicossocial.";

fn corpus() -> SearchEngine {
    let docs = (0..2_000u32).map(|i| {
        let title = if i % 3 == 0 { "Saúde Mental" } else { "Saúde Pública" };
        Document::new(i, format!("{title} {i}"), BODY)
    });
    SearchEngine::build(docs)
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_body", |b| b.iter(|| normalize(BODY)));
}

fn bench_query(c: &mut Criterion) {
    let engine = corpus();
    c.bench_function("boolean_groups", |b| {
        b.iter(|| engine.index().search("(saúde AND (mental OR pública)) NOT privado"))
    });
    c.bench_function("phrase", |b| b.iter(|| engine.index().search("\"saude mental\"")));
    c.bench_function("ranked_search", |b| b.iter(|| engine.search("saúde mental", 100)));
}

criterion_group!(benches, bench_normalize, bench_query);
criterion_main!(benches);
