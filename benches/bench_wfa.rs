use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wfpoa::edit_dp_poa;
use wfpoa::text_dag::TextDag;
use wfpoa::wfpoa::align;

fn branch_rejoin_dag() -> TextDag {
    TextDag::example_branch_rejoin()
}

fn wfpoa_bench_branch_exact(c: &mut Criterion) {
    let dag = branch_rejoin_dag();
    let pattern = "ACTGTACT";
    c.bench_function("wfpoa branch-rejoin exact match", |b| {
        b.iter(|| align(black_box(pattern), black_box(&dag), black_box(1000)))
    });
}

fn wfpoa_bench_branch_with_mismatches(c: &mut Criterion) {
    let dag = branch_rejoin_dag();
    let pattern = "AGTGAAGT";
    c.bench_function("wfpoa branch-rejoin with mismatches", |b| {
        b.iter(|| align(black_box(pattern), black_box(&dag), black_box(1000)))
    });
}

fn dp_oracle_bench_branch(c: &mut Criterion) {
    let dag = branch_rejoin_dag();
    let pattern = "ACTGTACT";
    c.bench_function("edit_dp_poa oracle branch-rejoin", |b| {
        b.iter(|| edit_dp_poa::score(black_box(pattern), black_box(&dag)))
    });
}

fn wfpoa_bench_wide_dag(c: &mut Criterion) {}

fn wfpoa_bench_l1000_e1(c: &mut Criterion) {}

fn wfpoa_bench_l1000_e10(c: &mut Criterion) {}

fn wfpoa_bench_l1000_e30(c: &mut Criterion) {}

fn wfpoa_bench_l10000_e1(c: &mut Criterion) {}

fn wfpoa_bench_l10000_e10(c: &mut Criterion) {}

criterion_group!(
    benches,
    wfpoa_bench_branch_exact,
    wfpoa_bench_branch_with_mismatches,
    dp_oracle_bench_branch,
    wfpoa_bench_wide_dag,
    wfpoa_bench_l1000_e1,
    wfpoa_bench_l1000_e10,
    wfpoa_bench_l1000_e30,
    wfpoa_bench_l10000_e1,
    wfpoa_bench_l10000_e10,
);
criterion_main!(benches);
