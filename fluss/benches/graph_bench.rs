//! Benchmarks for pipeline graph queries.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fluss::archive::MemoryEntry;
use fluss::core::{StageId, TargetKind};
use fluss::operations::{Operation, OperationKind};
use fluss::pipeline::{PipelineGraph, Stage};
use std::sync::Arc;

/// Builds `chains` independent chains of `depth` stages each.
fn chains(chains: usize, depth: usize) -> (PipelineGraph, Vec<StageId>) {
    let mut graph = PipelineGraph::new();
    let mut heads = Vec::with_capacity(chains);
    for chain in 0..chains {
        let mut current =
            graph.add_input(Arc::new(MemoryEntry::file(format!("{chain}.wav"), Vec::new())));
        for step in 0..depth {
            let next = graph.add_target(TargetKind::Temporary, format!("{chain}/{step}.wav"));
            let stage = graph
                .add_stage(Stage::new(
                    Operation::new(OperationKind::PassThrough),
                    vec![current],
                    vec![next],
                ))
                .unwrap();
            if step == 0 {
                heads.push(stage);
            }
            current = next;
        }
    }
    (graph, heads)
}

fn graph_benchmark(c: &mut Criterion) {
    let (graph, heads) = chains(100, 50);

    c.bench_function("sort_5000_stages", |b| {
        b.iter(|| black_box(graph.sort().unwrap()));
    });

    c.bench_function("remove_chain_of_50", |b| {
        b.iter_batched(
            || graph.clone(),
            |mut graph| black_box(graph.remove_stage(heads[0])),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, graph_benchmark);
criterion_main!(benches);
