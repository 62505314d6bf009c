//! Benchmarks for execution planning.

use caseflow::config::StageConfig;
use caseflow::planner::ExecutionPlanner;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn layered_graph(layers: usize, width: usize) -> Vec<StageConfig> {
    let mut configs = Vec::new();
    for layer in 0..layers {
        for slot in 0..width {
            let mut config = StageConfig::new(format!("stage_{layer}_{slot}")).parallel();
            if layer > 0 {
                for dep in 0..width {
                    config = config.with_dependency(format!("stage_{}_{dep}", layer - 1));
                }
            }
            configs.push(config);
        }
    }
    configs
}

fn planner_benchmark(c: &mut Criterion) {
    let small = layered_graph(4, 4);
    let wide = layered_graph(10, 20);

    c.bench_function("plan_4x4", |b| {
        b.iter(|| ExecutionPlanner::plan(black_box(&small)))
    });
    c.bench_function("plan_10x20", |b| {
        b.iter(|| ExecutionPlanner::plan(black_box(&wide)))
    });
}

criterion_group!(benches, planner_benchmark);
criterion_main!(benches);
