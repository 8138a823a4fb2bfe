use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use tokio::runtime::Runtime;

use warden_core::ExpectedVersion;
use warden_events::{Aggregate, AggregateFilter, Command, FieldOperation, SearchCriteria, SearchQuery};
use warden_infra::{Eventstore, InMemoryEventstore};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

fn draft(project: usize, role: usize) -> Command {
    let id = format!("p{project}");
    Command {
        aggregate: Aggregate::new("project", id.clone(), "org1", "inst"),
        event_type: "project.role.added".to_string(),
        event_version: 1,
        creator: "bench".to_string(),
        payload: json!({ "key": format!("role{role}") }),
        expected: ExpectedVersion::Any,
        fields: vec![FieldOperation::add(
            "project_role",
            format!("role{role}"),
            "key",
            format!("role{role}"),
        )
        .expect("field encodes")],
        unique_constraints: vec![],
    }
}

fn seeded_store(rt: &Runtime, projects: usize, roles: usize) -> InMemoryEventstore {
    let store = InMemoryEventstore::new();
    for p in 0..projects {
        let batch = (0..roles).map(|r| draft(p, r)).collect();
        rt.block_on(store.push(batch)).expect("seed");
    }
    store
}

fn bench_push(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("push");
    for batch_size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &n| {
            let store = InMemoryEventstore::new();
            b.iter(|| {
                let batch = (0..n).map(|r| draft(0, r)).collect();
                black_box(rt.block_on(store.push(batch)).expect("push"));
            });
        });
    }
    group.finish();
}

fn bench_filter_and_search(c: &mut Criterion) {
    let rt = runtime();
    let store = seeded_store(&rt, 200, 20);

    c.bench_function("filter_one_aggregate", |b| {
        let query = SearchQuery::new()
            .instance("inst")
            .filter(AggregateFilter::new("project").aggregate_id("p100"));
        b.iter(|| black_box(rt.block_on(store.filter(&query)).expect("filter")));
    });

    c.bench_function("search_role_key", |b| {
        let criteria = [SearchCriteria::aggregate("project", "p100")
            .object_type("project_role")
            .object_id("role7")];
        b.iter(|| black_box(rt.block_on(store.search("inst", &criteria)).expect("search")));
    });
}

criterion_group!(benches, bench_push, bench_filter_and_search);
criterion_main!(benches);
