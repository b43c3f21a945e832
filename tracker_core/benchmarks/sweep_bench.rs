use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tracker_core::predicate::{all_of, has};
use tracker_core::{
    sweep, CollectionState, GameCatalog, GameData, ItemClassification, ItemDefinition,
    LocationKind, PlayerId, TraversalOrder, WorldGraph, WorldGraphBuilder,
};

const PLAYER: PlayerId = PlayerId(1);

/// `regions` rooms in a line. Entering room `i` needs "Key {i}" and the event
/// fired in room `i - 1`; every room holds one chest and one event.
fn chain_graph(regions: usize) -> WorldGraph {
    let mut data = GameData::new("Bench");
    for index in 0..regions {
        data.add_item(ItemDefinition {
            name: format!("Key {index}"),
            code: Some(index as i64 + 1),
            classification: ItemClassification::Progression,
        });
        data.add_location(format!("Chest {index}"), 10_000 + index as i64);
    }
    let mut builder = WorldGraphBuilder::new(Arc::new(GameCatalog::new().with_game(data)));
    builder
        .add_player(PLAYER, "Bencher", "Bench")
        .expect("player");

    let mut previous = None;
    for index in 0..regions {
        let region = builder
            .add_region(PLAYER, format!("Room {index}"))
            .expect("region");
        if let Some(source) = previous {
            builder
                .connect(
                    source,
                    region,
                    format!("Door {index}"),
                    all_of(vec![
                        has(format!("Key {index}")),
                        has(format!("Lit {}", index - 1)),
                    ]),
                )
                .expect("door");
        }
        builder
            .add_open_location(
                region,
                format!("Chest {index}"),
                LocationKind::Checkable(10_000 + index as i64),
            )
            .expect("chest");
        builder
            .add_open_location(
                region,
                format!("Torch {index}"),
                LocationKind::Event(format!("Lit {index}")),
            )
            .expect("torch");
        previous = Some(region);
    }
    builder.build().expect("graph")
}

fn collected_state(graph: &WorldGraph, regions: usize, order: TraversalOrder) -> CollectionState<'_> {
    let mut state = CollectionState::new(graph).with_order(order);
    for index in 0..regions {
        state
            .collect(&format!("Key {index}"), PLAYER)
            .expect("collect");
    }
    state
}

fn bench_full_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_run");
    for &regions in &[16usize, 64, 256] {
        let graph = chain_graph(regions);
        for (label, order) in [
            ("insertion", TraversalOrder::Insertion),
            ("reverse", TraversalOrder::Reverse),
        ] {
            group.bench_with_input(BenchmarkId::new(label, regions), &regions, |b, &regions| {
                b.iter_batched(
                    || collected_state(&graph, regions, order),
                    |mut state| {
                        let outcome = sweep::run(&mut state, PLAYER).expect("sweep");
                        criterion::black_box(outcome.locations.len());
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_reachable_regions(c: &mut Criterion) {
    let mut group = c.benchmark_group("reachable_regions");
    for &regions in &[64usize, 256] {
        let graph = chain_graph(regions);
        group.bench_with_input(BenchmarkId::from_parameter(regions), &regions, |b, &regions| {
            b.iter_batched(
                || {
                    let mut state = collected_state(&graph, regions, TraversalOrder::Insertion);
                    sweep::sweep_for_events(&mut state, sweep::event_locations(&graph));
                    // Collecting again leaves the cached bits stale.
                    state.collect("Key 0", PLAYER).expect("collect");
                    state
                },
                |state| {
                    let reached = state.reachable_regions(PLAYER).expect("regions");
                    criterion::black_box(reached.len());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(sweep_benches, bench_full_sweep, bench_reachable_regions);
criterion_main!(sweep_benches);
