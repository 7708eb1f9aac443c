//! Performance benchmarks for fleet_core using Criterion.rs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleet_core::clock::ManualClock;
use fleet_core::config::{CostModel, FleetConfig};
use fleet_core::feed::{SyntheticFeed, WorldFeed};
use fleet_core::opportunity::analyze_opportunities;
use fleet_core::oracle::{DecisionOracle, OracleRequest, RuleBasedOracle};
use fleet_core::routing::StraightLineRouteProvider;
use fleet_core::state::FleetState;
use fleet_core::store::FleetStore;
use fleet_core::test_helpers::TEST_NOW_MS;

fn synthetic_state(vehicles: usize, loads: usize) -> FleetState {
    let mut feed = SyntheticFeed::new(42);
    FleetState::publish(
        TEST_NOW_MS,
        feed.generate_initial_fleet(vehicles, TEST_NOW_MS),
        feed.generate_available_loads(loads, TEST_NOW_MS),
        Vec::new(),
        Vec::new(),
        50,
    )
}

fn bench_analyze_opportunities(c: &mut Criterion) {
    let sizes = vec![("small", 10, 20), ("medium", 50, 100), ("large", 200, 400)];
    let cost = CostModel::default();

    let mut group = c.benchmark_group("analyze_opportunities");
    for (name, vehicles, loads) in sizes {
        let state = synthetic_state(vehicles, loads);
        group.bench_with_input(BenchmarkId::from_parameter(name), &state, |b, state| {
            b.iter(|| black_box(analyze_opportunities(state, &cost)));
        });
    }
    group.finish();
}

fn bench_rule_based_matching(c: &mut Criterion) {
    let oracle = RuleBasedOracle::default();
    let config = FleetConfig::default();

    let mut group = c.benchmark_group("rule_based_matching");
    for candidates in [10usize, 50, 200] {
        let state = synthetic_state(candidates, candidates);
        let mut opportunities = analyze_opportunities(&state, &config.cost);
        opportunities.truncate(candidates);
        let request = OracleRequest::Matching {
            candidates: opportunities,
            constraints: fleet_core::oracle::MatchConstraints {
                total_vehicles: candidates,
                available_vehicles: candidates,
                available_loads: candidates,
                target_utilization: config.targets.utilization_rate,
                min_profit_margin: config.targets.min_profit_margin,
            },
        };
        group.bench_with_input(BenchmarkId::from_parameter(candidates), &request, |b, request| {
            b.iter(|| black_box(oracle.propose(request)));
        });
    }
    group.finish();
}

fn bench_full_cycle(c: &mut Criterion) {
    let sizes = vec![("small", 10, 20), ("medium", 50, 100)];

    let mut group = c.benchmark_group("full_cycle");
    for (name, vehicles, loads) in sizes {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(vehicles, loads),
            |b, &(vehicles, loads)| {
                b.iter(|| {
                    let clock = Arc::new(ManualClock::new(TEST_NOW_MS));
                    let store = FleetStore::new(
                        FleetConfig::default().with_seed(42),
                        Box::new(SyntheticFeed::new(42)),
                        Arc::new(RuleBasedOracle::default()),
                    )
                    .with_clock(clock.clone())
                    .with_route_provider(Arc::new(StraightLineRouteProvider));
                    if store.initialize(vehicles, loads).is_err() {
                        return;
                    }
                    for _ in 0..5 {
                        store.run_monitor_cycle();
                        store.run_matcher();
                        store.adapt_en_route_trips();
                        black_box(store.simulate_movement());
                        clock.advance_minutes(15);
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_analyze_opportunities,
    bench_rule_based_matching,
    bench_full_cycle
);
criterion_main!(benches);
