use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use evosim_core::{Simulation, SimulationConfig};
use std::time::Duration;

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(10));

    // Steps per bench iteration (override via EVOSIM_BENCH_STEPS).
    let steps: usize = std::env::var("EVOSIM_BENCH_STEPS")
        .ok()
        .and_then(|value| value.parse().ok())
        .filter(|&value| value > 0)
        .unwrap_or(64);

    for &(deer, wolves) in &[(50_usize, 10_usize), (200, 40), (500, 100)] {
        group.bench_function(format!("steps{steps}_deer{deer}_wolves{wolves}"), |b| {
            b.iter_batched(
                || {
                    let mut config = SimulationConfig::default();
                    config.world.width = 1_000.0;
                    config.world.height = 1_000.0;
                    config.world.max_entities = 4_000;
                    config.world.initial_deer_count = deer;
                    config.world.initial_wolf_count = wolves;
                    config.performance.history_capacity = 1;
                    Simulation::new(config, 0xBEEF).expect("simulation")
                },
                |mut sim| {
                    for _ in 0..steps {
                        sim.step();
                    }
                    sim
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
