use evosim_core::{
    Animal, DeathCause, DerivedStats, EventKind, SimEvent, Simulation, SimulationConfig, Species,
    Tick, Vec2, World, create_simulation,
};
use std::cell::RefCell;
use std::rc::Rc;

fn collect_events(sim: &mut Simulation) -> Rc<RefCell<Vec<SimEvent>>> {
    let log: Rc<RefCell<Vec<SimEvent>>> = Rc::default();
    let sink = log.clone();
    sim.subscribe_all(move |event| sink.borrow_mut().push(event.clone()));
    log
}

fn assert_invariants(sim: &Simulation) {
    let world = sim.world();
    let config = world.config();
    let max_hunger = config.entities.max_hunger;

    let mut living = 0;
    for animal in world.store().living_animals() {
        living += 1;
        let mut clamped = animal.attributes;
        clamped.clamp_to_bounds();
        assert_eq!(
            animal.attributes, clamped,
            "{} attributes out of bounds",
            animal.id
        );
        assert!(animal.attributes.lifecycle.maturity_age < animal.attributes.lifecycle.max_age);
        assert!(animal.hunger >= 0.0 && animal.hunger <= max_hunger);
        assert!(animal.position.x >= 0.0 && animal.position.x <= config.world.width);
        assert!(animal.position.y >= 0.0 && animal.position.y <= config.world.height);
        assert_eq!(
            animal.derived,
            DerivedStats::compute(&animal.attributes.base, &config.derived_stats),
            "{} derived stats drifted from their base attributes",
            animal.id
        );
        let entry = world
            .index()
            .entry(animal.id)
            .unwrap_or_else(|| panic!("{} missing from the spatial index", animal.id));
        assert_eq!(entry.x, animal.position.x);
        assert_eq!(entry.y, animal.position.y);
    }
    assert_eq!(
        world.index().len(),
        living,
        "spatial index holds exactly the living animals"
    );

    for corpse in world.store().corpses() {
        assert!(corpse.food_value > 0.0, "exhausted corpses must be absent");
        assert!(corpse.decay_timer >= 1);
    }
}

#[test]
fn invariants_hold_through_a_default_run() {
    let mut sim = create_simulation(SimulationConfig::default(), 4_242).expect("sim");
    assert_invariants(&sim);
    for _ in 0..200 {
        sim.step();
        assert_invariants(&sim);
    }
}

#[test]
fn empty_world_vegetation_spread_is_reproducible() {
    // Scenario 1: no animals, seed 11111, 100 steps.
    let mut config = SimulationConfig::default();
    config.world.initial_deer_count = 0;
    config.world.initial_wolf_count = 0;

    let mut first = create_simulation(config.clone(), 11_111).expect("sim");
    let initial = first.vegetation_count();
    for _ in 0..100 {
        first.step();
    }

    let mut second = create_simulation(config, 11_111).expect("sim");
    for _ in 0..100 {
        second.step();
    }

    assert_eq!(first.vegetation_count(), second.vegetation_count());
    assert_eq!(first.vegetation_positions(), second.vegetation_positions());
    assert_eq!(first.vegetation_positions().len(), first.vegetation_count());
    assert!(
        first.vegetation_count() >= initial,
        "nothing grazes, so spread only grows"
    );
}

#[test]
fn lone_deer_on_full_vegetation_founds_a_herd() {
    // Scenario 2: 50x50 world, full vegetation, one deer at the centre.
    let mut config = SimulationConfig::default();
    config.world.width = 50.0;
    config.world.height = 50.0;
    config.world.initial_deer_count = 0;
    config.world.initial_wolf_count = 0;
    config.vegetation.initial_density = 1.0;

    let mut sim = create_simulation(config, 42).expect("sim");
    sim.spawn_animal(Species::Deer, Vec2::new(25.0, 25.0))
        .expect("insert deer");
    let events = collect_events(&mut sim);

    for _ in 0..200 {
        sim.step();
    }

    assert!(
        sim.deer_count() >= 5,
        "expected a herd, got {}",
        sim.deer_count()
    );
    let births = events
        .borrow()
        .iter()
        .filter(|event| matches!(event, SimEvent::AnimalBorn { .. }))
        .count();
    assert!(births >= 4);
    // Lineage: every born deer points back into the founder's tree.
    for event in events.borrow().iter() {
        if let SimEvent::AnimalBorn { animal } = event {
            assert!(animal.parent.is_some());
            assert!(animal.generation >= 1);
        }
    }
}

#[test]
fn barren_world_starves_its_deer() {
    // Scenario 3: five deer, no vegetation ever, low spawn hunger.
    let mut config = SimulationConfig::default();
    config.world.width = 50.0;
    config.world.height = 50.0;
    config.world.initial_deer_count = 5;
    config.world.initial_wolf_count = 0;
    config.vegetation.initial_density = 0.0;
    config.vegetation.spread_rate = 0.0;
    config.entities.initial_hunger_spawn = 20.0;

    let mut sim = create_simulation(config, 42).expect("sim");
    let events = collect_events(&mut sim);

    for _ in 0..100 {
        sim.step();
    }

    let starvations = events
        .borrow()
        .iter()
        .filter(|event| {
            matches!(
                event,
                SimEvent::AnimalDied {
                    cause: DeathCause::Starvation,
                    ..
                }
            )
        })
        .count();
    assert!(starvations >= 1, "no starvation in a barren world");
}

#[test]
fn old_age_claims_animals_within_two_steps() {
    // Scenario 4: default config; age every deer to the brink.
    let mut sim = create_simulation(SimulationConfig::default(), 2_024).expect("sim");
    let aged: Vec<Animal> = sim.animals_by_species(Species::Deer);
    assert!(!aged.is_empty());
    for animal in &aged {
        let max_age = animal.attributes.lifecycle.max_age;
        assert!(sim.set_animal_age(animal.id, max_age - 1));
    }
    let events = collect_events(&mut sim);

    sim.step();
    sim.step();

    let old_age_ids: Vec<String> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            SimEvent::AnimalDied {
                animal,
                cause: DeathCause::OldAge,
            } => Some(animal.id.to_string()),
            _ => None,
        })
        .collect();
    assert!(!old_age_ids.is_empty(), "old age must fire within two steps");
    for id in &old_age_ids {
        assert!(aged.iter().any(|animal| animal.id.to_string() == *id));
    }
}

#[test]
fn wolves_hunt_deer_in_close_quarters() {
    // Scenario 5: a crowded 50x50 world forces contact quickly.
    let mut config = SimulationConfig::default();
    config.world.width = 50.0;
    config.world.height = 50.0;
    config.world.initial_deer_count = 10;
    config.world.initial_wolf_count = 5;
    config.world.initial_spawn_min_distance = 2.0;
    config.entities.initial_hunger_spawn = 30.0;

    let mut sim = create_simulation(config, 12_345).expect("sim");
    let events = collect_events(&mut sim);

    for _ in 0..200 {
        sim.step();
    }

    let log = events.borrow();
    let killed: Vec<&Animal> = log
        .iter()
        .filter_map(|event| match event {
            SimEvent::AnimalDied {
                animal,
                cause: DeathCause::Killed,
            } => Some(animal),
            _ => None,
        })
        .collect();
    assert!(!killed.is_empty(), "no hunt succeeded in 200 steps");
    for victim in killed {
        assert!(
            log.iter().any(|event| matches!(
                event,
                SimEvent::CorpseCreated { corpse } if corpse.source_id == victim.id
            )),
            "kill of {} left no corpse",
            victim.id
        );
    }
}

fn snapshot_digest(seed: u32, steps: usize) -> (evosim_core::WorldSnapshot, String) {
    let mut config = SimulationConfig::default();
    config.world.initial_deer_count = 10;
    config.world.initial_wolf_count = 3;
    let mut sim = create_simulation(config, seed).expect("sim");
    for _ in 0..steps {
        sim.step();
    }
    let snapshot = sim.world_snapshot();
    let json = serde_json::to_string(&snapshot).expect("snapshot serialises");
    (snapshot, json)
}

#[test]
fn determinism_hash_after_500_steps() {
    // Scenario 6: two independent runs produce identical digests.
    let (snap_a, json_a) = snapshot_digest(98_765, 500);
    let (snap_b, json_b) = snapshot_digest(98_765, 500);
    assert_eq!(snap_a, snap_b);
    assert_eq!(json_a, json_b);
    assert_eq!(snap_a.tick, 500);

    let (snap_c, _) = snapshot_digest(55_555, 500);
    assert_ne!(snap_a, snap_c, "different seeds should diverge");
}

#[test]
fn determinism_holds_at_1000_steps() {
    let (snap_a, _) = snapshot_digest(98_765, 1_000);
    let (snap_b, _) = snapshot_digest(98_765, 1_000);
    assert_eq!(snap_a, snap_b);
}

#[test]
fn world_rng_clone_is_equal_from_the_clone_point() {
    let mut world = World::new(SimulationConfig::default(), 77).expect("world");
    world.step();
    let mut cloned = world.rng().clone();
    for _ in 0..32 {
        assert_eq!(world.rng().next_f64(), cloned.next_f64());
    }
}

#[test]
fn zero_spread_rate_never_raises_vegetation_count() {
    let mut config = SimulationConfig::default();
    config.vegetation.spread_rate = 0.0;
    let mut sim = create_simulation(config, 7).expect("sim");
    let mut previous = sim.vegetation_count();
    for _ in 0..50 {
        sim.step();
        let current = sim.vegetation_count();
        assert!(current <= previous, "vegetation grew with spread disabled");
        previous = current;
    }
}

#[test]
fn reset_reproduces_and_reseeds() {
    let mut config = SimulationConfig::default();
    config.world.initial_deer_count = 6;
    config.world.initial_wolf_count = 2;
    let mut sim = create_simulation(config, 31_337).expect("sim");
    for _ in 0..60 {
        sim.step();
    }
    let original = sim.world_snapshot();

    let events = collect_events(&mut sim);
    sim.reset(None).expect("reset");
    assert!(
        events
            .borrow()
            .iter()
            .any(|event| event.kind() == EventKind::Reset)
    );
    assert_eq!(sim.current_tick(), Tick(0));
    for _ in 0..60 {
        sim.step();
    }
    assert_eq!(sim.world_snapshot(), original);
}

#[test]
fn capacity_limits_population_growth() {
    let mut config = SimulationConfig::default();
    config.world.width = 50.0;
    config.world.height = 50.0;
    config.world.max_entities = 12;
    config.world.initial_deer_count = 6;
    config.world.initial_wolf_count = 0;
    config.vegetation.initial_density = 1.0;

    let mut sim = create_simulation(config, 42).expect("sim");
    for _ in 0..300 {
        sim.step();
        assert!(sim.deer_count() <= 12, "entity cap must hold every tick");
    }
}
