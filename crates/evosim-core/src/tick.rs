//! The two-phase tick executor and the world state it drives.
//!
//! A tick first decides an action for every living animal against a frozen
//! view of the world, then executes the collected actions in the same
//! deterministic order. Animals with wider alert ranges act first in both
//! phases (ties by id), so a prey killed by an earlier predator is skipped
//! by everyone scheduled after it.

use crate::config::SimulationConfig;
use crate::decision::{Action, DeathCause, FoodKind, decide};
use crate::entity::{Animal, AnimalId, Corpse, EntityStore};
use crate::events::{ActionHistorySink, NullActionHistory, SimEvent};
use crate::genetics;
use crate::math::Vec2;
use crate::perception::{Observation, PerceptionView};
use crate::rng::SimRng;
use crate::species::Species;
use crate::vegetation::VegetationGrid;
use evosim_index::{BucketGrid, Entry, IndexError};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Ticks processed since world construction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Candidate positions tried before accepting a crowded spawn point.
const SPAWN_ATTEMPTS: usize = 16;

/// Errors raised while constructing or mutating world state.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The configured animal cap is already reached.
    #[error("entity cap reached: {max} animals")]
    CapacityExceeded { max: usize },
    /// The spatial index rejected its configuration.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Aggregate simulation state: entities, grids, PRNG, and clock.
pub struct World {
    config: SimulationConfig,
    seed: u32,
    tick: Tick,
    rng: SimRng,
    store: EntityStore,
    vegetation: VegetationGrid,
    index: BucketGrid<AnimalId>,
    action_history: Box<dyn ActionHistorySink>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("seed", &self.seed)
            .field("tick", &self.tick)
            .field("animals", &self.store.living_count())
            .field("corpses", &self.store.corpse_count())
            .field("vegetation", &self.vegetation.count())
            .finish()
    }
}

impl World {
    /// Build a world from a validated configuration and seed: vegetation
    /// first (row-major draws), then initial deer, then wolves.
    pub fn new(config: SimulationConfig, seed: u32) -> Result<Self, WorldError> {
        let mut rng = SimRng::new(seed);
        let vegetation = VegetationGrid::generate(
            config.world.width,
            config.world.height,
            config.vegetation.tile_size,
            config.vegetation.initial_density,
            &mut rng,
        );
        let index = BucketGrid::new(
            config.performance.spatial_bucket_size,
            config.world.width,
            config.world.height,
        )?;
        let mut world = Self {
            config,
            seed,
            tick: Tick::zero(),
            rng,
            store: EntityStore::new(),
            vegetation,
            index,
            action_history: Box::new(NullActionHistory),
        };
        for _ in 0..world.config.world.initial_deer_count {
            let position = world.sample_spawn_position();
            let _ = world.spawn_animal(Species::Deer, position)?;
        }
        for _ in 0..world.config.world.initial_wolf_count {
            let position = world.sample_spawn_position();
            let _ = world.spawn_animal(Species::Wolf, position)?;
        }
        debug!(
            seed = world.seed,
            deer = world.store.species_count(Species::Deer),
            wolf = world.store.species_count(Species::Wolf),
            vegetation = world.vegetation.count(),
            "world initialised"
        );
        Ok(world)
    }

    /// Draw a spawn position honouring `initial_spawn_min_distance`, with a
    /// bounded retry so initialisation never blocks.
    fn sample_spawn_position(&mut self) -> Vec2 {
        let width = self.config.world.width;
        let height = self.config.world.height;
        let min_distance = self.config.world.initial_spawn_min_distance;
        let mut candidate = Vec2::ZERO;
        for _ in 0..SPAWN_ATTEMPTS {
            candidate = Vec2::new(
                self.rng.range_f64(0.0, width),
                self.rng.range_f64(0.0, height),
            );
            if min_distance <= 0.0
                || self
                    .index
                    .nearest(candidate.x, candidate.y, min_distance, None)
                    .is_none()
            {
                return candidate;
            }
        }
        candidate
    }

    /// Insert a new animal with its species baseline. Entry point for shells
    /// and scenario setup; reproduction goes through the tick executor.
    pub fn spawn_animal(
        &mut self,
        species: Species,
        position: Vec2,
    ) -> Result<AnimalId, WorldError> {
        if self.store.living_count() >= self.config.world.max_entities {
            return Err(WorldError::CapacityExceeded {
                max: self.config.world.max_entities,
            });
        }
        let attributes = species.baseline();
        let derived =
            crate::attributes::DerivedStats::compute(&attributes.base, &self.config.derived_stats);
        let position = position.clamp_to(self.config.world.width, self.config.world.height);
        let id = self.store.allocate_animal_id(species);
        let animal = Animal {
            id,
            species,
            diet: species.diet(),
            attributes,
            derived,
            position,
            hunger: self.config.entities.initial_hunger_spawn,
            age: 0,
            ticks_since_reproduction: 0,
            dead: false,
            parent: None,
            generation: 0,
        };
        self.index
            .insert(id, Entry::new(position.x, position.y, attributes.base.size));
        self.store.insert_animal(animal);
        Ok(id)
    }

    /// Overwrite an animal's age (scenario hook). Returns whether it exists.
    pub fn set_animal_age(&mut self, id: AnimalId, age: u32) -> bool {
        self.store.update_animal(id, |animal| animal.age = age)
    }

    /// Install the action-history sink.
    pub fn set_action_history(&mut self, sink: Box<dyn ActionHistorySink>) {
        self.action_history = sink;
    }

    /// Detach the action-history sink, leaving the null sink behind. Used to
    /// carry the sink across a reset.
    pub fn take_action_history(&mut self) -> Box<dyn ActionHistorySink> {
        std::mem::replace(&mut self.action_history, Box::new(NullActionHistory))
    }

    /// Execute one tick, returning the events it produced. Events are handed
    /// back rather than dispatched so no observer sees intermediate state.
    pub fn step(&mut self) -> Vec<SimEvent> {
        let next_tick = self.tick.next();
        let mut events = Vec::new();

        // Decision phase: frozen world, one action per living animal.
        let order = self.turn_order();
        let actions = self.decide_actions(&order);

        // Execution phase: same order, skipping anything killed earlier
        // in this tick.
        let mut deaths: BTreeSet<AnimalId> = BTreeSet::new();
        for &(id, action) in &actions {
            if deaths.contains(&id) {
                continue;
            }
            self.record_action(id, next_tick, &action);
            self.execute(id, action, &mut deaths, &mut events);
        }

        for animal in self.store.living_animals_mut() {
            animal.age += 1;
            animal.ticks_since_reproduction += 1;
        }
        self.store.purge_dead();

        self.age_corpses(&mut events);
        self.vegetation
            .spread(self.config.vegetation.spread_rate, &mut self.rng);

        self.tick = next_tick;
        events.push(SimEvent::Tick {
            tick: self.tick,
            deer: self.store.species_count(Species::Deer),
            wolf: self.store.species_count(Species::Wolf),
            vegetation: self.vegetation.count(),
        });
        events
    }

    /// Living animals sorted by alert range descending, ties by id ascending.
    fn turn_order(&self) -> Vec<AnimalId> {
        let mut order: Vec<(AnimalId, f64)> = self
            .store
            .living_animals()
            .map(|animal| (animal.id, animal.derived.alert_range))
            .collect();
        order.sort_by_key(|&(id, alert)| (Reverse(OrderedFloat(alert)), id));
        order.into_iter().map(|(id, _)| id).collect()
    }

    fn decide_actions(&mut self, order: &[AnimalId]) -> Vec<(AnimalId, Action)> {
        let store = &self.store;
        let vegetation = &self.vegetation;
        let config = &self.config;
        let index = &self.index;
        let rng = &mut self.rng;

        let mut actions = Vec::with_capacity(order.len());
        for &id in order {
            let Some(observer) = store.animal(id) else {
                continue;
            };
            let neighbors: Vec<Observation<'_>> = index
                .query_radius(
                    observer.position.x,
                    observer.position.y,
                    observer.derived.alert_range,
                )
                .into_iter()
                .filter(|&(other, _)| other != id)
                .filter_map(|(other, distance)| {
                    store
                        .animal(other)
                        .filter(|animal| !animal.dead)
                        .map(|animal| Observation { animal, distance })
                })
                .collect();
            let view = PerceptionView {
                observer,
                neighbors,
                store,
                vegetation,
                config,
            };
            actions.push((id, decide(&view, rng)));
        }
        actions
    }

    fn record_action(&mut self, id: AnimalId, tick: Tick, action: &Action) {
        let detail = match action {
            Action::Die { cause } => cause.to_string(),
            Action::Flee { target }
            | Action::MoveToFood { target }
            | Action::MoveToMate { target }
            | Action::Drift { target } => format!("({:.1}, {:.1})", target.x, target.y),
            Action::Eat {
                kind: FoodKind::Vegetation { cell },
            } => format!("vegetation ({}, {})", cell.0, cell.1),
            Action::Eat {
                kind: FoodKind::Corpse { id },
            } => id.to_string(),
            Action::Attack { target } => target.to_string(),
            Action::Reproduce => "litter".to_string(),
            Action::Stay => String::new(),
        };
        self.action_history.record(id, tick, action, &detail);
    }

    fn execute(
        &mut self,
        id: AnimalId,
        action: Action,
        deaths: &mut BTreeSet<AnimalId>,
        events: &mut Vec<SimEvent>,
    ) {
        match action {
            Action::Die { cause } => {
                self.kill(id, cause, deaths, events);
            }
            Action::Flee { target } => {
                let cost_rate = self.config.movement.move_cost + self.config.movement.flee_cost_bonus;
                let moved = self.relocate(id, target, None);
                self.debit(id, cost_rate * moved);
                self.apply_decay(id);
            }
            Action::Eat {
                kind: FoodKind::Vegetation { .. },
            } => {
                // Consumption happens on the animal's current tile; the
                // decided cell may have been grazed by an earlier animal.
                if let Some(animal) = self.store.animal(id) {
                    let (gx, gy) = self.vegetation.world_to_grid(animal.position);
                    if self.vegetation.remove(gx, gy) {
                        self.credit(id, self.config.vegetation.food_value);
                    }
                }
                self.apply_decay(id);
            }
            Action::Eat {
                kind: FoodKind::Corpse { id: corpse_id },
            } => {
                let mut bite = 0.0;
                let mut exhausted = false;
                if let Some(corpse) = self.store.corpse_mut(corpse_id) {
                    if corpse.food_value > 0.0 {
                        bite = corpse.food_value.min(self.config.corpse.bite_size);
                        corpse.food_value -= bite;
                        exhausted = corpse.food_value <= 0.0;
                    }
                }
                if bite > 0.0 {
                    self.credit(id, bite);
                }
                if exhausted {
                    self.store.remove_corpse(corpse_id);
                    events.push(SimEvent::CorpseRemoved { id: corpse_id });
                }
                self.apply_decay(id);
            }
            Action::MoveToFood { target } | Action::MoveToMate { target } | Action::Drift { target } => {
                let speed = self
                    .store
                    .animal(id)
                    .map_or(0.0, |animal| animal.derived.speed);
                let moved = self.relocate(id, target, Some(speed));
                self.debit(id, self.config.movement.move_cost * moved);
                self.apply_decay(id);
            }
            Action::Attack { target } => {
                let attacker = self
                    .store
                    .animal(id)
                    .map(|animal| animal.derived.attack_power);
                let victim = self
                    .store
                    .animal(target)
                    .filter(|animal| !animal.dead && !deaths.contains(&target))
                    .map(|animal| (animal.derived.defense, animal.attributes.base.size));
                if let (Some(attack_power), Some((defense, size))) = (attacker, victim) {
                    if attack_power > defense {
                        self.kill(target, DeathCause::Killed, deaths, events);
                        self.credit(id, size * 10.0);
                    }
                    // Defense held: the prey escapes untouched.
                }
                self.apply_decay(id);
            }
            Action::Reproduce => {
                self.reproduce(id, events);
            }
            Action::Stay => {
                self.apply_decay(id);
            }
        }
    }

    /// Mark an animal dead, drop it from the index, and leave a corpse on
    /// its vegetation tile.
    fn kill(
        &mut self,
        id: AnimalId,
        cause: DeathCause,
        deaths: &mut BTreeSet<AnimalId>,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(snapshot) = self.store.animal(id).filter(|animal| !animal.dead).cloned() else {
            return;
        };
        deaths.insert(id);
        self.store.update_animal(id, |animal| animal.dead = true);
        self.index.remove(id);

        let (gx, gy) = self.vegetation.world_to_grid(snapshot.position);
        let corpse_id = self.store.allocate_corpse_id();
        let corpse = Corpse {
            id: corpse_id,
            source_species: snapshot.species,
            source_id: id,
            position: self.vegetation.grid_to_world(gx, gy),
            source_size: snapshot.attributes.base.size,
            food_value: snapshot.attributes.base.size
                * (snapshot.hunger / self.config.entities.max_hunger)
                * self.config.corpse.food_multiplier,
            decay_timer: self.config.corpse.decay_ticks,
        };
        events.push(SimEvent::AnimalDied {
            animal: snapshot,
            cause,
        });
        events.push(SimEvent::CorpseCreated {
            corpse: corpse.clone(),
        });
        self.store.insert_corpse(corpse);
    }

    /// Spawn the parent's litter (asexual), debit the reproduction cost, and
    /// reset the cooldown. Offspring above the entity cap are skipped.
    fn reproduce(&mut self, id: AnimalId, events: &mut Vec<SimEvent>) {
        let Some(parent) = self.store.animal(id).cloned() else {
            return;
        };
        let litter = parent.attributes.lifecycle.litter_size;
        for _ in 0..litter {
            if self.store.living_count() >= self.config.world.max_entities {
                warn!(
                    parent = %id,
                    max = self.config.world.max_entities,
                    "entity cap reached; offspring skipped"
                );
                break;
            }
            let (attributes, derived) = genetics::offspring(
                &parent.attributes,
                &self.config.evolution,
                &self.config.derived_stats,
                &mut self.rng,
            );
            let offset = self.config.reproduction.offspring_spawn_offset_max;
            let dx = self.rng.range_f64(-offset, offset);
            let dy = self.rng.range_f64(-offset, offset);
            let position = (parent.position + Vec2::new(dx, dy))
                .clamp_to(self.config.world.width, self.config.world.height);
            let child_id = self.store.allocate_animal_id(parent.species);
            let child = Animal {
                id: child_id,
                species: parent.species,
                diet: parent.diet,
                attributes,
                derived,
                position,
                hunger: self.config.entities.initial_hunger_offspring,
                age: 0,
                ticks_since_reproduction: 0,
                dead: false,
                parent: Some(id),
                generation: parent.generation + 1,
            };
            self.index.insert(
                child_id,
                Entry::new(position.x, position.y, attributes.base.size),
            );
            events.push(SimEvent::AnimalBorn {
                animal: child.clone(),
            });
            self.store.insert_animal(child);
        }
        self.debit(
            id,
            self.config.reproduction.cost * self.config.entities.max_hunger,
        );
        self.store
            .update_animal(id, |animal| animal.ticks_since_reproduction = 0);
        self.apply_decay(id);
    }

    /// Move an animal toward `target` (clamped to bounds), optionally capped
    /// at `max_step` world units. Returns the distance actually covered and
    /// keeps the spatial index in sync.
    fn relocate(&mut self, id: AnimalId, target: Vec2, max_step: Option<f64>) -> f64 {
        let width = self.config.world.width;
        let height = self.config.world.height;
        let Some(animal) = self.store.animal_mut(id) else {
            return 0.0;
        };
        let from = animal.position;
        let clamped = target.clamp_to(width, height);
        let distance = from.distance(clamped);
        let destination = match max_step {
            Some(step) if distance > step => from + (clamped - from).normalized() * step,
            _ => clamped,
        };
        animal.position = destination;
        let size = animal.attributes.base.size;
        let moved = from.distance(destination);
        self.index
            .update(id, Entry::new(destination.x, destination.y, size));
        moved
    }

    fn debit(&mut self, id: AnimalId, amount: f64) {
        self.store.update_animal(id, |animal| {
            animal.hunger = (animal.hunger - amount).max(0.0);
        });
    }

    fn credit(&mut self, id: AnimalId, amount: f64) {
        let max_hunger = self.config.entities.max_hunger;
        self.store.update_animal(id, |animal| {
            animal.hunger = (animal.hunger + amount).min(max_hunger);
        });
    }

    fn apply_decay(&mut self, id: AnimalId) {
        self.store.update_animal(id, |animal| {
            animal.hunger = (animal.hunger - animal.derived.hunger_decay_rate).max(0.0);
        });
    }

    /// Tick the corpse decay timers and sweep out anything exhausted.
    fn age_corpses(&mut self, events: &mut Vec<SimEvent>) {
        for corpse_id in self.store.corpse_ids() {
            let exhausted = match self.store.corpse_mut(corpse_id) {
                Some(corpse) => {
                    corpse.decay_timer = corpse.decay_timer.saturating_sub(1);
                    corpse.is_exhausted()
                }
                None => continue,
            };
            if exhausted {
                self.store.remove_corpse(corpse_id);
                events.push(SimEvent::CorpseRemoved { id: corpse_id });
            }
        }
    }

    /// Current tick counter.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Seed this world was built from.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Read-only configuration access.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read-only entity store access.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Read-only vegetation grid access.
    #[must_use]
    pub const fn vegetation(&self) -> &VegetationGrid {
        &self.vegetation
    }

    /// Read-only spatial index access (invariant checks and shells).
    #[must_use]
    pub const fn index(&self) -> &BucketGrid<AnimalId> {
        &self.index
    }

    /// Borrow the PRNG mutably (clone-and-compare determinism harnesses).
    #[must_use]
    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Rounded, id-sorted digest of the whole world for determinism checks.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut animals: Vec<AnimalDigest> = self
            .store
            .living_animals()
            .map(|animal| AnimalDigest {
                id: animal.id.to_string(),
                x: round3(animal.position.x),
                y: round3(animal.position.y),
                hunger: round3(animal.hunger),
                age: animal.age,
            })
            .collect();
        animals.sort_by(|a, b| a.id.cmp(&b.id));
        let corpses: Vec<CorpseDigest> = self
            .store
            .corpses()
            .map(|corpse| CorpseDigest {
                id: corpse.id.to_string(),
                food_value: round3(corpse.food_value),
            })
            .collect();
        WorldSnapshot {
            tick: self.tick.0,
            animal_count: self.store.living_count(),
            corpse_count: self.store.corpse_count(),
            vegetation_count: self.vegetation.count(),
            animals,
            corpses,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

/// Serializable world digest with positions rounded to 1e-3.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub animal_count: usize,
    pub corpse_count: usize,
    pub vegetation_count: usize,
    pub animals: Vec<AnimalDigest>,
    pub corpses: Vec<CorpseDigest>,
}

/// One animal row of a [`WorldSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimalDigest {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub hunger: f64,
    pub age: u32,
}

/// One corpse row of a [`WorldSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpseDigest {
    pub id: String,
    pub food_value: f64,
}
