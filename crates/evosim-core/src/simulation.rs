//! Simulation façade: lifecycle, pacing, events, and snapshot queries.
//!
//! The façade owns the [`World`] outright; shells only ever see cloned
//! snapshots and synchronous events, so nothing outside the core can touch
//! the entity store mid-tick. Wall-clock pacing lives here and never feeds
//! the deterministic substrate: the same seed and the same number of
//! `step()` calls reproduce exactly regardless of real-time scheduling.

use crate::config::{ConfigWarning, SimulationConfig};
use crate::entity::{Animal, AnimalId, Corpse};
use crate::events::{ActionHistorySink, EventBus, EventKind, SimEvent, SubscriptionId};
use crate::math::Vec2;
use crate::species::Species;
use crate::tick::{Tick, World, WorldError, WorldSnapshot};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lower clamp of the speed multiplier.
pub const MIN_SPEED: f64 = 0.1;
/// Upper clamp of the speed multiplier.
pub const MAX_SPEED: f64 = 10.0;

/// One retained per-tick population sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulationSample {
    pub tick: Tick,
    pub deer: usize,
    pub wolf: usize,
    pub vegetation: usize,
    pub corpses: usize,
}

/// Owner of one simulated world plus its shell-facing surfaces.
pub struct Simulation {
    world: World,
    bus: EventBus,
    warnings: Vec<ConfigWarning>,
    original_seed: u32,
    running: bool,
    speed: f64,
    next_due: Option<Instant>,
    history: VecDeque<PopulationSample>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("world", &self.world)
            .field("running", &self.running)
            .field("speed", &self.speed)
            .finish()
    }
}

impl Simulation {
    /// Validate `config` (clamping with warnings) and build the world.
    pub fn new(mut config: SimulationConfig, seed: u32) -> Result<Self, WorldError> {
        let warnings = config.validate();
        let world = World::new(config, seed)?;
        Ok(Self {
            world,
            bus: EventBus::new(),
            warnings,
            original_seed: seed,
            running: false,
            speed: 1.0,
            next_due: None,
            history: VecDeque::new(),
        })
    }

    /// Adjustments applied while validating the construction config.
    #[must_use]
    pub fn validation_warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Run exactly one tick and dispatch its events.
    pub fn step(&mut self) {
        let events = self.world.step();
        self.record_history(&events);
        for event in &events {
            self.bus.emit(event);
        }
    }

    fn record_history(&mut self, events: &[SimEvent]) {
        let Some(SimEvent::Tick {
            tick,
            deer,
            wolf,
            vegetation,
        }) = events.last()
        else {
            return;
        };
        let capacity = self.world.config().performance.history_capacity;
        if self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(PopulationSample {
            tick: *tick,
            deer: *deer,
            wolf: *wolf,
            vegetation: *vegetation,
            corpses: self.world.store().corpse_count(),
        });
    }

    /// Retained population samples, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PopulationSample> {
        self.history.iter()
    }

    /// Begin (or continue) wall-clock driven execution.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.next_due = None;
            self.bus.emit(&SimEvent::Resumed);
        }
    }

    /// Suspend wall-clock execution. Idempotent: `Paused` is emitted only on
    /// the transition.
    pub fn pause(&mut self) {
        if self.running {
            self.running = false;
            self.next_due = None;
            self.bus.emit(&SimEvent::Paused);
        }
    }

    /// Alias of [`Simulation::start`] kept for shell symmetry.
    pub fn resume(&mut self) {
        self.start();
    }

    /// Whether the wall-clock loop is active.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Clamp and apply the speed multiplier.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
    }

    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (self.world.config().ui.tick_rate * self.speed))
    }

    /// Execute every tick owed by wall-clock time up to `now`. Returns how
    /// many ticks ran. The caller (shell) sleeps between calls; the core
    /// never blocks.
    pub fn run_pending(&mut self, now: Instant) -> usize {
        if !self.running {
            return 0;
        }
        let interval = self.tick_interval();
        let mut due = self.next_due.unwrap_or(now);
        let mut executed = 0;
        while due <= now {
            self.step();
            executed += 1;
            due += interval;
        }
        self.next_due = Some(due);
        executed
    }

    /// Rebuild the world from the given seed (or the original construction
    /// seed) and emit `Reset`. Valid at any quiescent boundary.
    pub fn reset(&mut self, seed: Option<u32>) -> Result<(), WorldError> {
        let seed = seed.unwrap_or(self.original_seed);
        let sink = self.world.take_action_history();
        let mut world = World::new(self.world.config().clone(), seed)?;
        world.set_action_history(sink);
        self.world = world;
        self.history.clear();
        self.next_due = None;
        debug!(seed, "simulation reset");
        self.bus.emit(&SimEvent::Reset);
        Ok(())
    }

    /// Subscribe to one event kind.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&SimEvent) + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(kind, handler)
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&mut self, handler: impl FnMut(&SimEvent) + 'static) -> SubscriptionId {
        self.bus.subscribe_all(handler)
    }

    /// Drop a subscription; returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Install the per-action history sink.
    pub fn set_action_history(&mut self, sink: Box<dyn ActionHistorySink>) {
        self.world.set_action_history(sink);
    }

    // --- snapshot queries -------------------------------------------------

    /// Clones of every living animal, id order.
    #[must_use]
    pub fn living_animals(&self) -> Vec<Animal> {
        self.world.store().living_animals().cloned().collect()
    }

    /// Clones of living animals of one species, id order.
    #[must_use]
    pub fn animals_by_species(&self, species: Species) -> Vec<Animal> {
        self.world
            .store()
            .animals_by_species(species)
            .cloned()
            .collect()
    }

    /// Clones of every corpse, id order.
    #[must_use]
    pub fn corpses(&self) -> Vec<Corpse> {
        self.world.store().corpses().cloned().collect()
    }

    /// World-space centres of occupied vegetation cells.
    #[must_use]
    pub fn vegetation_positions(&self) -> Vec<Vec2> {
        self.world.vegetation().positions()
    }

    #[must_use]
    pub fn deer_count(&self) -> usize {
        self.world.store().species_count(Species::Deer)
    }

    #[must_use]
    pub fn wolf_count(&self) -> usize {
        self.world.store().species_count(Species::Wolf)
    }

    #[must_use]
    pub fn vegetation_count(&self) -> usize {
        self.world.vegetation().count()
    }

    #[must_use]
    pub const fn current_tick(&self) -> Tick {
        self.world.tick()
    }

    /// Seed of the currently running world.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.world.seed()
    }

    /// Rounded, id-sorted world digest for determinism harnesses.
    #[must_use]
    pub fn world_snapshot(&self) -> WorldSnapshot {
        self.world.snapshot()
    }

    /// Read-only access to the underlying world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    // --- mutation entry points -------------------------------------------

    /// Insert one animal of `species` at `position` (clamped, cap-checked).
    pub fn spawn_animal(
        &mut self,
        species: Species,
        position: Vec2,
    ) -> Result<AnimalId, WorldError> {
        self.world.spawn_animal(species, position)
    }

    /// Overwrite an animal's age. Returns whether the animal exists.
    pub fn set_animal_age(&mut self, id: AnimalId, age: u32) -> bool {
        self.world.set_animal_age(id, age)
    }
}
