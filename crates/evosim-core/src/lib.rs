//! Deterministic ecosystem simulation kernel for Evolution Sandbox.
//!
//! A tick-driven predator/prey world on a bounded 2-D plane: deer graze a
//! boolean vegetation grid, wolves hunt and scavenge, and every animal runs
//! the same priority-ladder decision rule parameterised by its evolvable
//! attributes. Given the same seed and configuration the simulation replays
//! bit-for-bit; all randomness flows through one explicitly threaded
//! [`rng::SimRng`] stream.
//!
//! Shells drive the kernel through [`Simulation`]: step or pace the world,
//! subscribe to events, and read cloned snapshots. Nothing outside this
//! crate can reach the entity store mid-tick.

pub mod attributes;
pub mod config;
pub mod decision;
pub mod entity;
pub mod events;
pub mod genetics;
pub mod math;
pub mod perception;
pub mod rng;
pub mod simulation;
pub mod species;
pub mod tick;
pub mod vegetation;

pub use attributes::{AttributeSet, BaseAttributes, BehaviorAttributes, DerivedStats, LifecycleAttributes};
pub use config::{ConfigDocument, ConfigWarning, Preset, SimulationConfig};
pub use decision::{Action, DeathCause, FoodKind};
pub use entity::{Animal, AnimalId, Corpse, CorpseId, EntityStore};
pub use events::{ActionHistorySink, EventBus, EventKind, NullActionHistory, SimEvent, SubscriptionId};
pub use math::Vec2;
pub use perception::{FoodTarget, Observation, PerceptionView};
pub use rng::SimRng;
pub use simulation::{MAX_SPEED, MIN_SPEED, PopulationSample, Simulation};
pub use species::{Diet, Species};
pub use tick::{Tick, World, WorldError, WorldSnapshot};
pub use vegetation::VegetationGrid;

// Re-exported so shells can inspect the spatial index without a direct
// dependency on the index crate.
pub use evosim_index::{BucketGrid, Entry as IndexEntry, IndexError};

/// Build a simulation from a configuration and seed. Thin constructor kept
/// as the stable shell-facing entry point.
pub fn create_simulation(config: SimulationConfig, seed: u32) -> Result<Simulation, WorldError> {
    Simulation::new(config, seed)
}
