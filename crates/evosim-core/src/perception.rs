//! Read-only perception over the decision-phase world view.
//!
//! A [`PerceptionView`] is assembled once per animal per tick from the
//! spatial index, the corpse table, and the vegetation grid; every finder
//! here observes that frozen state and mutates nothing. Ties always resolve
//! by distance first, then id, so results are independent of hash ordering.

use crate::config::SimulationConfig;
use crate::entity::{Animal, Corpse, EntityStore};
use crate::math::Vec2;
use crate::rng::SimRng;
use crate::vegetation::VegetationGrid;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// One perceived neighbour: a living animal within the observer's alert range.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub animal: &'a Animal,
    pub distance: f64,
}

/// Frozen view of the world as one animal perceives it.
pub struct PerceptionView<'a> {
    pub observer: &'a Animal,
    /// Living neighbours within alert range, sorted by distance then id.
    pub neighbors: Vec<Observation<'a>>,
    pub store: &'a EntityStore,
    pub vegetation: &'a VegetationGrid,
    pub config: &'a SimulationConfig,
}

/// A selected food target, captured with everything execution needs.
#[derive(Debug, Clone, Copy)]
pub enum FoodTarget<'a> {
    Vegetation { cell: (usize, usize), position: Vec2 },
    Corpse(&'a Corpse),
    Prey { animal: &'a Animal, distance: f64 },
}

/// Whether an animal can currently reproduce: mature, cooled down, and fed
/// above the litter-scaled threshold.
#[must_use]
pub fn is_reproduction_ready(animal: &Animal, config: &SimulationConfig) -> bool {
    let gate = (config.reproduction.cost * f64::from(animal.attributes.lifecycle.litter_size)
        + config.reproduction.safety_buffer)
        * config.entities.max_hunger;
    animal.is_mature()
        && animal.hunger > gate
        && animal.ticks_since_reproduction >= config.reproduction.cooldown
}

impl<'a> PerceptionView<'a> {
    /// Neighbours whose perceived threat exceeds the observer's tolerance,
    /// sorted by distance ascending, ties by id.
    #[must_use]
    pub fn threats(&self) -> Vec<Observation<'a>> {
        let defense = self.observer.derived.defense;
        let tolerance = 1.0 - self.observer.attributes.behavior.flight_instinct;
        self.neighbors
            .iter()
            .filter(|obs| {
                let other = obs.animal;
                if defense <= 0.0 {
                    // Zero defense perceives every armed neighbour as infinite threat.
                    return other.derived.attack_power * other.attributes.behavior.aggression > 0.0;
                }
                let perceived =
                    other.derived.attack_power * other.attributes.behavior.aggression / defense;
                perceived > tolerance
            })
            .copied()
            .collect()
    }

    /// Weighted repulsion away from `threats`, normalised. A zero total
    /// (e.g. perfectly symmetric threats) yields the zero vector and the
    /// caller falls back to idling.
    #[must_use]
    pub fn flee_vector(&self, threats: &[Observation<'a>]) -> Vec2 {
        let mut total = Vec2::ZERO;
        for obs in threats {
            let away = self.observer.position - obs.animal.position;
            total = total + away * (1.0 / obs.distance.max(1.0));
        }
        total.normalized()
    }

    /// Closest occupied vegetation cell within alert range.
    #[must_use]
    pub fn nearest_vegetation(&self) -> Option<(usize, usize)> {
        self.vegetation
            .nearest_occupied(self.observer.position, self.observer.derived.alert_range)
    }

    /// Closest corpse with food left within alert range; ties by id.
    #[must_use]
    pub fn nearest_corpse(&self) -> Option<&'a Corpse> {
        let mut best: Option<(&Corpse, f64)> = None;
        for corpse in self.store.corpses() {
            if corpse.food_value <= 0.0 {
                continue;
            }
            let dist = self.observer.position.distance(corpse.position);
            if dist > self.observer.derived.alert_range {
                continue;
            }
            // Corpse iteration is id-ordered, so strict less keeps the lowest id.
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((corpse, dist));
            }
        }
        best.map(|(corpse, _)| corpse)
    }

    /// Closest animal of another, non-hunting species. Hunters never read
    /// each other as prey.
    #[must_use]
    pub fn nearest_prey(&self) -> Option<Observation<'a>> {
        self.neighbors
            .iter()
            .find(|obs| {
                obs.animal.species != self.observer.species && !obs.animal.diet.eats_animals
            })
            .copied()
    }

    /// Top-level food choice for the observer's diet. When a corpse-eating
    /// hunter sees both prey and carrion, one draw decides: carrion iff
    /// `u < carrion_preference`.
    pub fn choose_food(&self, rng: &mut SimRng) -> Option<FoodTarget<'a>> {
        let diet = self.observer.diet;
        let prey = diet.eats_animals.then(|| self.nearest_prey()).flatten();
        let corpse = diet.eats_corpses.then(|| self.nearest_corpse()).flatten();

        match (prey, corpse) {
            (Some(prey), Some(corpse)) => {
                if rng.chance(self.observer.attributes.behavior.carrion_preference) {
                    Some(FoodTarget::Corpse(corpse))
                } else {
                    Some(FoodTarget::Prey {
                        animal: prey.animal,
                        distance: prey.distance,
                    })
                }
            }
            (Some(prey), None) => Some(FoodTarget::Prey {
                animal: prey.animal,
                distance: prey.distance,
            }),
            (None, Some(corpse)) => Some(FoodTarget::Corpse(corpse)),
            (None, None) => {
                if diet.eats_vegetation {
                    self.nearest_vegetation().map(|cell| FoodTarget::Vegetation {
                        cell,
                        position: self.vegetation.grid_to_world(cell.0, cell.1),
                    })
                } else {
                    None
                }
            }
        }
    }

    /// Best candidate mate: same species, reproduction-ready, ranked by
    /// fitness descending then distance ascending.
    #[must_use]
    pub fn best_mate(&self) -> Option<&'a Animal> {
        let mut candidates: Vec<&Observation<'a>> = self
            .neighbors
            .iter()
            .filter(|obs| {
                obs.animal.species == self.observer.species
                    && is_reproduction_ready(obs.animal, self.config)
            })
            .collect();
        candidates.sort_by_key(|obs| {
            (
                Reverse(OrderedFloat(obs.animal.attributes.fitness())),
                OrderedFloat(obs.distance),
                obs.animal.id,
            )
        });
        candidates.first().map(|obs| obs.animal)
    }
}
