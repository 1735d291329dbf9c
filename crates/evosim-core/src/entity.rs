//! Animal and corpse records plus the store that exclusively owns them.
//!
//! Every other component addresses entities by id. Ids render as ASCII
//! `"<prefix>_<n>"` with a per-prefix serial that increases monotonically and
//! is never reused, even across generations of offspring.

use crate::attributes::{AttributeSet, DerivedStats};
use crate::math::Vec2;
use crate::species::{Diet, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to parse a rendered entity id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed entity id: {0}")]
pub struct IdParseError(String);

/// Stable handle for a living (or once-living) animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AnimalId {
    species: Species,
    serial: u64,
}

impl AnimalId {
    #[must_use]
    pub const fn new(species: Species, serial: u64) -> Self {
        Self { species, serial }
    }

    #[must_use]
    pub const fn species(self) -> Species {
        self.species
    }

    #[must_use]
    pub const fn serial(self) -> u64 {
        self.serial
    }
}

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.species.prefix(), self.serial)
    }
}

impl From<AnimalId> for String {
    fn from(id: AnimalId) -> Self {
        id.to_string()
    }
}

impl FromStr for AnimalId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, serial) = s
            .rsplit_once('_')
            .ok_or_else(|| IdParseError(s.to_string()))?;
        let species = Species::ALL
            .into_iter()
            .find(|species| species.prefix() == prefix)
            .ok_or_else(|| IdParseError(s.to_string()))?;
        let serial = serial.parse().map_err(|_| IdParseError(s.to_string()))?;
        Ok(Self { species, serial })
    }
}

impl TryFrom<String> for AnimalId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Stable handle for a corpse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CorpseId(u64);

impl CorpseId {
    #[must_use]
    pub const fn new(serial: u64) -> Self {
        Self(serial)
    }

    #[must_use]
    pub const fn serial(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorpseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corpse_{}", self.0)
    }
}

impl From<CorpseId> for String {
    fn from(id: CorpseId) -> Self {
        id.to_string()
    }
}

impl FromStr for CorpseId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let serial = s
            .strip_prefix("corpse_")
            .and_then(|rest| rest.parse().ok())
            .ok_or_else(|| IdParseError(s.to_string()))?;
        Ok(Self(serial))
    }
}

impl TryFrom<String> for CorpseId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A living mobile agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub species: Species,
    pub diet: Diet,
    pub attributes: AttributeSet,
    pub derived: DerivedStats,
    pub position: Vec2,
    pub hunger: f64,
    pub age: u32,
    pub ticks_since_reproduction: u32,
    pub dead: bool,
    pub parent: Option<AnimalId>,
    pub generation: u32,
}

impl Animal {
    /// Hunger as a fraction of the configured maximum.
    #[must_use]
    pub fn hunger_ratio(&self, max_hunger: f64) -> f64 {
        self.hunger / max_hunger
    }

    /// Whether the animal has reached its maturity age.
    #[must_use]
    pub fn is_mature(&self) -> bool {
        self.age >= self.attributes.lifecycle.maturity_age
    }
}

/// An immobile food record left behind by a death.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpse {
    pub id: CorpseId,
    pub source_species: Species,
    pub source_id: AnimalId,
    /// Snapped to the centre of the vegetation tile the animal died on.
    pub position: Vec2,
    pub source_size: f64,
    pub food_value: f64,
    pub decay_timer: u32,
}

impl Corpse {
    /// A corpse disappears once eaten out or timed out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.food_value <= 0.0 || self.decay_timer == 0
    }
}

/// Keyed tables owning every animal and corpse in the world.
#[derive(Debug, Default)]
pub struct EntityStore {
    animals: BTreeMap<AnimalId, Animal>,
    corpses: BTreeMap<CorpseId, Corpse>,
    next_deer_serial: u64,
    next_wolf_serial: u64,
    next_corpse_serial: u64,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id for `species`. Serials persist across offspring
    /// so ids remain unique forever.
    pub fn allocate_animal_id(&mut self, species: Species) -> AnimalId {
        let serial = match species {
            Species::Deer => {
                self.next_deer_serial += 1;
                self.next_deer_serial
            }
            Species::Wolf => {
                self.next_wolf_serial += 1;
                self.next_wolf_serial
            }
        };
        AnimalId::new(species, serial)
    }

    /// Allocate the next corpse id.
    pub fn allocate_corpse_id(&mut self) -> CorpseId {
        self.next_corpse_serial += 1;
        CorpseId::new(self.next_corpse_serial)
    }

    /// Insert a fully constructed animal under its pre-allocated id.
    pub fn insert_animal(&mut self, animal: Animal) {
        debug_assert!(
            !self.animals.contains_key(&animal.id),
            "animal id {} reused",
            animal.id
        );
        self.animals.insert(animal.id, animal);
    }

    /// Insert a fully constructed corpse under its pre-allocated id.
    pub fn insert_corpse(&mut self, corpse: Corpse) {
        debug_assert!(
            !self.corpses.contains_key(&corpse.id),
            "corpse id {} reused",
            corpse.id
        );
        self.corpses.insert(corpse.id, corpse);
    }

    #[must_use]
    pub fn animal(&self, id: AnimalId) -> Option<&Animal> {
        self.animals.get(&id)
    }

    #[must_use]
    pub fn animal_mut(&mut self, id: AnimalId) -> Option<&mut Animal> {
        self.animals.get_mut(&id)
    }

    /// Apply `mutate` to an existing animal. Never creates; returns whether
    /// the animal was present.
    pub fn update_animal(&mut self, id: AnimalId, mutate: impl FnOnce(&mut Animal)) -> bool {
        match self.animals.get_mut(&id) {
            Some(animal) => {
                mutate(animal);
                true
            }
            None => false,
        }
    }

    pub fn remove_animal(&mut self, id: AnimalId) -> Option<Animal> {
        self.animals.remove(&id)
    }

    /// Drop every animal marked dead, returning how many were purged.
    pub fn purge_dead(&mut self) -> usize {
        let before = self.animals.len();
        self.animals.retain(|_, animal| !animal.dead);
        before - self.animals.len()
    }

    /// Living animals in id order.
    pub fn living_animals(&self) -> impl Iterator<Item = &Animal> {
        self.animals.values().filter(|animal| !animal.dead)
    }

    /// Mutable pass over living animals, in id order.
    pub fn living_animals_mut(&mut self) -> impl Iterator<Item = &mut Animal> {
        self.animals.values_mut().filter(|animal| !animal.dead)
    }

    /// Living animals of one species, in id order.
    pub fn animals_by_species(&self, species: Species) -> impl Iterator<Item = &Animal> + '_ {
        self.living_animals()
            .filter(move |animal| animal.species == species)
    }

    #[must_use]
    pub fn living_count(&self) -> usize {
        self.living_animals().count()
    }

    #[must_use]
    pub fn species_count(&self, species: Species) -> usize {
        self.animals_by_species(species).count()
    }

    #[must_use]
    pub fn corpse(&self, id: CorpseId) -> Option<&Corpse> {
        self.corpses.get(&id)
    }

    #[must_use]
    pub fn corpse_mut(&mut self, id: CorpseId) -> Option<&mut Corpse> {
        self.corpses.get_mut(&id)
    }

    pub fn remove_corpse(&mut self, id: CorpseId) -> Option<Corpse> {
        self.corpses.remove(&id)
    }

    /// Corpses in id order.
    pub fn corpses(&self) -> impl Iterator<Item = &Corpse> {
        self.corpses.values()
    }

    /// Corpse ids in id order (for iteration while mutating the table).
    #[must_use]
    pub fn corpse_ids(&self) -> Vec<CorpseId> {
        self.corpses.keys().copied().collect()
    }

    #[must_use]
    pub fn corpse_count(&self) -> usize {
        self.corpses.len()
    }
}
