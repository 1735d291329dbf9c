//! Species tags, diet flags, and baseline genomes.
//!
//! Per-species differences are data, not code: one decision rule and one
//! tick executor serve both species, parameterised by the diet flags and the
//! baseline attribute table below.

use crate::attributes::{
    AttributeSet, BaseAttributes, BehaviorAttributes, LifecycleAttributes,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two simulated species.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Deer,
    Wolf,
}

impl Species {
    pub const ALL: [Self; 2] = [Self::Deer, Self::Wolf];

    /// Stable ASCII prefix used in entity ids.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Deer => "deer",
            Self::Wolf => "wolf",
        }
    }

    /// Species-level diet flags. Not evolvable.
    #[must_use]
    pub const fn diet(self) -> Diet {
        match self {
            Self::Deer => Diet {
                eats_vegetation: true,
                eats_animals: false,
                eats_corpses: false,
            },
            Self::Wolf => Diet {
                eats_vegetation: false,
                eats_animals: true,
                eats_corpses: true,
            },
        }
    }

    /// Attribute vector assigned to animals spawned at initialisation.
    #[must_use]
    pub fn baseline(self) -> AttributeSet {
        match self {
            Self::Deer => AttributeSet {
                base: BaseAttributes {
                    strength: 5.0,
                    agility: 10.0,
                    endurance: 10.0,
                    perception: 8.0,
                    size: 1.0,
                },
                behavior: BehaviorAttributes {
                    aggression: 0.1,
                    flight_instinct: 0.8,
                    carrion_preference: 0.1,
                    food_priority_threshold: 0.5,
                    reproductive_urge: 0.5,
                },
                lifecycle: LifecycleAttributes {
                    max_age: 1_000,
                    maturity_age: 50,
                    litter_size: 2,
                },
            },
            Self::Wolf => AttributeSet {
                base: BaseAttributes {
                    strength: 12.0,
                    agility: 12.0,
                    endurance: 8.0,
                    perception: 12.0,
                    size: 1.3,
                },
                behavior: BehaviorAttributes {
                    aggression: 0.8,
                    flight_instinct: 0.2,
                    carrion_preference: 0.4,
                    food_priority_threshold: 0.4,
                    reproductive_urge: 0.4,
                },
                lifecycle: LifecycleAttributes {
                    max_age: 800,
                    maturity_age: 80,
                    litter_size: 2,
                },
            },
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// What a species can eat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diet {
    pub eats_vegetation: bool,
    pub eats_animals: bool,
    pub eats_corpses: bool,
}
