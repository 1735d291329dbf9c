//! Evolvable attribute schema and the derived-stat formulas.
//!
//! Attributes split into three categories with independent mutation rates;
//! every field carries a declared `[min, max]`. Derived stats are a pure
//! function of the base attributes and configuration, recomputed whenever a
//! base attribute changes, never stored as independent truth.

use crate::config::DerivedStatsSettings;
use serde::{Deserialize, Serialize};

pub const STRENGTH_BOUNDS: (f64, f64) = (1.0, 20.0);
pub const AGILITY_BOUNDS: (f64, f64) = (1.0, 20.0);
pub const ENDURANCE_BOUNDS: (f64, f64) = (1.0, 20.0);
pub const PERCEPTION_BOUNDS: (f64, f64) = (1.0, 20.0);
pub const SIZE_BOUNDS: (f64, f64) = (0.3, 3.0);

pub const AGGRESSION_BOUNDS: (f64, f64) = (0.0, 1.0);
pub const FLIGHT_INSTINCT_BOUNDS: (f64, f64) = (0.0, 1.0);
pub const CARRION_PREFERENCE_BOUNDS: (f64, f64) = (0.0, 1.0);
pub const FOOD_PRIORITY_THRESHOLD_BOUNDS: (f64, f64) = (0.1, 0.9);
pub const REPRODUCTIVE_URGE_BOUNDS: (f64, f64) = (0.1, 0.9);

pub const MAX_AGE_BOUNDS: (f64, f64) = (50.0, 2_000.0);
pub const MATURITY_AGE_BOUNDS: (f64, f64) = (10.0, 500.0);
pub const LITTER_SIZE_BOUNDS: (f64, f64) = (1.0, 4.0);

/// Physical traits feeding the derived-stat formulas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseAttributes {
    pub strength: f64,
    pub agility: f64,
    pub endurance: f64,
    pub perception: f64,
    pub size: f64,
}

impl BaseAttributes {
    /// Clamp every field into its declared bounds.
    pub fn clamp_to_bounds(&mut self) {
        self.strength = self.strength.clamp(STRENGTH_BOUNDS.0, STRENGTH_BOUNDS.1);
        self.agility = self.agility.clamp(AGILITY_BOUNDS.0, AGILITY_BOUNDS.1);
        self.endurance = self.endurance.clamp(ENDURANCE_BOUNDS.0, ENDURANCE_BOUNDS.1);
        self.perception = self
            .perception
            .clamp(PERCEPTION_BOUNDS.0, PERCEPTION_BOUNDS.1);
        self.size = self.size.clamp(SIZE_BOUNDS.0, SIZE_BOUNDS.1);
    }
}

/// Behavioural dispositions steering the decision ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorAttributes {
    pub aggression: f64,
    pub flight_instinct: f64,
    pub carrion_preference: f64,
    pub food_priority_threshold: f64,
    pub reproductive_urge: f64,
}

impl BehaviorAttributes {
    pub fn clamp_to_bounds(&mut self) {
        self.aggression = self
            .aggression
            .clamp(AGGRESSION_BOUNDS.0, AGGRESSION_BOUNDS.1);
        self.flight_instinct = self
            .flight_instinct
            .clamp(FLIGHT_INSTINCT_BOUNDS.0, FLIGHT_INSTINCT_BOUNDS.1);
        self.carrion_preference = self
            .carrion_preference
            .clamp(CARRION_PREFERENCE_BOUNDS.0, CARRION_PREFERENCE_BOUNDS.1);
        self.food_priority_threshold = self.food_priority_threshold.clamp(
            FOOD_PRIORITY_THRESHOLD_BOUNDS.0,
            FOOD_PRIORITY_THRESHOLD_BOUNDS.1,
        );
        self.reproductive_urge = self
            .reproductive_urge
            .clamp(REPRODUCTIVE_URGE_BOUNDS.0, REPRODUCTIVE_URGE_BOUNDS.1);
    }
}

/// Ageing and litter schedule. Integer-valued; mutation rounds after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleAttributes {
    pub max_age: u32,
    pub maturity_age: u32,
    pub litter_size: u8,
}

impl LifecycleAttributes {
    /// Clamp fields into bounds and re-enforce `maturity_age < max_age`.
    pub fn clamp_to_bounds(&mut self) {
        self.max_age = (self.max_age as f64)
            .clamp(MAX_AGE_BOUNDS.0, MAX_AGE_BOUNDS.1)
            .round() as u32;
        self.maturity_age = (self.maturity_age as f64)
            .clamp(MATURITY_AGE_BOUNDS.0, MATURITY_AGE_BOUNDS.1)
            .round() as u32;
        self.litter_size = (self.litter_size as f64)
            .clamp(LITTER_SIZE_BOUNDS.0, LITTER_SIZE_BOUNDS.1)
            .round() as u8;
        if self.maturity_age >= self.max_age {
            self.maturity_age = self.max_age - 1;
        }
    }
}

/// Full evolvable genome of one animal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub base: BaseAttributes,
    pub behavior: BehaviorAttributes,
    pub lifecycle: LifecycleAttributes,
}

impl AttributeSet {
    pub fn clamp_to_bounds(&mut self) {
        self.base.clamp_to_bounds();
        self.behavior.clamp_to_bounds();
        self.lifecycle.clamp_to_bounds();
    }

    /// Simple fitness score used by mate ranking.
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.base.strength + self.base.agility + self.base.endurance
    }
}

/// Stats recomputed from base attributes; see [`DerivedStats::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    /// World units covered per tick.
    pub speed: f64,
    /// Radius within which other entities are perceived.
    pub alert_range: f64,
    /// Offensive score compared against a target's defense.
    pub attack_power: f64,
    /// Defensive score; also divides perceived threat.
    pub defense: f64,
    /// Hunger lost per tick.
    pub hunger_decay_rate: f64,
}

impl DerivedStats {
    /// Evaluate the derived-stat formulas for `base` under `settings`.
    #[must_use]
    pub fn compute(base: &BaseAttributes, settings: &DerivedStatsSettings) -> Self {
        let speed = base.agility * base.size.powf(-0.5) * settings.speed_multiplier;
        Self {
            speed,
            alert_range: base.perception * settings.perception_multiplier,
            attack_power: base.strength * base.size.sqrt(),
            defense: base.size * (1.0 + 0.3 * base.agility),
            hunger_decay_rate: settings.base_hunger_decay * (base.size + 0.3 * speed)
                / base.endurance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_base() -> BaseAttributes {
        BaseAttributes {
            strength: 10.0,
            agility: 10.0,
            endurance: 10.0,
            perception: 8.0,
            size: 1.0,
        }
    }

    #[test]
    fn derived_formulas_match_definition() {
        let settings = DerivedStatsSettings {
            speed_multiplier: 0.5,
            perception_multiplier: 10.0,
            base_hunger_decay: 1.0,
        };
        let derived = DerivedStats::compute(&sample_base(), &settings);
        assert!((derived.speed - 5.0).abs() < 1e-12);
        assert!((derived.alert_range - 80.0).abs() < 1e-12);
        assert!((derived.attack_power - 10.0).abs() < 1e-12);
        assert!((derived.defense - 4.0).abs() < 1e-12);
        assert!((derived.hunger_decay_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn size_discounts_speed_and_boosts_attack() {
        let settings = DerivedStatsSettings {
            speed_multiplier: 1.0,
            perception_multiplier: 1.0,
            base_hunger_decay: 1.0,
        };
        let mut big = sample_base();
        big.size = 2.25;
        let small = DerivedStats::compute(&sample_base(), &settings);
        let large = DerivedStats::compute(&big, &settings);
        assert!(large.speed < small.speed);
        assert!(large.attack_power > small.attack_power);
        assert!(large.defense > small.defense);
    }

    #[test]
    fn clamp_enforces_bounds_and_maturity_rule() {
        let mut attrs = AttributeSet {
            base: BaseAttributes {
                strength: 0.0,
                agility: 50.0,
                endurance: 5.0,
                perception: 5.0,
                size: 10.0,
            },
            behavior: BehaviorAttributes {
                aggression: 1.8,
                flight_instinct: -0.2,
                carrion_preference: 0.5,
                food_priority_threshold: 0.95,
                reproductive_urge: 0.01,
            },
            lifecycle: LifecycleAttributes {
                max_age: 60,
                maturity_age: 400,
                litter_size: 9,
            },
        };
        attrs.clamp_to_bounds();
        assert_eq!(attrs.base.strength, 1.0);
        assert_eq!(attrs.base.agility, 20.0);
        assert_eq!(attrs.base.size, 3.0);
        assert_eq!(attrs.behavior.aggression, 1.0);
        assert_eq!(attrs.behavior.flight_instinct, 0.0);
        assert_eq!(attrs.behavior.food_priority_threshold, 0.9);
        assert_eq!(attrs.behavior.reproductive_urge, 0.1);
        assert_eq!(attrs.lifecycle.litter_size, 4);
        assert!(attrs.lifecycle.maturity_age < attrs.lifecycle.max_age);
        assert_eq!(attrs.lifecycle.maturity_age, 59);
    }

    #[test]
    fn fitness_sums_physical_scores() {
        let attrs = AttributeSet {
            base: sample_base(),
            behavior: BehaviorAttributes {
                aggression: 0.5,
                flight_instinct: 0.5,
                carrion_preference: 0.5,
                food_priority_threshold: 0.5,
                reproductive_urge: 0.5,
            },
            lifecycle: LifecycleAttributes {
                max_age: 1_000,
                maturity_age: 100,
                litter_size: 2,
            },
        };
        assert_eq!(attrs.fitness(), 30.0);
    }
}
