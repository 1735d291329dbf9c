//! Asexual inheritance with clamped multiplicative mutation.
//!
//! Offspring copy the sole parent's attribute vectors, then every numeric
//! attribute mutates as `v * (1 + N(0, rate))`, clamped into its declared
//! bounds. Attribute order inside each category is declaration order, and a
//! draw happens for every attribute even at rate zero, so the stream shape
//! never depends on configuration. Derived stats are recomputed from the
//! final mutated base, never copied.

use crate::attributes::{
    AGGRESSION_BOUNDS, AGILITY_BOUNDS, AttributeSet, CARRION_PREFERENCE_BOUNDS, DerivedStats,
    ENDURANCE_BOUNDS, FLIGHT_INSTINCT_BOUNDS, FOOD_PRIORITY_THRESHOLD_BOUNDS, LITTER_SIZE_BOUNDS,
    MATURITY_AGE_BOUNDS, MAX_AGE_BOUNDS, PERCEPTION_BOUNDS, REPRODUCTIVE_URGE_BOUNDS, SIZE_BOUNDS,
    STRENGTH_BOUNDS,
};
use crate::config::{DerivedStatsSettings, EvolutionSettings};
use crate::rng::SimRng;

/// Copy the parent's genome unchanged.
#[must_use]
pub fn inherit(parent: &AttributeSet) -> AttributeSet {
    *parent
}

fn mutate_value(value: f64, rate: f64, bounds: (f64, f64), rng: &mut SimRng) -> f64 {
    let m = rng.normal(0.0, rate);
    (value * (1.0 + m)).clamp(bounds.0, bounds.1)
}

fn mutate_integer(value: u32, rate: f64, bounds: (f64, f64), rng: &mut SimRng) -> u32 {
    mutate_value(f64::from(value), rate, bounds, rng).round() as u32
}

/// Mutate every attribute in place. Consumes exactly 13 normal draws:
/// 5 base, 5 behavioural, 3 lifecycle, in declaration order.
pub fn mutate(attrs: &mut AttributeSet, rates: &EvolutionSettings, rng: &mut SimRng) {
    let rate = rates.base_mutation_rate;
    let base = &mut attrs.base;
    base.strength = mutate_value(base.strength, rate, STRENGTH_BOUNDS, rng);
    base.agility = mutate_value(base.agility, rate, AGILITY_BOUNDS, rng);
    base.endurance = mutate_value(base.endurance, rate, ENDURANCE_BOUNDS, rng);
    base.perception = mutate_value(base.perception, rate, PERCEPTION_BOUNDS, rng);
    base.size = mutate_value(base.size, rate, SIZE_BOUNDS, rng);

    let rate = rates.behavioral_mutation_rate;
    let behavior = &mut attrs.behavior;
    behavior.aggression = mutate_value(behavior.aggression, rate, AGGRESSION_BOUNDS, rng);
    behavior.flight_instinct =
        mutate_value(behavior.flight_instinct, rate, FLIGHT_INSTINCT_BOUNDS, rng);
    behavior.carrion_preference = mutate_value(
        behavior.carrion_preference,
        rate,
        CARRION_PREFERENCE_BOUNDS,
        rng,
    );
    behavior.food_priority_threshold = mutate_value(
        behavior.food_priority_threshold,
        rate,
        FOOD_PRIORITY_THRESHOLD_BOUNDS,
        rng,
    );
    behavior.reproductive_urge = mutate_value(
        behavior.reproductive_urge,
        rate,
        REPRODUCTIVE_URGE_BOUNDS,
        rng,
    );

    let rate = rates.lifecycle_mutation_rate;
    let lifecycle = &mut attrs.lifecycle;
    lifecycle.max_age = mutate_integer(lifecycle.max_age, rate, MAX_AGE_BOUNDS, rng);
    lifecycle.maturity_age = mutate_integer(lifecycle.maturity_age, rate, MATURITY_AGE_BOUNDS, rng);
    lifecycle.litter_size =
        mutate_value(f64::from(lifecycle.litter_size), rate, LITTER_SIZE_BOUNDS, rng).round() as u8;
    if lifecycle.maturity_age >= lifecycle.max_age {
        lifecycle.maturity_age = lifecycle.max_age - 1;
    }
}

/// Inherit, mutate, and recompute derived stats for one offspring.
#[must_use]
pub fn offspring(
    parent: &AttributeSet,
    rates: &EvolutionSettings,
    derived_settings: &DerivedStatsSettings,
    rng: &mut SimRng,
) -> (AttributeSet, DerivedStats) {
    let mut attrs = inherit(parent);
    mutate(&mut attrs, rates, rng);
    let derived = DerivedStats::compute(&attrs.base, derived_settings);
    (attrs, derived)
}
