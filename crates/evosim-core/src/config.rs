//! Typed simulation parameters, bounds enforcement, presets, and the
//! partial-document importer used by shells.
//!
//! Validation never rejects a configuration: every field is clamped into its
//! declared range and the caller receives the list of adjustments as
//! warnings (spec'd failure model: configuration problems are warnings, not
//! errors).

use crate::attributes::PERCEPTION_BOUNDS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// World extents and initial population.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldSettings {
    /// Width of the world in world units.
    pub width: f64,
    /// Height of the world in world units.
    pub height: f64,
    /// Hard cap on simultaneously living animals.
    pub max_entities: usize,
    /// Deer spawned at initialisation.
    pub initial_deer_count: usize,
    /// Wolves spawned at initialisation.
    pub initial_wolf_count: usize,
    /// Minimum pairwise distance between initial spawn positions.
    pub initial_spawn_min_distance: f64,
}

/// Vegetation grid parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VegetationSettings {
    /// Side length of one vegetation tile in world units.
    pub tile_size: f64,
    /// Probability that a cell starts occupied.
    pub initial_density: f64,
    /// Per-neighbour Bernoulli probability during spread.
    pub spread_rate: f64,
    /// Hunger restored by eating one tile.
    pub food_value: f64,
}

/// Hunger envelope for living animals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntitySettings {
    /// Upper bound of the hunger gauge.
    pub max_hunger: f64,
    /// Hunger assigned to animals spawned at initialisation.
    pub initial_hunger_spawn: f64,
    /// Hunger assigned to newborn offspring.
    pub initial_hunger_offspring: f64,
}

/// Coefficients of the derived-stat formulas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedStatsSettings {
    /// Scales agility into world-units-per-tick speed.
    pub speed_multiplier: f64,
    /// Scales perception into the alert radius.
    pub perception_multiplier: f64,
    /// Baseline of the hunger decay formula.
    pub base_hunger_decay: f64,
}

/// Movement energy costs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementSettings {
    /// Hunger debited per world unit moved.
    pub move_cost: f64,
    /// Additional per-unit tax while fleeing.
    pub flee_cost_bonus: f64,
}

/// Reproduction gating and costs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReproductionSettings {
    /// Fraction of max hunger debited per reproduction.
    pub cost: f64,
    /// Extra hunger fraction required before reproducing.
    pub safety_buffer: f64,
    /// Ticks between reproductions.
    pub cooldown: u32,
    /// Offspring spawn jitter per axis.
    pub offspring_spawn_offset_max: f64,
}

/// Mutation magnitudes per attribute category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionSettings {
    pub base_mutation_rate: f64,
    pub behavioral_mutation_rate: f64,
    pub lifecycle_mutation_rate: f64,
}

/// Corpse bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpseSettings {
    /// Ticks before an uneaten corpse disappears.
    pub decay_ticks: u32,
    /// Scales source size and satiation into food value.
    pub food_multiplier: f64,
    /// Most food transferable from a corpse per tick.
    pub bite_size: f64,
}

/// Spatial index and history sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSettings {
    /// Side length of one spatial index bucket.
    pub spatial_bucket_size: f64,
    /// Tick summaries retained for shells.
    pub history_capacity: usize,
}

/// Pacing knobs consumed by the wall-clock scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiSettings {
    /// Baseline ticks per second at speed 1.0.
    pub tick_rate: f64,
}

/// Complete parameter bundle for one simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub world: WorldSettings,
    pub vegetation: VegetationSettings,
    pub entities: EntitySettings,
    pub derived_stats: DerivedStatsSettings,
    pub movement: MovementSettings,
    pub reproduction: ReproductionSettings,
    pub evolution: EvolutionSettings,
    pub corpse: CorpseSettings,
    pub performance: PerformanceSettings,
    pub ui: UiSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: WorldSettings {
                width: 800.0,
                height: 800.0,
                max_entities: 1_000,
                initial_deer_count: 20,
                initial_wolf_count: 5,
                initial_spawn_min_distance: 5.0,
            },
            vegetation: VegetationSettings {
                tile_size: 10.0,
                initial_density: 0.25,
                spread_rate: 0.01,
                food_value: 30.0,
            },
            entities: EntitySettings {
                max_hunger: 100.0,
                initial_hunger_spawn: 65.0,
                initial_hunger_offspring: 50.0,
            },
            derived_stats: DerivedStatsSettings {
                speed_multiplier: 0.5,
                perception_multiplier: 10.0,
                base_hunger_decay: 1.0,
            },
            movement: MovementSettings {
                move_cost: 0.05,
                flee_cost_bonus: 0.05,
            },
            reproduction: ReproductionSettings {
                cost: 0.2,
                safety_buffer: 0.1,
                cooldown: 40,
                offspring_spawn_offset_max: 10.0,
            },
            evolution: EvolutionSettings {
                base_mutation_rate: 0.05,
                behavioral_mutation_rate: 0.05,
                lifecycle_mutation_rate: 0.05,
            },
            corpse: CorpseSettings {
                decay_ticks: 300,
                food_multiplier: 20.0,
                bite_size: 20.0,
            },
            performance: PerformanceSettings {
                spatial_bucket_size: 200.0,
                history_capacity: 256,
            },
            ui: UiSettings { tick_rate: 10.0 },
        }
    }
}

/// The largest cross-field rule allows for `cost + safety_buffer`.
const REPRODUCTION_GATE_CEILING: f64 = 0.95;

/// One adjustment applied while validating a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigWarning {
    /// Dotted path of the offending field, e.g. `world.width`.
    pub path: String,
    /// Human-readable description of the adjustment.
    pub message: String,
}

impl ConfigWarning {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn clamp_f64(value: &mut f64, path: &str, min: f64, max: f64, warnings: &mut Vec<ConfigWarning>) {
    if !value.is_finite() {
        warnings.push(ConfigWarning::new(
            path,
            format!("non-finite value replaced with {min}"),
        ));
        *value = min;
        return;
    }
    let clamped = value.clamp(min, max);
    if clamped != *value {
        warnings.push(ConfigWarning::new(
            path,
            format!("{value} clamped into [{min}, {max}]"),
        ));
        *value = clamped;
    }
}

fn clamp_u32(value: &mut u32, path: &str, min: u32, max: u32, warnings: &mut Vec<ConfigWarning>) {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        warnings.push(ConfigWarning::new(
            path,
            format!("{value} clamped into [{min}, {max}]"),
        ));
        *value = clamped;
    }
}

fn clamp_usize(
    value: &mut usize,
    path: &str,
    min: usize,
    max: usize,
    warnings: &mut Vec<ConfigWarning>,
) {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        warnings.push(ConfigWarning::new(
            path,
            format!("{value} clamped into [{min}, {max}]"),
        ));
        *value = clamped;
    }
}

impl SimulationConfig {
    /// Clamp every field into its declared range and apply the cross-field
    /// rules, returning the adjustments made. The configuration is always
    /// usable afterwards.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut w = Vec::new();

        clamp_f64(&mut self.world.width, "world.width", 50.0, 5_000.0, &mut w);
        clamp_f64(
            &mut self.world.height,
            "world.height",
            50.0,
            5_000.0,
            &mut w,
        );
        clamp_usize(
            &mut self.world.max_entities,
            "world.max_entities",
            10,
            10_000,
            &mut w,
        );
        clamp_usize(
            &mut self.world.initial_deer_count,
            "world.initial_deer_count",
            0,
            1_000,
            &mut w,
        );
        clamp_usize(
            &mut self.world.initial_wolf_count,
            "world.initial_wolf_count",
            0,
            1_000,
            &mut w,
        );
        clamp_f64(
            &mut self.world.initial_spawn_min_distance,
            "world.initial_spawn_min_distance",
            0.0,
            100.0,
            &mut w,
        );

        clamp_f64(
            &mut self.vegetation.tile_size,
            "vegetation.tile_size",
            1.0,
            100.0,
            &mut w,
        );
        clamp_f64(
            &mut self.vegetation.initial_density,
            "vegetation.initial_density",
            0.0,
            1.0,
            &mut w,
        );
        clamp_f64(
            &mut self.vegetation.spread_rate,
            "vegetation.spread_rate",
            0.0,
            1.0,
            &mut w,
        );
        clamp_f64(
            &mut self.vegetation.food_value,
            "vegetation.food_value",
            1.0,
            100.0,
            &mut w,
        );

        clamp_f64(
            &mut self.entities.max_hunger,
            "entities.max_hunger",
            10.0,
            1_000.0,
            &mut w,
        );
        clamp_f64(
            &mut self.entities.initial_hunger_spawn,
            "entities.initial_hunger_spawn",
            1.0,
            self.entities.max_hunger,
            &mut w,
        );
        clamp_f64(
            &mut self.entities.initial_hunger_offspring,
            "entities.initial_hunger_offspring",
            1.0,
            self.entities.max_hunger,
            &mut w,
        );

        clamp_f64(
            &mut self.derived_stats.speed_multiplier,
            "derived_stats.speed_multiplier",
            0.05,
            5.0,
            &mut w,
        );
        clamp_f64(
            &mut self.derived_stats.perception_multiplier,
            "derived_stats.perception_multiplier",
            1.0,
            50.0,
            &mut w,
        );
        clamp_f64(
            &mut self.derived_stats.base_hunger_decay,
            "derived_stats.base_hunger_decay",
            0.0,
            10.0,
            &mut w,
        );

        clamp_f64(
            &mut self.movement.move_cost,
            "movement.move_cost",
            0.0,
            5.0,
            &mut w,
        );
        clamp_f64(
            &mut self.movement.flee_cost_bonus,
            "movement.flee_cost_bonus",
            0.0,
            5.0,
            &mut w,
        );

        clamp_f64(
            &mut self.reproduction.cost,
            "reproduction.cost",
            0.01,
            REPRODUCTION_GATE_CEILING,
            &mut w,
        );
        clamp_f64(
            &mut self.reproduction.safety_buffer,
            "reproduction.safety_buffer",
            0.0,
            0.5,
            &mut w,
        );
        clamp_u32(
            &mut self.reproduction.cooldown,
            "reproduction.cooldown",
            1,
            1_000,
            &mut w,
        );
        clamp_f64(
            &mut self.reproduction.offspring_spawn_offset_max,
            "reproduction.offspring_spawn_offset_max",
            0.0,
            100.0,
            &mut w,
        );

        clamp_f64(
            &mut self.evolution.base_mutation_rate,
            "evolution.base_mutation_rate",
            0.0,
            1.0,
            &mut w,
        );
        clamp_f64(
            &mut self.evolution.behavioral_mutation_rate,
            "evolution.behavioral_mutation_rate",
            0.0,
            1.0,
            &mut w,
        );
        clamp_f64(
            &mut self.evolution.lifecycle_mutation_rate,
            "evolution.lifecycle_mutation_rate",
            0.0,
            1.0,
            &mut w,
        );

        clamp_u32(
            &mut self.corpse.decay_ticks,
            "corpse.decay_ticks",
            10,
            10_000,
            &mut w,
        );
        clamp_f64(
            &mut self.corpse.food_multiplier,
            "corpse.food_multiplier",
            0.0,
            100.0,
            &mut w,
        );
        clamp_f64(
            &mut self.corpse.bite_size,
            "corpse.bite_size",
            1.0,
            100.0,
            &mut w,
        );

        clamp_f64(
            &mut self.performance.spatial_bucket_size,
            "performance.spatial_bucket_size",
            1.0,
            5_000.0,
            &mut w,
        );
        clamp_usize(
            &mut self.performance.history_capacity,
            "performance.history_capacity",
            1,
            100_000,
            &mut w,
        );

        clamp_f64(&mut self.ui.tick_rate, "ui.tick_rate", 1.0, 120.0, &mut w);

        // Cross-field rules.
        let gate = self.reproduction.cost + self.reproduction.safety_buffer;
        if gate > REPRODUCTION_GATE_CEILING {
            let scale = REPRODUCTION_GATE_CEILING / gate;
            self.reproduction.cost *= scale;
            self.reproduction.safety_buffer *= scale;
            w.push(ConfigWarning::new(
                "reproduction",
                format!(
                    "cost + safety_buffer = {gate:.3} exceeds {REPRODUCTION_GATE_CEILING}; rescaled proportionally"
                ),
            ));
        }

        let max_alert_range = PERCEPTION_BOUNDS.1 * self.derived_stats.perception_multiplier;
        if self.performance.spatial_bucket_size < max_alert_range {
            w.push(ConfigWarning::new(
                "performance.spatial_bucket_size",
                format!(
                    "{} is below the largest possible alert range {max_alert_range}; queries widen their footprint",
                    self.performance.spatial_bucket_size
                ),
            ));
        }

        let initial = self.world.initial_deer_count + self.world.initial_wolf_count;
        if initial > self.world.max_entities {
            let scale = self.world.max_entities as f64 / initial as f64;
            self.world.initial_deer_count =
                (self.world.initial_deer_count as f64 * scale).floor() as usize;
            self.world.initial_wolf_count =
                (self.world.initial_wolf_count as f64 * scale).floor() as usize;
            w.push(ConfigWarning::new(
                "world",
                format!(
                    "initial populations ({initial}) exceed max_entities ({}); scaled down proportionally",
                    self.world.max_entities
                ),
            ));
        }

        for warning in &w {
            warn!(path = %warning.path, "{}", warning.message);
        }
        w
    }

    /// Validated default configuration with a named preset applied.
    #[must_use]
    pub fn from_preset(preset: Preset) -> (Self, Vec<ConfigWarning>) {
        Self::from_partial(&preset.overrides())
    }

    /// Merge a partial nested configuration onto the defaults.
    ///
    /// Unknown keys are ignored with a warning, type mismatches are skipped
    /// with a warning, and the merged result is validated.
    #[must_use]
    pub fn from_partial(patch: &Value) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        let mut base = match serde_json::to_value(Self::default()) {
            Ok(value) => value,
            Err(_) => {
                // Default config always serialises; this branch is unreachable
                // but keeps the importer total.
                return (Self::default(), warnings);
            }
        };
        merge_value(&mut base, patch, "config", &mut warnings);
        let mut config: Self = match serde_json::from_value(base) {
            Ok(config) => config,
            Err(err) => {
                warnings.push(ConfigWarning::new(
                    "config",
                    format!("partial configuration rejected ({err}); defaults used"),
                ));
                Self::default()
            }
        };
        warnings.extend(config.validate());
        (config, warnings)
    }
}

fn merge_value(base: &mut Value, patch: &Value, path: &str, warnings: &mut Vec<ConfigWarning>) {
    let Value::Object(patch_map) = patch else {
        warnings.push(ConfigWarning::new(
            path,
            "expected an object of settings; ignored",
        ));
        return;
    };
    let Value::Object(base_map) = base else {
        return;
    };
    for (key, patch_entry) in patch_map {
        let child_path = format!("{path}.{key}");
        match base_map.get_mut(key) {
            None => warnings.push(ConfigWarning::new(child_path, "unknown key ignored")),
            Some(slot @ Value::Object(_)) => {
                merge_value(slot, patch_entry, &child_path, warnings);
            }
            Some(slot) => {
                if patch_entry.is_number() == slot.is_number() {
                    *slot = patch_entry.clone();
                } else {
                    warnings.push(ConfigWarning::new(
                        child_path,
                        format!("expected a number, got {patch_entry}; ignored"),
                    ));
                }
            }
        }
    }
}

/// Sparse override bundles selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Stock parameters.
    Balanced,
    /// More wolves, faster breeding: heavy predation pressure.
    PredatorPressure,
    /// Lush vegetation, no predators.
    Meadow,
}

impl Preset {
    /// Sparse JSON override merged onto the defaults.
    #[must_use]
    pub fn overrides(self) -> Value {
        match self {
            Self::Balanced => serde_json::json!({}),
            Self::PredatorPressure => serde_json::json!({
                "world": { "initial_wolf_count": 12 },
                "reproduction": { "cooldown": 30 },
            }),
            Self::Meadow => serde_json::json!({
                "world": { "initial_wolf_count": 0 },
                "vegetation": { "initial_density": 0.6, "spread_rate": 0.03 },
            }),
        }
    }
}

/// Envelope written by shells when exporting a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "exportedAt")]
    pub exported_at: Option<String>,
    pub config: Value,
}

impl ConfigDocument {
    /// Resolve the embedded partial configuration against the defaults.
    #[must_use]
    pub fn resolve(&self) -> (SimulationConfig, Vec<ConfigWarning>) {
        SimulationConfig::from_partial(&self.config)
    }
}
