//! Headless shell: build a simulation from flags and config layers, run it,
//! and log population summaries.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use evosim_core::{
    ConfigDocument, ConfigWarning, DeathCause, EventKind, Preset, SimEvent, Simulation,
    SimulationConfig, create_simulation,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "evosim", version, about = "Evolution Sandbox headless runner")]
struct AppCli {
    /// PRNG seed; a random seed is drawn when omitted.
    #[arg(long)]
    seed: Option<u32>,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 1_000)]
    ticks: u64,

    /// Named parameter preset applied before config layers.
    #[arg(long, value_enum, default_value = "balanced")]
    preset: PresetArg,

    /// Partial config documents merged onto the preset, in order.
    #[arg(long = "config")]
    config_layers: Vec<PathBuf>,

    /// Ticks between logged population summaries.
    #[arg(long, default_value_t = 100)]
    summary_interval: u64,

    /// Pace execution against the wall clock instead of stepping flat out.
    #[arg(long)]
    realtime: bool,

    /// Speed multiplier for realtime pacing.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Balanced,
    PredatorPressure,
    Meadow,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Balanced => Preset::Balanced,
            PresetArg::PredatorPressure => Preset::PredatorPressure,
            PresetArg::Meadow => Preset::Meadow,
        }
    }
}

fn main() -> Result<()> {
    let cli = AppCli::parse();
    init_tracing();

    let config = compose_config(&cli)?;
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut sim = create_simulation(config, seed).context("failed to build simulation")?;
    info!(
        seed,
        deer = sim.deer_count(),
        wolf = sim.wolf_count(),
        vegetation = sim.vegetation_count(),
        "simulation initialised"
    );

    sim.subscribe(EventKind::AnimalDied, |event| {
        if let SimEvent::AnimalDied { animal, cause } = event {
            let reason = match cause {
                DeathCause::Starvation => "starved",
                DeathCause::OldAge => "died of old age",
                DeathCause::Killed => "was killed",
            };
            debug!(id = %animal.id, age = animal.age, "{reason}");
        }
    });

    if cli.realtime {
        run_realtime(&mut sim, &cli);
    } else {
        run_flat_out(&mut sim, &cli);
    }

    let digest = serde_json::to_string(&sim.world_snapshot())
        .context("failed to serialise the world digest")?;
    println!("{digest}");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn compose_config(cli: &AppCli) -> Result<SimulationConfig> {
    let (mut config, warnings) = SimulationConfig::from_preset(cli.preset.into());
    log_warnings("preset", &warnings);
    for path in &cli.config_layers {
        config = apply_config_layer(config, path)?;
    }
    Ok(config)
}

/// Merge one JSON layer onto the current config. Accepts either a full
/// `ConfigDocument` envelope or a bare partial configuration object.
fn apply_config_layer(current: SimulationConfig, path: &Path) -> Result<SimulationConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config layer {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("config layer {} is not valid JSON", path.display()))?;

    let partial = if value.get("config").is_some() {
        let document: ConfigDocument = serde_json::from_value(value)
            .with_context(|| format!("config layer {} has a malformed envelope", path.display()))?;
        info!(
            layer = %path.display(),
            version = %document.version,
            name = document.name.as_deref().unwrap_or("unnamed"),
            "applying config document"
        );
        document.config
    } else {
        value
    };

    // Re-merge on top of the current state so layers stack in order.
    let mut base = serde_json::to_value(current).context("config serialisation failed")?;
    merge_json(&mut base, &partial);
    let (config, warnings) = SimulationConfig::from_partial(&base);
    log_warnings(&path.display().to_string(), &warnings);
    Ok(config)
}

fn merge_json(base: &mut Value, patch: &Value) {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (base, patch) {
        for (key, patch_entry) in patch_map {
            match base_map.get_mut(key) {
                Some(slot) if slot.is_object() && patch_entry.is_object() => {
                    merge_json(slot, patch_entry);
                }
                Some(slot) => *slot = patch_entry.clone(),
                None => {
                    base_map.insert(key.clone(), patch_entry.clone());
                }
            }
        }
    }
}

fn log_warnings(source: &str, warnings: &[ConfigWarning]) {
    for warning in warnings {
        warn!(source, path = %warning.path, "{}", warning.message);
    }
}

fn run_flat_out(sim: &mut Simulation, cli: &AppCli) {
    for tick in 1..=cli.ticks {
        sim.step();
        if cli.summary_interval > 0 && tick % cli.summary_interval == 0 {
            log_summary(sim);
        }
    }
}

fn run_realtime(sim: &mut Simulation, cli: &AppCli) {
    sim.set_speed(cli.speed);
    sim.start();
    let mut executed = 0_u64;
    let mut last_summary = 0_u64;
    while executed < cli.ticks {
        executed += sim.run_pending(Instant::now()) as u64;
        if cli.summary_interval > 0 && executed >= last_summary + cli.summary_interval {
            log_summary(sim);
            last_summary = executed;
        }
        thread::sleep(Duration::from_millis(5));
    }
    sim.pause();
}

fn log_summary(sim: &Simulation) {
    info!(
        tick = sim.current_tick().0,
        deer = sim.deer_count(),
        wolf = sim.wolf_count(),
        vegetation = sim.vegetation_count(),
        corpses = sim.corpses().len(),
        "population summary"
    );
}
