//! Thin orchestrator binary: load a [`SimConfig`], build an [`Orchestrator`],
//! run it, and join its flows on exit. Flag parsing, signal handling, and
//! console-log formatting choices live here, not in the library (SPEC_FULL §1.1).

use std::env;
use std::time::Duration;

use anyhow::Context;
use kernelsim_core::{Orchestrator, SimConfig};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_VAR: &str = "KERNELSIMD_CONFIG";
const RUN_SECONDS_VAR: &str = "KERNELSIMD_RUN_SECONDS";
const DEFAULT_RUN_SECONDS: u64 = 5;

fn load_config() -> anyhow::Result<SimConfig> {
    match env::var(CONFIG_PATH_VAR) {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file at {path}"))?;
            if path.ends_with(".json") {
                SimConfig::from_json_str(&raw)
            } else {
                SimConfig::from_toml_str(&raw)
            }
        }
        Err(_) => Ok(SimConfig::default()),
    }
}

fn run_seconds() -> u64 {
    env::var(RUN_SECONDS_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RUN_SECONDS)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config().context("loading simulator configuration")?;
    let mut orchestrator = Orchestrator::new(&config).context("building orchestrator")?;
    orchestrator.start();

    std::thread::sleep(Duration::from_secs(run_seconds()));

    let snapshot = orchestrator.snapshot();
    tracing::info!(
        tick = snapshot.tick,
        total_completed = snapshot.total_completed,
        in_system = snapshot.in_system,
        "run complete"
    );
    orchestrator.shutdown();

    Ok(())
}
