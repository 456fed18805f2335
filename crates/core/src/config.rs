//! The `serde`-deserializable configuration surface (§6).
//!
//! Library-constructible directly, or loaded by the thin orchestrator binary
//! from TOML/JSON, matching how `sisctl` resolves its own configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::clock::ClockConfig;
use crate::generator::GeneratorConfig;
use crate::scheduler::{SchedulerConfig, SchedulerPolicy, SyncMode};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOption {
    RoundRobin,
    DeadlineEdf,
    PreemptivePriority,
}

impl From<PolicyOption> for SchedulerPolicy {
    fn from(value: PolicyOption) -> Self {
        match value {
            PolicyOption::RoundRobin => SchedulerPolicy::RoundRobin,
            PolicyOption::DeadlineEdf => SchedulerPolicy::DeadlineEDF,
            PolicyOption::PreemptivePriority => SchedulerPolicy::PreemptivePriority,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncModeOption {
    Clock,
    Timer,
}

impl From<SyncModeOption> for SyncMode {
    fn from(value: SyncModeOption) -> Self {
        match value {
            SyncModeOption::Clock => SyncMode::Clock,
            SyncModeOption::Timer => SyncMode::Timer,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopologyConfig {
    pub cpus: usize,
    pub cores_per_cpu: usize,
    pub threads_per_core: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            cpus: 1,
            cores_per_cpu: 1,
            threads_per_core: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorOption {
    pub enabled: bool,
    pub interval_range: (u32, u32),
    pub ttl_range: (u32, u32),
}

impl Default for GeneratorOption {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_range: (1, 5),
            ttl_range: (10, 50),
        }
    }
}

/// The full configuration surface recognized by the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimConfig {
    pub clock_frequency_hz: u32,
    pub quantum: u32,
    pub timer_intervals: Vec<u64>,
    pub scheduler_policy: PolicyOption,
    pub sync_mode: SyncModeOption,
    pub generator: GeneratorOption,
    pub max_processes: usize,
    pub topology: TopologyConfig,
    pub programs_directory: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            clock_frequency_hz: 10,
            quantum: 4,
            timer_intervals: Vec::new(),
            scheduler_policy: PolicyOption::RoundRobin,
            sync_mode: SyncModeOption::Clock,
            generator: GeneratorOption::default(),
            max_processes: 40,
            topology: TopologyConfig::default(),
            programs_directory: None,
        }
    }
}

impl SimConfig {
    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            frequency_hz: self.clock_frequency_hz,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            quantum: self.quantum,
            policy: self.scheduler_policy.into(),
            sync_mode: self.sync_mode.into(),
            max_processes: self.max_processes,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            interval_range: self.generator.interval_range,
            ttl_range: self.generator.ttl_range,
            max_processes: self.max_processes,
        }
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).map_err(Into::into)
    }

    pub fn from_json_str(source: &str) -> anyhow::Result<Self> {
        serde_json::from_str(source).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_round_robin_and_clock_sync() {
        let config = SimConfig::default();
        assert_eq!(config.scheduler_policy, PolicyOption::RoundRobin);
        assert_eq!(config.sync_mode, SyncModeOption::Clock);
    }

    #[test]
    fn toml_round_trip_overrides_only_named_fields() {
        let config = SimConfig::from_toml_str("quantum = 8\nmax_processes = 16\n").unwrap();
        assert_eq!(config.quantum, 8);
        assert_eq!(config.max_processes, 16);
        assert_eq!(config.clock_frequency_hz, 10);
    }

    #[test]
    fn policy_option_maps_onto_scheduler_policy() {
        let config = SimConfig {
            scheduler_policy: PolicyOption::DeadlineEdf,
            ..SimConfig::default()
        };
        assert_eq!(config.scheduler_config().policy, SchedulerPolicy::DeadlineEDF);
    }
}
