//! Simulator configuration.
//!
//! Every field has a built-in default, so a config file only needs the
//! entries it changes. CLI flags are applied on top by the `sim` binary.
//!
//! # Config File Format
//!
//! ```toml
//! arbitration = "first-touch"
//! cycle_limit = 50000
//!
//! [memory]
//! latency = 4
//!
//! [pipeline]
//! float_latency = 3
//! ```

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::cpu::CorePolicy;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::memory::bus::ArbitrationPolicy;

/// Words `first, first + 1, ...` written over `[start, end)` before the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRegion {
    pub start: u32,
    pub end: u32,
    pub first: u32,
}

/// Main memory parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size in bytes
    pub size: usize,
    /// Polls a fresh access takes to complete
    pub latency: u32,
    /// Regions seeded with sequential words
    pub fill: Vec<FillRegion>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: 0x1400,
            latency: 2,
            fill: vec![
                FillRegion { start: 0x400, end: 0x800, first: 1 },
                FillRegion { start: 0x800, end: 0xc00, first: 1 },
            ],
        }
    }
}

/// Execute timing shared by every core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub float_latency: u32,
    pub integer_latency: u32,
    pub float_store_extra_delay: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let policy = CorePolicy::default();
        Self {
            float_latency: policy.float_latency,
            integer_latency: policy.integer_latency,
            float_store_extra_delay: policy.float_store_extra_delay,
        }
    }
}

/// Per-core start addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoresConfig {
    /// Program base of core `i`
    pub bases: Vec<u32>,
    /// Initial `sp` of core `i`
    pub stack_pointers: Vec<u32>,
}

impl Default for CoresConfig {
    fn default() -> Self {
        Self { bases: vec![0x000, 0x200], stack_pointers: vec![0x2ff, 0x3ff] }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub memory: MemoryConfig,
    pub pipeline: PipelineConfig,
    pub cores: CoresConfig,
    pub arbitration: ArbitrationPolicy,
    /// 0 runs until every core completes
    pub cycle_limit: u64,
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> SimulatorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> SimulatorResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the simulator cannot run with
    pub fn validate(&self) -> SimulatorResult<()> {
        if self.memory.latency == 0 {
            return Err(config_error("memory.latency must be at least 1"));
        }
        if self.cores.bases.is_empty() {
            return Err(config_error("cores.bases must name at least one core"));
        }
        if self.cores.stack_pointers.len() < self.cores.bases.len() {
            return Err(config_error("every core in cores.bases needs a stack pointer"));
        }
        if let Some(base) = self
            .cores
            .bases
            .iter()
            .find(|base| **base as usize >= self.memory.size)
        {
            return Err(config_error(&format!(
                "core base {:#x} is outside memory of {:#x} bytes",
                base, self.memory.size
            )));
        }
        for region in &self.memory.fill {
            if region.start > region.end || region.end as usize > self.memory.size {
                return Err(config_error(&format!(
                    "fill region {:#x}..{:#x} is outside memory of {:#x} bytes",
                    region.start, region.end, self.memory.size
                )));
            }
        }
        Ok(())
    }

    /// Number of cores the configuration can host
    pub fn max_cores(&self) -> usize {
        self.cores.bases.len()
    }

    /// Pipeline policy handed to every core
    pub fn core_policy(&self, record_timeline: bool) -> CorePolicy {
        CorePolicy {
            float_latency: self.pipeline.float_latency,
            integer_latency: self.pipeline.integer_latency,
            float_store_extra_delay: self.pipeline.float_store_extra_delay,
            record_timeline,
        }
    }

    /// Sample config file content
    pub fn sample_config() -> String {
        r#"# Multicore pipeline simulator configuration

# fifo | first-touch
arbitration = "fifo"

# 0 runs until every core completes
cycle_limit = 25000

[memory]
size = 0x1400
latency = 2

[[memory.fill]]
start = 0x400
end = 0x800
first = 1

[[memory.fill]]
start = 0x800
end = 0xC00
first = 1

[pipeline]
float_latency = 5
integer_latency = 1
float_store_extra_delay = 0

[cores]
bases = [0x000, 0x200]
stack_pointers = [0x2FF, 0x3FF]
"#
        .to_string()
    }
}

fn config_error(message: &str) -> SimulatorError {
    SimulatorError::ConfigError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_matches_defaults() {
        let parsed = SimConfig::parse(&SimConfig::sample_config()).unwrap();
        let defaults = SimConfig { cycle_limit: 25000, ..SimConfig::default() };
        assert_eq!(parsed, defaults);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SimConfig::parse(
            r#"
arbitration = "first-touch"

[memory]
latency = 4
"#,
        )
        .unwrap();
        assert_eq!(config.arbitration, ArbitrationPolicy::FirstTouch);
        assert_eq!(config.memory.latency, 4);
        assert_eq!(config.memory.size, 0x1400);
        assert_eq!(config.memory.fill.len(), 2);
        assert_eq!(config.pipeline.float_latency, 5);
        assert_eq!(config.cycle_limit, 0);
    }

    #[test]
    fn test_rejects_zero_latency() {
        let err = SimConfig::parse("[memory]\nlatency = 0\n").unwrap_err();
        assert!(matches!(err, SimulatorError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_fill_outside_memory() {
        let mut config = SimConfig::default();
        config.memory.size = 0x800;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let err = SimConfig::parse("arbitration = \"round-robin\"\n").unwrap_err();
        assert!(matches!(err, SimulatorError::ConfigParseError(_)));
    }

    #[test]
    fn test_core_policy() {
        let mut config = SimConfig::default();
        config.pipeline.float_latency = 2;
        let policy = config.core_policy(true);
        assert_eq!(policy.float_latency, 2);
        assert_eq!(policy.integer_latency, 1);
        assert!(policy.record_timeline);
    }
}
