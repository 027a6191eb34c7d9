//! A simulator wrapper

use std::path::Path;
use std::path::PathBuf;

use crate::config::SimConfig;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::flags::DEFAULT_CYCLE_LIMIT;
use crate::loader;
use crate::simulator::RunSummary;
use crate::simulator::Simulator;

/// CPI of every core, in core order
pub type RunStats = Vec<f64>;

/// Builds a simulator with one core per program image
pub fn build(
    config: SimConfig,
    programs: &[PathBuf],
    record_timeline: bool,
) -> SimulatorResult<Simulator> {
    if programs.is_empty() || programs.len() > config.max_cores() {
        return Err(SimulatorError::ConfigError(format!(
            "expected 1 to {} programs, got {}",
            config.max_cores(),
            programs.len()
        )));
    }

    let mut sim = Simulator::make(config)?;
    sim.record_timeline(record_timeline);
    for path in programs {
        let words = loader::read_program(path)?;
        let id = sim.add_core(&words)?;
        log::debug!("{}: running {}", id, path.display());
    }
    Ok(sim)
}

/// Run simulation on the given program files
pub fn run(
    config: SimConfig,
    programs: &[PathBuf],
    record_timeline: bool,
) -> SimulatorResult<(Simulator, RunSummary)> {
    let mut sim = build(config, programs, record_timeline)?;
    let summary = sim.run()?;
    Ok((sim, summary))
}

/// Per-core CPI of a finished run
pub fn stats(sim: &Simulator) -> RunStats {
    sim.cores().iter().map(|core| core.history.cpi()).collect()
}

/// Configuration from `path`, or the built-in one
pub fn load_config(path: Option<&Path>) -> SimulatorResult<SimConfig> {
    match path {
        Some(path) => SimConfig::from_file(path),
        None => Ok(SimConfig::default()),
    }
}

/// Configuration with a command line cycle limit applied.
/// Without a limit or a config file the run stops after [`DEFAULT_CYCLE_LIMIT`].
pub fn resolve_config(path: Option<&Path>, limit: Option<u64>) -> SimulatorResult<SimConfig> {
    let mut config = load_config(path)?;
    match limit {
        Some(limit) => config.cycle_limit = limit,
        None if path.is_none() => config.cycle_limit = DEFAULT_CYCLE_LIMIT,
        None => {}
    }
    Ok(config)
}
