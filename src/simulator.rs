//! Multicore driver: one bus, cores stepped in index order once per tick

use std::ops::Range;

use crate::config::SimConfig;
use crate::cpu::CoreId;
use crate::error::ExecutionError;
use crate::error::SimulatorResult;
use crate::loader;
use crate::memory::bus::Bus;
use crate::memory::ram::Memory;
use crate::pipelined::Core;

/// Result arrays written by the example programs
pub const RESULT_REGIONS: [(&str, Range<u32>); 2] =
    [("C", 0xc00..0x1000), ("D", 0x1000..0x1400)];

/// Outcome of [`Simulator::run`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Global ticks simulated
    pub cycles: u64,
    /// Every core completed before the cycle limit
    pub completed: bool,
}

pub struct Simulator {
    config: SimConfig,
    cores: Vec<Core>,
    bus: Bus,
    cycle: u64,
    record_timeline: bool,
}

impl Simulator {
    /// Builds an empty machine and seeds the configured fill regions
    pub fn make(config: SimConfig) -> SimulatorResult<Self> {
        config.validate()?;
        let memory = Memory::make(config.memory.size, config.memory.latency);
        let mut bus = Bus::make(memory, config.arbitration);
        for region in &config.memory.fill {
            loader::fill(&mut bus, region)?;
        }
        log::debug!(
            "memory of {:#x} bytes, latency {}, {:?} arbitration",
            config.memory.size,
            config.memory.latency,
            bus.policy()
        );
        Ok(Self { config, cores: Vec::new(), bus, cycle: 0, record_timeline: false })
    }

    /// Keep a per-instruction record on cores added from now on
    pub fn record_timeline(&mut self, enabled: bool) {
        self.record_timeline = enabled;
    }

    /// Adds a core running `program` from the next configured base
    pub fn add_core(&mut self, program: &[u32]) -> SimulatorResult<CoreId> {
        let index = self.cores.len();
        if index >= self.config.max_cores() {
            return Err(ExecutionError::UnknownCore(index).into());
        }
        let id = CoreId(index);
        let base = self.config.cores.bases[index];
        let stack_pointer = self.config.cores.stack_pointers[index];

        let window = loader::load_words(
            &mut self.bus,
            id,
            base,
            program,
            self.config.memory.size,
        )?;
        let mut core = Core::make(
            id,
            base,
            stack_pointer,
            self.config.core_policy(self.record_timeline),
        );
        core.set_program(window);
        self.cores.push(core);
        Ok(id)
    }

    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub fn core(&self, index: usize) -> SimulatorResult<&Core> {
        self.cores
            .get(index)
            .ok_or_else(|| ExecutionError::UnknownCore(index).into())
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Global ticks so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn is_complete(&self) -> bool {
        self.cores.iter().all(Core::is_complete)
    }

    /// Steps every core that has not completed yet
    pub fn tick(&mut self) -> SimulatorResult<()> {
        self.cycle += 1;
        for core in self.cores.iter_mut().filter(|core| !core.is_complete()) {
            core.tick(&mut self.bus)?;
            if core.is_complete() {
                log::info!(
                    "{}: complete after {} cycles, {} instructions",
                    core.id,
                    core.history.cycle_count,
                    core.history.inst_count
                );
            }
        }
        Ok(())
    }

    /// Ticks until every core completes or the cycle limit is reached
    pub fn run(&mut self) -> SimulatorResult<RunSummary> {
        let limit = self.config.cycle_limit;
        while !self.is_complete() {
            if limit != 0 && self.cycle >= limit {
                log::warn!("cycle limit of {} reached", limit);
                break;
            }
            self.tick()?;
        }
        Ok(RunSummary { cycles: self.cycle, completed: self.is_complete() })
    }

    /// Named memory regions worth printing after a run
    pub fn dump_regions(&self) -> Vec<(String, Range<u32>)> {
        let fills = self
            .config
            .memory
            .fill
            .iter()
            .enumerate()
            .map(|(i, region)| {
                let name = char::from(b'A' + (i % 26) as u8).to_string();
                (name, region.start..region.end)
            });
        let results = RESULT_REGIONS
            .iter()
            .map(|(name, range)| (name.to_string(), range.clone()));
        fills
            .chain(results)
            .filter(|(_, range)| (range.start as usize) < self.config.memory.size)
            .collect()
    }
}
