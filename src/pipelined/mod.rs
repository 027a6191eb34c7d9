//! Pipelined core

use std::collections::HashSet;
use std::ops::Range;

use crate::cpu::CoreHistory;
use crate::cpu::CoreId;
use crate::cpu::CorePolicy;
use crate::cpu::RegisterFile;
use crate::error::SimulatorResult;
use crate::memory::StorageInterface;
use crate::pipelined::pipeline::Instruction;
use crate::pipelined::pipeline::PipelineSlots;
use crate::pipelined::pipeline::Retirement;
use crate::pipelined::pipeline::Stage;

pub mod pipeline;
pub mod stages;

/// Index of the stack pointer register
const SP: u32 = 2;

/// One 4-stage in-order core
#[derive(Debug)]
pub struct Core {
    pub id: CoreId,
    pub pc: u32,
    pub regs: RegisterFile,
    pub slots: PipelineSlots,
    pub policy: CorePolicy,
    pub history: CoreHistory,
    /// Retired instructions, oldest first, if the policy records them
    pub timeline: Vec<Retirement>,
    /// Fetch has work outstanding
    pub(crate) fetch_active: bool,
    /// pc left the loaded program
    pub(crate) halted: bool,
    /// Decode met a word that is not an instruction
    pub(crate) stopped: bool,
    /// Address of a fetch the bus has not answered yet
    pub(crate) pending_fetch: Option<u32>,
    /// Source registers of a store in flight
    pub(crate) held: HashSet<u32>,
    /// Loaded program window `[start, end)`
    pub(crate) program: Range<u32>,
}

impl Core {
    pub fn make(id: CoreId, base: u32, stack_pointer: u32, policy: CorePolicy) -> Self {
        let mut regs = RegisterFile::default();
        regs.write(SP, stack_pointer);
        Self {
            id,
            pc: base,
            regs,
            slots: PipelineSlots::default(),
            policy,
            history: CoreHistory::default(),
            timeline: Vec::new(),
            fetch_active: true,
            halted: false,
            stopped: false,
            pending_fetch: None,
            held: HashSet::new(),
            program: base..base,
        }
    }

    /// Sets the address window Fetch may read from
    pub fn set_program(&mut self, program: Range<u32>) {
        self.program = program;
    }

    pub fn program(&self) -> Range<u32> {
        self.program.clone()
    }

    /// Advances the core by one cycle.
    /// Stages run back to front so an instruction moves at most one stage per tick.
    pub fn tick(&mut self, mem: &mut impl StorageInterface) -> SimulatorResult<()> {
        self.history.cycle_count += 1;
        log::trace!("{}: cycle {} pc {:#06x}", self.id, self.cycle(), self.pc);

        stages::store(self, mem)?;
        stages::execute(self, mem)?;
        stages::decode(self)?;
        stages::fetch(self, mem)?;
        Ok(())
    }

    /// No instruction in flight and nothing left to fetch
    pub fn is_complete(&self) -> bool {
        self.slots.is_empty() && !self.fetch_active
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Registers a store in flight has yet to read
    pub fn held_registers(&self) -> Vec<u32> {
        let mut held: Vec<u32> = self.held.iter().copied().collect();
        held.sort_unstable();
        held
    }

    pub(crate) fn cycle(&self) -> u64 {
        self.history.cycle_count
    }

    pub(crate) fn is_held(&self, register: u32) -> bool {
        register != 0 && self.held.contains(&register)
    }

    pub(crate) fn hold(&mut self, register: u32) {
        self.held.insert(register);
    }

    pub(crate) fn release(&mut self, register: u32) {
        self.held.remove(&register);
    }

    pub(crate) fn retire(&mut self, instruction: Instruction) {
        self.history.inst_count += 1;
        log::debug!(
            "{}: retired {:#06x} {} (fetched at cycle {:?})",
            self.id,
            instruction.pc,
            instruction.name(),
            instruction.entered(Stage::Fetch)
        );
        if self.policy.record_timeline {
            self.timeline.push(Retirement::of(&instruction, self.cycle()));
        }
    }

    /// Redirects fetch and discards the younger instructions
    pub(crate) fn redirect(&mut self, target: u32, mem: &mut impl StorageInterface) {
        log::debug!("{}: jumping from {:#06x} to {:#06x}", self.id, self.pc, target);
        self.pc = target;
        let dropped = self.slots.flush(&[Stage::Fetch, Stage::Decode]);
        self.history.flush_count += dropped as u64;
        if let Some(address) = self.pending_fetch.take() {
            mem.abandon(self.id, address);
        }
    }
}
