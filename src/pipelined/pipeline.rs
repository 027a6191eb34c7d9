//! Pipeline state
use crate::error::ExecutionError;
use crate::error::SimulatorResult;
use crate::instruction::DecodedInstruction;

/// Pipeline stages, in program order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Decode,
    Execute,
    Store,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::Decode, Stage::Execute, Stage::Store];

    fn index(self) -> usize {
        self as usize
    }

    /// The stage an instruction moves to next; `None` means retirement
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Fetch => Some(Stage::Decode),
            Stage::Decode => Some(Stage::Execute),
            Stage::Execute => Some(Stage::Store),
            Stage::Store => None,
        }
    }

    pub fn prev(self) -> Option<Stage> {
        match self {
            Stage::Fetch => None,
            Stage::Decode => Some(Stage::Fetch),
            Stage::Execute => Some(Stage::Decode),
            Stage::Store => Some(Stage::Execute),
        }
    }
}

/// An instruction in flight
#[derive(Clone, Debug)]
pub struct Instruction {
    /// Address it was fetched from
    pub pc: u32,
    /// Raw representation
    pub raw: u32,
    /// Filled in by Decode
    pub decoded: Option<DecodedInstruction>,
    /// Stage currently holding the instruction
    pub stage: Stage,
    /// Core cycle at which each stage was entered
    pub cycle_entered: [Option<u64>; 4],
    /// Remaining Execute latency; `None` until classified
    pub execute_delay: Option<u32>,
    /// Store address, fixed on the first Store poll
    pub effective_address: Option<u32>,
}

impl Instruction {
    pub fn new(pc: u32, raw: u32, cycle: u64) -> Self {
        let mut cycle_entered = [None; 4];
        cycle_entered[Stage::Fetch.index()] = Some(cycle);
        Self {
            pc,
            raw,
            decoded: None,
            stage: Stage::Fetch,
            cycle_entered,
            execute_delay: None,
            effective_address: None,
        }
    }

    pub fn entered(&self, stage: Stage) -> Option<u64> {
        self.cycle_entered[stage.index()]
    }

    /// Mnemonic, or the raw word if not decoded yet
    pub fn name(&self) -> String {
        match &self.decoded {
            Some(decoded) => decoded.function.mnemonic().to_string(),
            None => format!("{:#010x}", self.raw),
        }
    }
}

/// Record of a retired instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retirement {
    pub pc: u32,
    pub raw: u32,
    pub text: String,
    pub cycle_entered: [Option<u64>; 4],
    pub retired: u64,
}

impl Retirement {
    pub fn of(instruction: &Instruction, cycle: u64) -> Self {
        Self {
            pc: instruction.pc,
            raw: instruction.raw,
            text: instruction
                .decoded
                .map(|d| d.to_string())
                .unwrap_or_else(|| instruction.name()),
            cycle_entered: instruction.cycle_entered,
            retired: cycle,
        }
    }
}

/// Pipeline state = 4 single-slot stage registers
#[derive(Clone, Debug, Default)]
pub struct PipelineSlots {
    slots: [Option<Instruction>; 4],
}

impl PipelineSlots {
    pub fn get(&self, stage: Stage) -> Option<&Instruction> {
        self.slots[stage.index()].as_ref()
    }

    pub fn get_mut(&mut self, stage: Stage) -> Option<&mut Instruction> {
        self.slots[stage.index()].as_mut()
    }

    pub fn is_occupied(&self, stage: Stage) -> bool {
        self.slots[stage.index()].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of instructions in flight
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Places a new instruction into an empty slot
    pub fn put(
        &mut self,
        core: usize,
        stage: Stage,
        mut instruction: Instruction,
        cycle: u64,
    ) -> SimulatorResult<()> {
        let slot = &mut self.slots[stage.index()];
        if slot.is_some() {
            return Err(ExecutionError::SlotOccupied { core, stage }.into());
        }
        instruction.stage = stage;
        instruction.cycle_entered[stage.index()] = Some(cycle);
        *slot = Some(instruction);
        Ok(())
    }

    pub fn take(&mut self, stage: Stage) -> Option<Instruction> {
        self.slots[stage.index()].take()
    }

    /// Moves the instruction in `from` to the following stage
    pub fn advance(&mut self, core: usize, from: Stage, cycle: u64) -> SimulatorResult<()> {
        let to = from
            .next()
            .ok_or(ExecutionError::NoSuccessor { core, stage: from })?;
        if self.is_occupied(to) {
            return Err(ExecutionError::SlotOccupied { core, stage: to }.into());
        }
        if let Some(instruction) = self.take(from) {
            self.put(core, to, instruction, cycle)?;
        }
        Ok(())
    }

    /// Empties the given stages and returns how many instructions were dropped
    pub fn flush(&mut self, stages: &[Stage]) -> usize {
        stages.iter().filter_map(|stage| self.take(*stage)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_adjacency() {
        for stage in Stage::ALL {
            if let Some(next) = stage.next() {
                assert_eq!(next.prev(), Some(stage));
            }
        }
        assert_eq!(Stage::Fetch.prev(), None);
        assert_eq!(Stage::Store.next(), None);
    }

    #[test]
    fn test_advance_moves_ownership() {
        let mut slots = PipelineSlots::default();
        slots.put(0, Stage::Fetch, Instruction::new(0x0, 0x13, 1), 1).unwrap();
        slots.advance(0, Stage::Fetch, 1).unwrap();

        assert!(!slots.is_occupied(Stage::Fetch));
        let inst = slots.get(Stage::Decode).unwrap();
        assert_eq!(inst.stage, Stage::Decode);
        assert_eq!(inst.entered(Stage::Decode), Some(1));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_occupied_slot_is_refused() {
        let mut slots = PipelineSlots::default();
        slots.put(0, Stage::Decode, Instruction::new(0x0, 0x13, 1), 1).unwrap();
        slots.put(0, Stage::Execute, Instruction::new(0x4, 0x13, 1), 1).unwrap();

        assert!(slots.advance(0, Stage::Decode, 2).is_err());
        assert!(slots.put(0, Stage::Execute, Instruction::new(0x8, 0x13, 2), 2).is_err());
        // Nothing moved or got lost
        assert_eq!(slots.get(Stage::Decode).map(|i| i.pc), Some(0x0));
        assert_eq!(slots.get(Stage::Execute).map(|i| i.pc), Some(0x4));
        assert!(slots.advance(0, Stage::Store, 2).is_err());
    }

    #[test]
    fn test_flush() {
        let mut slots = PipelineSlots::default();
        slots.put(0, Stage::Decode, Instruction::new(0x0, 0x13, 1), 1).unwrap();
        slots.put(0, Stage::Execute, Instruction::new(0x4, 0x13, 1), 1).unwrap();
        assert_eq!(slots.flush(&[Stage::Fetch, Stage::Decode]), 1);
        assert!(slots.is_occupied(Stage::Execute));
        assert!(!slots.is_empty());
    }
}
