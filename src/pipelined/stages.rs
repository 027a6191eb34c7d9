//! Fetch, Decode, Execute and Store stages.
//!
//! A core calls these back to front each tick. Every stage only ever moves
//! an instruction into a slot it has checked to be free.

use super::pipeline::Instruction;
use super::pipeline::Stage;
use super::Core;
use crate::alu::alu;
use crate::alu::alu_op;
use crate::alu::branch_taken;
use crate::alu::fpu;
use crate::alu::ALUOp;
use crate::alu::ALUSrc;
use crate::cpu::CorePolicy;
use crate::error::ExecutionError;
use crate::error::SimulatorResult;
use crate::instruction;
use crate::instruction::DecodedInstruction;
use crate::instruction::Function;
use crate::memory::Response;
use crate::memory::StorageInterface;

/// What Execute did with its instruction this tick
#[derive(Debug, PartialEq, Eq)]
enum Effect {
    /// Finished; the instruction retires
    Done,
    /// Finished and redirects fetch
    Jump(u32),
    /// Waiting on memory
    Stall,
    /// Memory write left for the Store stage
    HandOff,
}

/// Execute delay of a function before its effect is applied
pub fn execute_latency(function: Function, policy: &CorePolicy) -> u32 {
    use Function::*;
    if function.is_float() {
        policy.float_latency
    } else if matches!(
        function,
        ADDI | AND | OR | XORI | SLLI | BLT | JAL | JALR | LW | SW
    ) {
        policy.integer_latency
    } else {
        0
    }
}

/// Sign or zero extends the loaded word to the access width
fn extend_load(function: Function, word: u32) -> u32 {
    match function {
        Function::LB => word as u8 as i8 as i32 as u32,
        Function::LH => word as u16 as i16 as i32 as u32,
        Function::LBU => word & 0xff,
        Function::LHU => word & 0xffff,
        _ => word,
    }
}

/// IF stage
pub fn fetch(core: &mut Core, mem: &mut impl StorageInterface) -> SimulatorResult<()> {
    if core.stopped {
        core.fetch_active = false;
        return Ok(());
    }
    if core.slots.is_occupied(Stage::Decode) {
        log::trace!("{}: fetch waits for Decode", core.id);
        return Ok(());
    }

    let pc = core.pc;
    if !core.program.contains(&pc) {
        if !core.halted {
            log::info!("{}: pc {:#06x} left the program, halting", core.id, pc);
        }
        core.halted = true;
        core.fetch_active = false;
        core.slots.take(Stage::Fetch);
        return Ok(());
    }
    core.halted = false;
    core.fetch_active = true;

    match mem.read(core.id, pc, false)? {
        Response::Ready(raw) => {
            let cycle = core.cycle();
            let index = core.id.0;
            core.pending_fetch = None;
            core.fetch_active = false;
            core.history.fetch_count += 1;
            log::trace!("{}: fetched {:#010x} from {:#06x}", core.id, raw, pc);

            core.slots.put(index, Stage::Fetch, Instruction::new(pc, raw, cycle), cycle)?;
            core.slots.advance(index, Stage::Fetch, cycle)?;
            core.pc = pc.wrapping_add(4);
        }
        Response::Pending(delays) => {
            core.pending_fetch = Some(pc);
            core.history.fetch_stall_count += 1;
            log::trace!("{}: fetch of {:#06x} pending {:?}", core.id, pc, delays);
        }
        Response::Blocked { owner, delays } => {
            core.pending_fetch = Some(pc);
            core.history.fetch_stall_count += 1;
            core.history.blocked_count += 1;
            log::trace!(
                "{}: fetch of {:#06x} blocked by {} {:?}",
                core.id,
                pc,
                owner,
                delays
            );
        }
    }
    Ok(())
}

/// ID stage
pub fn decode(core: &mut Core) -> SimulatorResult<()> {
    let Some(inst) = core.slots.get(Stage::Decode) else {
        return Ok(());
    };
    let (pc, raw) = (inst.pc, inst.raw);
    if core.slots.is_occupied(Stage::Execute) {
        log::trace!("{}: decode waits for Execute", core.id);
        return Ok(());
    }

    match instruction::decode(raw) {
        Some(decoded) => {
            log::debug!("{}: {:#06x} {}", core.id, pc, decoded);
            let cycle = core.cycle();
            let index = core.id.0;
            if let Some(inst) = core.slots.get_mut(Stage::Decode) {
                inst.decoded = Some(decoded);
            }
            core.slots.advance(index, Stage::Decode, cycle)?;
        }
        None => {
            // Not an instruction: treat as the end of the program. Dropping
            // the word lets the core drain and complete, see DESIGN.md
            log::info!("{}: end of program at {:#06x} ({:#010x})", core.id, pc, raw);
            core.slots.take(Stage::Decode);
            core.stopped = true;
            core.fetch_active = false;
        }
    }
    Ok(())
}

/// EX stage
pub fn execute(core: &mut Core, mem: &mut impl StorageInterface) -> SimulatorResult<()> {
    let cycle = core.cycle();
    let index = core.id.0;
    let policy = core.policy;
    let Some(inst) = core.slots.get_mut(Stage::Execute) else {
        return Ok(());
    };
    let Some(decoded) = inst.decoded else {
        return Err(ExecutionError::Undecoded { core: index, pc: inst.pc }.into());
    };
    let pc = inst.pc;

    // The countdown is classified once and never goes below zero,
    // so an instruction stalled on memory re-polls without waiting again
    let remaining = match inst.execute_delay {
        None => execute_latency(decoded.function, &policy),
        Some(delay) => delay.saturating_sub(1),
    };
    inst.execute_delay = Some(remaining);
    if remaining > 0 {
        core.history.execute_stall_count += 1;
        return Ok(());
    }

    if decoded.function.writes_rd() && core.is_held(decoded.rd()) {
        log::trace!(
            "{}: {} waits for a store to read {}",
            core.id,
            decoded.function.mnemonic(),
            decoded.rd()
        );
        core.history.execute_stall_count += 1;
        return Ok(());
    }

    match perform(core, mem, pc, &decoded)? {
        Effect::Stall => {
            core.history.execute_stall_count += 1;
        }
        Effect::Done => {
            if let Some(inst) = core.slots.take(Stage::Execute) {
                core.retire(inst);
            }
        }
        Effect::Jump(target) => {
            if let Some(inst) = core.slots.take(Stage::Execute) {
                core.retire(inst);
            }
            core.redirect(target, mem);
        }
        Effect::HandOff => {
            if core.slots.is_occupied(Stage::Store) {
                log::trace!("{}: store slot busy", core.id);
                core.history.execute_stall_count += 1;
            } else {
                core.slots.advance(index, Stage::Execute, cycle)?;
            }
        }
    }
    Ok(())
}

/// Applies the effect of a decoded instruction
fn perform(
    core: &mut Core,
    mem: &mut impl StorageInterface,
    pc: u32,
    inst: &DecodedInstruction,
) -> SimulatorResult<Effect> {
    use Function::*;

    let function = inst.function;
    let rd = inst.rd();
    let rs1 = core.regs.read(inst.rs1());
    let rs2 = core.regs.read(inst.rs2());
    let imm = inst.imm();
    let link = pc.wrapping_add(4);

    let effect = match function {
        LUI => {
            core.regs.write(rd, imm as u32);
            Effect::Done
        }
        AUIPC => {
            core.regs.write(rd, pc.wrapping_add(imm as u32));
            Effect::Done
        }
        JAL => {
            core.regs.write(rd, link);
            Effect::Jump(pc.wrapping_add(imm as u32))
        }
        JALR => {
            // Target uses rs1 before rd is overwritten
            let target = alu(ALUOp::ADD, rs1 as i32, imm) as u32 & !1;
            core.regs.write(rd, link);
            Effect::Jump(target)
        }
        BEQ | BNE | BLT | BGE | BLTU | BGEU => {
            if branch_taken(function, rs1 as i32, rs2 as i32) {
                Effect::Jump(pc.wrapping_add(imm as u32))
            } else {
                Effect::Done
            }
        }
        LB | LH | LW | LBU | LHU | FLW => {
            let address = alu(alu_op(function), rs1 as i32, imm) as u32;
            match mem.read(core.id, address, false)? {
                Response::Ready(word) => {
                    core.regs.write(rd, extend_load(function, word));
                    Effect::Done
                }
                Response::Pending(_) => Effect::Stall,
                Response::Blocked { owner, .. } => {
                    log::trace!("{}: load of {:#06x} blocked by {}", core.id, address, owner);
                    core.history.blocked_count += 1;
                    Effect::Stall
                }
            }
        }
        SB | SH | SW | FSW => Effect::HandOff,
        FADDS | FSUBS | FMULS | FDIVS | FSQRTS => {
            core.regs.write(rd, fpu(function, rs1, rs2));
            Effect::Done
        }
        ADDI | SLTI | SLTIU | XORI | ORI | ANDI | SLLI | SRLI | SRAI | ADD | SUB
        | SLL | SLT | SLTU | XOR | SRL | SRA | OR | AND | MUL | MULH | MULHSU
        | MULHU | DIV | DIVU | REM | REMU => {
            let op2 = match ALUSrc::of(function) {
                ALUSrc::REG => rs2 as i32,
                ALUSrc::IMM => imm,
            };
            core.regs.write(rd, alu(alu_op(function), rs1 as i32, op2) as u32);
            Effect::Done
        }
    };
    Ok(effect)
}

/// MEM stage: drives the write of the instruction in the Store slot
pub fn store(core: &mut Core, mem: &mut impl StorageInterface) -> SimulatorResult<()> {
    let index = core.id.0;
    let Some(inst) = core.slots.get_mut(Stage::Store) else {
        return Ok(());
    };
    let Some(decoded) = inst.decoded else {
        return Err(ExecutionError::Undecoded { core: index, pc: inst.pc }.into());
    };

    let base = core.regs.read(decoded.rs1());
    let address = *inst
        .effective_address
        .get_or_insert_with(|| alu(ALUOp::ADD, base as i32, decoded.imm()) as u32);
    let source = decoded.rs2();
    let value = core.regs.read(source);
    let extra_delay = match decoded.function {
        Function::FSW => core.policy.float_store_extra_delay,
        _ => 0,
    };

    let step = decoded.function.mem_step();
    match mem.write(core.id, address, step, value, extra_delay, false)? {
        Response::Ready(()) => {
            log::trace!("{}: stored {:#x} to {:#06x}", core.id, value, address);
            core.release(source);
            if let Some(inst) = core.slots.take(Stage::Store) {
                core.retire(inst);
            }
        }
        Response::Pending(delays) => {
            log::trace!("{}: store to {:#06x} pending {:?}", core.id, address, delays);
            core.hold(source);
            core.history.store_stall_count += 1;
        }
        Response::Blocked { owner, delays } => {
            log::trace!(
                "{}: store to {:#06x} blocked by {} {:?}",
                core.id,
                address,
                owner,
                delays
            );
            core.hold(source);
            core.history.store_stall_count += 1;
            core.history.blocked_count += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CoreId;
    use crate::instruction::encode;
    use crate::instruction::Opcode;
    use crate::memory::bus::ArbitrationPolicy;
    use crate::memory::bus::Bus;
    use crate::memory::ram::Memory;

    fn setup(program: &[u32]) -> (Core, Bus) {
        let mut bus = Bus::make(Memory::make(0x1400, 2), ArbitrationPolicy::Fifo);
        for (i, word) in program.iter().enumerate() {
            bus.write32(CoreId(0), 4 * i as u32, *word, 0, true).unwrap();
        }
        let mut core = Core::make(CoreId(0), 0x0, 0x2ff, CorePolicy::default());
        core.set_program(0..4 * program.len() as u32);
        (core, bus)
    }

    fn run(core: &mut Core, bus: &mut Bus) {
        for _ in 0..2000 {
            if core.is_complete() {
                return;
            }
            core.tick(bus).unwrap();
        }
        panic!("core did not complete");
    }

    fn word(bus: &Bus, address: u32) -> u32 {
        bus.memory().dump(address, address + 4)[0]
    }

    #[test]
    fn test_latency_classes() {
        let policy = CorePolicy::default();
        assert_eq!(execute_latency(Function::FADDS, &policy), 5);
        assert_eq!(execute_latency(Function::FLW, &policy), 5);
        assert_eq!(execute_latency(Function::LW, &policy), 1);
        assert_eq!(execute_latency(Function::JALR, &policy), 1);
        assert_eq!(execute_latency(Function::SUB, &policy), 0);
        assert_eq!(execute_latency(Function::LB, &policy), 0);
    }

    #[test]
    fn test_extend_load() {
        assert_eq!(extend_load(Function::LB, 0x80ff), 0xffff_ffff);
        assert_eq!(extend_load(Function::LBU, 0x80ff), 0xff);
        assert_eq!(extend_load(Function::LH, 0x80ff), 0xffff_80ff);
        assert_eq!(extend_load(Function::LHU, 0x1_80ff), 0x80ff);
    }

    #[test]
    fn test_counted_loop() {
        let program = [
            encode::addi(5, 0, 0),
            encode::addi(6, 0, 3),
            encode::addi(5, 5, 1),
            encode::blt(5, 6, -4),
        ];
        let (mut core, mut bus) = setup(&program);
        run(&mut core, &mut bus);

        assert_eq!(core.regs.read(5), 3);
        // 2 setup instructions + 3 iterations of 2
        assert_eq!(core.history.inst_count, 8);
        assert!(core.is_halted());
    }

    #[test]
    fn test_store_then_load() {
        let program = [
            encode::addi(5, 0, 42),
            encode::sw(5, 0, 0x400),
            encode::lw(6, 0, 0x400),
        ];
        let (mut core, mut bus) = setup(&program);
        run(&mut core, &mut bus);

        assert_eq!(word(&bus, 0x400), 42);
        assert_eq!(core.regs.read(6), 42);
        assert!(core.history.store_stall_count > 0);
        assert!(core.held_registers().is_empty());
    }

    #[test]
    fn test_store_source_is_held() {
        let program = [
            encode::addi(5, 0, 42),
            encode::sw(5, 0, 0x400),
            encode::addi(5, 0, 9),
        ];
        let (mut core, mut bus) = setup(&program);
        run(&mut core, &mut bus);

        // The overwrite of t0 waits for the store to complete
        assert_eq!(word(&bus, 0x400), 42);
        assert_eq!(core.regs.read(5), 9);
    }

    #[test]
    fn test_load_into_held_register_waits_off_the_bus() {
        let program = [
            encode::addi(5, 0, 42),
            encode::sw(5, 0, 0x400),
            encode::lw(5, 0, 0x404),
        ];
        let (mut core, mut bus) = setup(&program);
        bus.write32(CoreId(0), 0x404, 7, 0, true).unwrap();

        let mut waited = false;
        for _ in 0..2000 {
            if core.is_complete() {
                break;
            }
            core.tick(&mut bus).unwrap();
            if core.is_held(5) {
                // The load has not started its read yet
                assert!(bus.memory().delays(0x404).is_idle());
                assert_eq!(bus.ownership(0x404), None);
                waited |= core
                    .slots
                    .get(Stage::Execute)
                    .is_some_and(|inst| inst.execute_delay == Some(0));
            }
        }

        assert!(core.is_complete());
        assert!(waited, "load never waited on the held register");
        assert_eq!(word(&bus, 0x400), 42);
        assert_eq!(core.regs.read(5), 7);
    }

    #[test]
    fn test_call_and_return() {
        let program = [
            encode::jal(1, 12),
            encode::addi(5, 5, 1),
            encode::jal(0, 12),
            encode::addi(6, 0, 7),
            encode::i(Opcode::Jalr, 0b000, 0, 1, 0),
        ];
        let (mut core, mut bus) = setup(&program);
        run(&mut core, &mut bus);

        assert_eq!(core.regs.read(1), 4);
        assert_eq!(core.regs.read(5), 1);
        assert_eq!(core.regs.read(6), 7);
        assert_eq!(core.history.inst_count, 5);
        assert_eq!(core.pc, 20);
    }

    #[test]
    fn test_sub_word_loads() {
        let load = |funct3, rd| encode::i(Opcode::Load, funct3, rd, 0, 0x400);
        let program = [load(0b000, 5), load(0b100, 6), load(0b001, 7), load(0b101, 8)];
        let (mut core, mut bus) = setup(&program);
        bus.write32(CoreId(0), 0x400, 0x80ff, 0, true).unwrap();
        run(&mut core, &mut bus);

        assert_eq!(core.regs.read(5), 0xffff_ffff);
        assert_eq!(core.regs.read(6), 0xff);
        assert_eq!(core.regs.read(7), 0xffff_80ff);
        assert_eq!(core.regs.read(8), 0x80ff);
    }

    #[test]
    fn test_sub_word_store() {
        let program = [
            encode::addi(5, 0, -1),
            encode::s(Opcode::Store, 0b000, 0, 5, 0x401),
        ];
        let (mut core, mut bus) = setup(&program);
        run(&mut core, &mut bus);
        assert_eq!(word(&bus, 0x400), 0xff00);
    }

    #[test]
    fn test_float_pipeline() {
        let program = [
            encode::i(Opcode::LoadFp, 0b010, 1, 0, 0x400),
            encode::i(Opcode::LoadFp, 0b010, 2, 0, 0x404),
            encode::r(Opcode::OpFp, 0b0000000, 0b000, 3, 1, 2),
            encode::s(Opcode::StoreFp, 0b010, 0, 3, 0x408),
        ];
        let (mut core, mut bus) = setup(&program);
        bus.write32(CoreId(0), 0x400, 1.5f32.to_bits(), 0, true).unwrap();
        bus.write32(CoreId(0), 0x404, 2.25f32.to_bits(), 0, true).unwrap();
        run(&mut core, &mut bus);

        assert_eq!(core.regs.read_f32(3), 3.75);
        assert_eq!(f32::from_bits(word(&bus, 0x408)), 3.75);
        // Every float instruction waits out the float latency
        assert!(core.history.execute_stall_count >= 4 * 5);
    }

    #[test]
    fn test_upper_immediates() {
        let program = [
            encode::u(Opcode::Lui, 5, 0x12345),
            encode::u(Opcode::AuiPc, 6, 0x1),
        ];
        let (mut core, mut bus) = setup(&program);
        run(&mut core, &mut bus);
        assert_eq!(core.regs.read(5), 0x1234_5000);
        assert_eq!(core.regs.read(6), 0x1004);
    }

    #[test]
    fn test_writes_to_zero_are_dropped() {
        let (mut core, mut bus) = setup(&[encode::addi(0, 0, 5)]);
        run(&mut core, &mut bus);
        assert_eq!(core.regs.read(0), 0);
        assert_eq!(core.history.inst_count, 1);
    }
}
