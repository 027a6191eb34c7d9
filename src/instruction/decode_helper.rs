//! Decoding helper functions.
//! Field layout follows the RV32I base encoding; mnemonic selection is a
//! two-level table keyed by funct3 and then, for some entries, by funct7.

use super::Attributes;
use super::DecodedInstruction;
use super::Format;
use super::Function;
use super::Opcode;

/// A funct3 slot resolves either to a mnemonic or to a funct7 sub-table
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Entry {
    Leaf(Function),
    Branch(&'static [(u32, Function)]),
}

const SRLI_SRAI: &[(u32, Function)] =
    &[(0b0000000, Function::SRLI), (0b0100000, Function::SRAI)];

const ADD_SUB_MUL: &[(u32, Function)] = &[
    (0b0000000, Function::ADD),
    (0b0100000, Function::SUB),
    (0b0000001, Function::MUL),
];
const SLL_MULH: &[(u32, Function)] =
    &[(0b0000000, Function::SLL), (0b0000001, Function::MULH)];
const SLT_MULHSU: &[(u32, Function)] =
    &[(0b0000000, Function::SLT), (0b0000001, Function::MULHSU)];
const SLTU_MULHU: &[(u32, Function)] =
    &[(0b0000000, Function::SLTU), (0b0000001, Function::MULHU)];
const XOR_DIV: &[(u32, Function)] =
    &[(0b0000000, Function::XOR), (0b0000001, Function::DIV)];
const SRL_SRA_DIVU: &[(u32, Function)] = &[
    (0b0000000, Function::SRL),
    (0b0100000, Function::SRA),
    (0b0000001, Function::DIVU),
];
const OR_REM: &[(u32, Function)] =
    &[(0b0000000, Function::OR), (0b0000001, Function::REM)];
const AND_REMU: &[(u32, Function)] =
    &[(0b0000000, Function::AND), (0b0000001, Function::REMU)];

const FLOAT_SINGLE: &[(u32, Function)] = &[
    (0b0000000, Function::FADDS),
    (0b0000100, Function::FSUBS),
    (0b0001000, Function::FMULS),
    (0b0001100, Function::FDIVS),
    (0b0101100, Function::FSQRTS),
];

/// First level of the mnemonic table.
/// `funct3` is `None` for formats without the field (U and J).
pub fn lookup(opcode: Opcode, funct3: Option<u32>) -> Option<Entry> {
    use Entry::*;
    use Function::*;

    let entry = match (opcode, funct3) {
        (Opcode::Load, Some(0b000)) => Leaf(LB),
        (Opcode::Load, Some(0b001)) => Leaf(LH),
        (Opcode::Load, Some(0b010)) => Leaf(LW),
        (Opcode::Load, Some(0b100)) => Leaf(LBU),
        (Opcode::Load, Some(0b101)) => Leaf(LHU),
        // funct3 110 under LOAD is also flw
        (Opcode::Load, Some(0b110)) => Leaf(FLW),
        (Opcode::LoadFp, Some(0b010)) => Leaf(FLW),
        (Opcode::OpImm, Some(0b000)) => Leaf(ADDI),
        (Opcode::OpImm, Some(0b001)) => Leaf(SLLI),
        (Opcode::OpImm, Some(0b010)) => Leaf(SLTI),
        (Opcode::OpImm, Some(0b011)) => Leaf(SLTIU),
        (Opcode::OpImm, Some(0b100)) => Leaf(XORI),
        (Opcode::OpImm, Some(0b101)) => Branch(SRLI_SRAI),
        (Opcode::OpImm, Some(0b110)) => Leaf(ORI),
        (Opcode::OpImm, Some(0b111)) => Leaf(ANDI),
        (Opcode::AuiPc, None) => Leaf(AUIPC),
        (Opcode::Store, Some(0b000)) => Leaf(SB),
        (Opcode::Store, Some(0b001)) => Leaf(SH),
        (Opcode::Store, Some(0b010)) => Leaf(SW),
        (Opcode::StoreFp, Some(0b010)) => Leaf(FSW),
        (Opcode::Op, Some(0b000)) => Branch(ADD_SUB_MUL),
        (Opcode::Op, Some(0b001)) => Branch(SLL_MULH),
        (Opcode::Op, Some(0b010)) => Branch(SLT_MULHSU),
        (Opcode::Op, Some(0b011)) => Branch(SLTU_MULHU),
        (Opcode::Op, Some(0b100)) => Branch(XOR_DIV),
        (Opcode::Op, Some(0b101)) => Branch(SRL_SRA_DIVU),
        (Opcode::Op, Some(0b110)) => Branch(OR_REM),
        (Opcode::Op, Some(0b111)) => Branch(AND_REMU),
        (Opcode::Lui, None) => Leaf(LUI),
        (Opcode::Branch, Some(0b000)) => Leaf(BEQ),
        (Opcode::Branch, Some(0b001)) => Leaf(BNE),
        (Opcode::Branch, Some(0b100)) => Leaf(BLT),
        (Opcode::Branch, Some(0b101)) => Leaf(BGE),
        (Opcode::Branch, Some(0b110)) => Leaf(BLTU),
        (Opcode::Branch, Some(0b111)) => Leaf(BGEU),
        (Opcode::Jalr, Some(0b000)) => Leaf(JALR),
        (Opcode::Jal, None) => Leaf(JAL),
        (Opcode::OpFp, Some(0b000)) => Branch(FLOAT_SINGLE),
        _ => return None,
    };
    Some(entry)
}

/// Second level of the mnemonic table
fn resolve(entry: Entry, funct7: u32) -> Option<Function> {
    match entry {
        Entry::Leaf(function) => Some(function),
        Entry::Branch(table) => table
            .iter()
            .find(|(key, _)| *key == funct7)
            .map(|(_, function)| *function),
    }
}

/// Decodes a raw word. `None` means the word is not a supported instruction.
pub fn decode(raw: u32) -> Option<DecodedInstruction> {
    let opcode = raw_to_opcode(raw)?;
    let format = opcode_to_format(opcode);
    let attributes = parse(raw, format);

    let entry = lookup(opcode, attributes.funct3)?;
    let function = resolve(entry, get_funct7(raw))?;

    Some(DecodedInstruction { raw, opcode, format, function, attributes })
}

/// Returns the opcode from a raw instruction
pub fn raw_to_opcode(raw: u32) -> Option<Opcode> {
    match get_opcode(raw) {
        0x03 => Some(Opcode::Load),
        0x07 => Some(Opcode::LoadFp),
        0x13 => Some(Opcode::OpImm),
        0x17 => Some(Opcode::AuiPc),
        0x23 => Some(Opcode::Store),
        0x27 => Some(Opcode::StoreFp),
        0x33 => Some(Opcode::Op),
        0x37 => Some(Opcode::Lui),
        0x53 => Some(Opcode::OpFp),
        0x63 => Some(Opcode::Branch),
        0x67 => Some(Opcode::Jalr),
        0x6f => Some(Opcode::Jal),
        _ => None,
    }
}

/// Returns the instruction format from an opcode
pub fn opcode_to_format(opcode: Opcode) -> Format {
    match opcode {
        Opcode::Op | Opcode::OpFp => Format::R,
        Opcode::Load | Opcode::LoadFp | Opcode::OpImm | Opcode::Jalr => {
            Format::I
        }
        Opcode::Store | Opcode::StoreFp => Format::S,
        Opcode::Branch => Format::B,
        Opcode::Lui | Opcode::AuiPc => Format::U,
        Opcode::Jal => Format::J,
    }
}

/// Parses the fields relevant to the format
pub fn parse(raw: u32, format: Format) -> Attributes {
    match format {
        Format::R => Attributes {
            rd: Some(get_rd(raw)),
            rs1: Some(get_rs1(raw)),
            rs2: Some(get_rs2(raw)),
            funct3: Some(get_funct3(raw)),
            funct7: Some(get_funct7(raw)),
            imm: None,
        },
        Format::I => Attributes {
            rd: Some(get_rd(raw)),
            rs1: Some(get_rs1(raw)),
            funct3: Some(get_funct3(raw)),
            imm: Some(imm_i(raw)),
            ..Default::default()
        },
        Format::S => Attributes {
            rs1: Some(get_rs1(raw)),
            rs2: Some(get_rs2(raw)),
            funct3: Some(get_funct3(raw)),
            imm: Some(imm_s(raw)),
            ..Default::default()
        },
        Format::B => Attributes {
            rs1: Some(get_rs1(raw)),
            rs2: Some(get_rs2(raw)),
            funct3: Some(get_funct3(raw)),
            imm: Some(imm_b(raw)),
            ..Default::default()
        },
        Format::U => Attributes {
            rd: Some(get_rd(raw)),
            imm: Some(imm_u(raw)),
            ..Default::default()
        },
        Format::J => Attributes {
            rd: Some(get_rd(raw)),
            imm: Some(imm_j(raw)),
            ..Default::default()
        },
    }
}

/// Sign-extends the low `bits` bits of `value`
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shamt = 32 - bits;
    ((value << shamt) as i32) >> shamt
}

/// imm[11:0] = raw[31:20]
pub fn imm_i(raw: u32) -> i32 {
    sign_extend(raw >> 20, 12)
}

/// imm[11:5] = raw[31:25], imm[4:0] = raw[11:7]
pub fn imm_s(raw: u32) -> i32 {
    sign_extend(((raw >> 25) << 5) | ((raw >> 7) & 0x1f), 12)
}

/// imm[12|10:5] = raw[31:25], imm[4:1|11] = raw[11:7]
pub fn imm_b(raw: u32) -> i32 {
    let imm = ((raw >> 31) & 0x1) << 12
        | ((raw >> 7) & 0x1) << 11
        | ((raw >> 25) & 0x3f) << 5
        | ((raw >> 8) & 0xf) << 1;
    sign_extend(imm, 13)
}

/// imm[31:12] = raw[31:12]
pub fn imm_u(raw: u32) -> i32 {
    (raw & 0xfffff000) as i32
}

/// imm[20|10:1|11|19:12] = raw[31:12]
pub fn imm_j(raw: u32) -> i32 {
    let imm = ((raw >> 31) & 0x1) << 20
        | ((raw >> 21) & 0x3ff) << 1
        | ((raw >> 20) & 0x1) << 11
        | ((raw >> 12) & 0xff) << 12;
    sign_extend(imm, 21)
}

/// Extracts opcode from a raw instruction
pub fn get_opcode(raw: u32) -> u32 {
    raw & 0x7f
}

/// Extracts funct3 from a raw instruction
pub fn get_funct3(raw: u32) -> u32 {
    (raw >> 12) & 0x7
}

/// Extracts the rs1 field from a raw instruction
pub fn get_rs1(raw: u32) -> u32 {
    (raw >> 15) & 0x1f
}

/// Extracts the rs2 field from a raw instruction
pub fn get_rs2(raw: u32) -> u32 {
    (raw >> 20) & 0x1f
}

/// Extracts the rd field from a raw instruction
pub fn get_rd(raw: u32) -> u32 {
    (raw >> 7) & 0x1f
}

/// Extracts the funct7 field from a raw instruction
pub fn get_funct7(raw: u32) -> u32 {
    (raw >> 25) & 0x7f
}
