//! Decoded instruction representation

use std::fmt;

use crate::cpu::register_name;

pub mod decode_helper;

pub use decode_helper::decode;

/// Supported major opcodes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Load,
    LoadFp,
    OpImm,
    AuiPc,
    Store,
    StoreFp,
    Op,
    Lui,
    OpFp,
    Branch,
    Jalr,
    Jal,
}

impl Opcode {
    /// Raw 7-bit encoding
    pub fn bits(self) -> u32 {
        match self {
            Opcode::Load => 0x03,
            Opcode::LoadFp => 0x07,
            Opcode::OpImm => 0x13,
            Opcode::AuiPc => 0x17,
            Opcode::Store => 0x23,
            Opcode::StoreFp => 0x27,
            Opcode::Op => 0x33,
            Opcode::Lui => 0x37,
            Opcode::OpFp => 0x53,
            Opcode::Branch => 0x63,
            Opcode::Jalr => 0x67,
            Opcode::Jal => 0x6f,
        }
    }
}

/// Instruction format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
}

/// Mnemonic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    // Loads
    LB,
    LH,
    LW,
    LBU,
    LHU,
    FLW,
    // Immediate ALU
    ADDI,
    SLLI,
    SLTI,
    SLTIU,
    XORI,
    SRLI,
    SRAI,
    ORI,
    ANDI,
    AUIPC,
    // Stores
    SB,
    SH,
    SW,
    FSW,
    // Register ALU
    ADD,
    SUB,
    MUL,
    SLL,
    MULH,
    SLT,
    MULHSU,
    SLTU,
    MULHU,
    XOR,
    DIV,
    SRL,
    SRA,
    DIVU,
    OR,
    REM,
    AND,
    REMU,
    LUI,
    // Branches and jumps
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
    JALR,
    JAL,
    // Single precision float
    FADDS,
    FSUBS,
    FMULS,
    FDIVS,
    FSQRTS,
}

impl Function {
    /// Assembly mnemonic, e.g. `addi` or `fadd.s`
    pub fn mnemonic(self) -> &'static str {
        use Function::*;
        match self {
            LB => "lb",
            LH => "lh",
            LW => "lw",
            LBU => "lbu",
            LHU => "lhu",
            FLW => "flw",
            ADDI => "addi",
            SLLI => "slli",
            SLTI => "slti",
            SLTIU => "sltiu",
            XORI => "xori",
            SRLI => "srli",
            SRAI => "srai",
            ORI => "ori",
            ANDI => "andi",
            AUIPC => "auipc",
            SB => "sb",
            SH => "sh",
            SW => "sw",
            FSW => "fsw",
            ADD => "add",
            SUB => "sub",
            MUL => "mul",
            SLL => "sll",
            MULH => "mulh",
            SLT => "slt",
            MULHSU => "mulhsu",
            SLTU => "sltu",
            MULHU => "mulhu",
            XOR => "xor",
            DIV => "div",
            SRL => "srl",
            SRA => "sra",
            DIVU => "divu",
            OR => "or",
            REM => "rem",
            AND => "and",
            REMU => "remu",
            LUI => "lui",
            BEQ => "beq",
            BNE => "bne",
            BLT => "blt",
            BGE => "bge",
            BLTU => "bltu",
            BGEU => "bgeu",
            JALR => "jalr",
            JAL => "jal",
            FADDS => "fadd.s",
            FSUBS => "fsub.s",
            FMULS => "fmul.s",
            FDIVS => "fdiv.s",
            FSQRTS => "fsqrt.s",
        }
    }

    pub fn is_float(self) -> bool {
        use Function::*;
        matches!(self, FLW | FSW | FADDS | FSUBS | FMULS | FDIVS | FSQRTS)
    }

    pub fn is_load(self) -> bool {
        use Function::*;
        matches!(self, LB | LH | LW | LBU | LHU | FLW)
    }

    pub fn is_store(self) -> bool {
        use Function::*;
        matches!(self, SB | SH | SW | FSW)
    }

    /// Whether the instruction writes `rd`
    pub fn writes_rd(self) -> bool {
        use Function::*;
        !(self.is_store() || matches!(self, BEQ | BNE | BLT | BGE | BLTU | BGEU))
    }

    /// Number of bytes moved by a memory access
    pub fn mem_step(self) -> u32 {
        use Function::*;
        match self {
            LB | LBU | SB => 1,
            LH | LHU | SH => 2,
            _ => 4,
        }
    }
}

/// Fields present in the instruction word.
/// Only those meaningful to the format are populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pub rd: Option<u32>,
    pub rs1: Option<u32>,
    pub rs2: Option<u32>,
    pub funct3: Option<u32>,
    pub funct7: Option<u32>,
    /// Sign-extended immediate
    pub imm: Option<i32>,
}

/// Fully decoded instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Raw representation
    pub raw: u32,
    pub opcode: Opcode,
    pub format: Format,
    pub function: Function,
    pub attributes: Attributes,
}

impl DecodedInstruction {
    pub fn rd(&self) -> u32 {
        self.attributes.rd.unwrap_or(0)
    }

    pub fn rs1(&self) -> u32 {
        self.attributes.rs1.unwrap_or(0)
    }

    pub fn rs2(&self) -> u32 {
        self.attributes.rs2.unwrap_or(0)
    }

    pub fn imm(&self) -> i32 {
        self.attributes.imm.unwrap_or(0)
    }

    /// Operands in canonical assembly order for the format
    pub fn operands(&self) -> Vec<Operand> {
        let a = &self.attributes;
        let reg = |r: Option<u32>| Operand::Reg(r.unwrap_or(0));
        match self.opcode {
            Opcode::Op | Opcode::OpFp => {
                if self.function == Function::FSQRTS {
                    vec![reg(a.rd), reg(a.rs1)]
                } else {
                    vec![reg(a.rd), reg(a.rs1), reg(a.rs2)]
                }
            }
            Opcode::OpImm => {
                let imm = match self.function {
                    Function::SLLI | Function::SRLI | Function::SRAI => {
                        self.imm() & 0x1f
                    }
                    _ => self.imm(),
                };
                vec![reg(a.rd), reg(a.rs1), Operand::Imm(imm)]
            }
            Opcode::Load | Opcode::LoadFp | Opcode::Jalr => vec![
                reg(a.rd),
                Operand::Offset { imm: self.imm(), base: self.rs1() },
            ],
            Opcode::Store | Opcode::StoreFp => vec![
                reg(a.rs2),
                Operand::Offset { imm: self.imm(), base: self.rs1() },
            ],
            Opcode::Branch => {
                vec![reg(a.rs1), reg(a.rs2), Operand::Imm(self.imm())]
            }
            // Upper immediates are shown as the 20-bit field
            Opcode::Lui | Opcode::AuiPc => {
                vec![reg(a.rd), Operand::Imm(((self.imm() as u32) >> 12) as i32)]
            }
            Opcode::Jal => vec![reg(a.rd), Operand::Imm(self.imm())],
        }
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function.mnemonic())?;
        for (i, operand) in self.operands().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
        }
        Ok(())
    }
}

/// A single assembly operand
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(u32),
    Imm(i32),
    /// `imm(base)` addressing
    Offset { imm: i32, base: u32 },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", register_name(*r)),
            Operand::Imm(imm) => write!(f, "{}", imm),
            Operand::Offset { imm, base } => {
                write!(f, "{}({})", imm, register_name(*base))
            }
        }
    }
}
