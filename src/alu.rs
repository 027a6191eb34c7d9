//! ALU implementation

use crate::instruction::Function;

/// Performs an atomic ALU operation
/// Do signed arithmetic for good
pub fn alu(op: ALUOp, op1: i32, op2: i32) -> i32 {
    let shamt = (op2 & 0x1f) as u32;
    match op {
        ALUOp::ADD => op1.wrapping_add(op2),
        ALUOp::SUB => op1.wrapping_sub(op2),
        ALUOp::AND => op1 & op2,
        ALUOp::OR => op1 | op2,
        ALUOp::XOR => op1 ^ op2,
        ALUOp::SLL => op1.wrapping_shl(shamt),
        ALUOp::SRL => ((op1 as u32) >> shamt) as i32,
        ALUOp::SRA => op1.wrapping_shr(shamt),
        ALUOp::SLT => (op1 < op2) as i32,
        ALUOp::SLTU => ((op1 as u32) < (op2 as u32)) as i32,
        ALUOp::MUL => op1.wrapping_mul(op2),
        ALUOp::MULH => ((op1 as i64 * op2 as i64) >> 32) as i32,
        ALUOp::MULHSU => ((op1 as i64 * (op2 as u32) as i64) >> 32) as i32,
        ALUOp::MULHU => {
            (((op1 as u32) as u64 * (op2 as u32) as u64) >> 32) as i32
        }
        // Division by zero and overflow follow the RISC-V M extension
        ALUOp::DIV => match op2 {
            0 => -1,
            _ => op1.wrapping_div(op2),
        },
        ALUOp::DIVU => match op2 {
            0 => -1,
            _ => ((op1 as u32) / (op2 as u32)) as i32,
        },
        ALUOp::REM => match op2 {
            0 => op1,
            _ => op1.wrapping_rem(op2),
        },
        ALUOp::REMU => match op2 {
            0 => op1,
            _ => ((op1 as u32) % (op2 as u32)) as i32,
        },
    }
}

/// Evaluates a branch condition
pub fn branch_taken(function: Function, op1: i32, op2: i32) -> bool {
    match function {
        Function::BEQ => op1 == op2,
        Function::BNE => op1 != op2,
        Function::BLT => op1 < op2,
        Function::BGE => op1 >= op2,
        Function::BLTU => (op1 as u32) < (op2 as u32),
        Function::BGEU => (op1 as u32) >= (op2 as u32),
        _ => false,
    }
}

/// Single precision operation on raw register bits
pub fn fpu(function: Function, op1: u32, op2: u32) -> u32 {
    let (a, b) = (f32::from_bits(op1), f32::from_bits(op2));
    let result = match function {
        Function::FADDS => a + b,
        Function::FSUBS => a - b,
        Function::FMULS => a * b,
        Function::FDIVS => a / b,
        Function::FSQRTS => a.sqrt(),
        _ => return op1,
    };
    result.to_bits()
}

/// ALU operation selected by an instruction.
/// Address and link computations use ADD, branches compare with SUB.
pub fn alu_op(function: Function) -> ALUOp {
    use Function::*;
    match function {
        SUB | BEQ | BNE | BLT | BGE | BLTU | BGEU => ALUOp::SUB,
        AND | ANDI => ALUOp::AND,
        OR | ORI => ALUOp::OR,
        XOR | XORI => ALUOp::XOR,
        SLL | SLLI => ALUOp::SLL,
        SRL | SRLI => ALUOp::SRL,
        SRA | SRAI => ALUOp::SRA,
        SLT | SLTI => ALUOp::SLT,
        SLTU | SLTIU => ALUOp::SLTU,
        MUL => ALUOp::MUL,
        MULH => ALUOp::MULH,
        MULHSU => ALUOp::MULHSU,
        MULHU => ALUOp::MULHU,
        DIV => ALUOp::DIV,
        DIVU => ALUOp::DIVU,
        REM => ALUOp::REM,
        REMU => ALUOp::REMU,
        _ => ALUOp::ADD,
    }
}

/// Selector for ALU src2 input
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUSrc {
    // From register
    #[default]
    REG,
    // From immediate
    IMM,
}

impl ALUSrc {
    pub fn of(function: Function) -> Self {
        use Function::*;
        match function {
            ADDI | SLTI | SLTIU | XORI | ORI | ANDI | SLLI | SRLI | SRAI => {
                ALUSrc::IMM
            }
            _ => ALUSrc::REG,
        }
    }
}

/// Set of ALU operations needed for rv32im
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ALUOp {
    // Arithmetic
    #[default]
    ADD,
    SUB,
    // Logical
    AND,
    OR,
    XOR,
    // Set
    SLT,
    SLTU,
    // Shift
    SLL,
    SRL,
    SRA,
    // Multiply
    MUL,
    MULH,
    MULHSU,
    MULHU,
    // Divide
    DIV,
    DIVU,
    REM,
    REMU,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shifts_mask_amount() {
        assert_eq!(alu(ALUOp::SLL, 1, 33), 2);
        assert_eq!(alu(ALUOp::SRL, -1, 28), 0xf);
        assert_eq!(alu(ALUOp::SRA, -16, 2), -4);
    }

    #[test]
    fn test_multiply_high() {
        assert_eq!(alu(ALUOp::MULH, -1, -1), 0);
        assert_eq!(alu(ALUOp::MULHU, -1, -1), -2);
        assert_eq!(alu(ALUOp::MULHSU, -1, -1), -1);
        assert_eq!(alu(ALUOp::MUL, 6, 7), 42);
    }

    #[test]
    fn test_division_edge_cases() {
        assert_eq!(alu(ALUOp::DIV, 7, 0), -1);
        assert_eq!(alu(ALUOp::DIVU, 7, 0), -1);
        assert_eq!(alu(ALUOp::REM, 7, 0), 7);
        assert_eq!(alu(ALUOp::DIV, i32::MIN, -1), i32::MIN);
        assert_eq!(alu(ALUOp::REM, i32::MIN, -1), 0);
        assert_eq!(alu(ALUOp::DIV, -7, 2), -3);
        assert_eq!(alu(ALUOp::REMU, -1, 10), 5);
    }

    #[test]
    fn test_set_less_than() {
        assert_eq!(alu(ALUOp::SLT, -1, 0), 1);
        assert_eq!(alu(ALUOp::SLTU, -1, 0), 0);
    }

    #[test]
    fn test_branches() {
        assert!(branch_taken(Function::BLT, -1, 0));
        assert!(!branch_taken(Function::BLTU, -1, 0));
        assert!(branch_taken(Function::BGE, 3, 3));
        assert!(branch_taken(Function::BGEU, -1, 0));
        assert!(branch_taken(Function::BNE, 1, 2));
        assert!(!branch_taken(Function::ADD, 1, 1));
    }

    #[test]
    fn test_fpu() {
        let (a, b) = (1.5f32.to_bits(), 2.25f32.to_bits());
        assert_eq!(f32::from_bits(fpu(Function::FADDS, a, b)), 3.75);
        assert_eq!(f32::from_bits(fpu(Function::FSUBS, a, b)), -0.75);
        assert_eq!(f32::from_bits(fpu(Function::FMULS, a, b)), 3.375);
        assert_eq!(f32::from_bits(fpu(Function::FSQRTS, 2.25f32.to_bits(), 0)), 1.5);
    }

    #[test]
    fn test_alu_src() {
        assert_eq!(ALUSrc::of(Function::SRAI), ALUSrc::IMM);
        assert_eq!(ALUSrc::of(Function::SRA), ALUSrc::REG);
        assert_eq!(alu_op(Function::LW), ALUOp::ADD);
        assert_eq!(alu_op(Function::SRAI), ALUOp::SRA);
    }
}
