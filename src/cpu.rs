//! Architectural state shared by every core: register file, policy, history

use std::fmt;

/// ABI names, indexed by register number
const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1",
    "a2", "a3", "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// Returns the ABI name of a register
pub fn register_name(index: u32) -> &'static str {
    ABI_NAMES.get(index as usize).copied().unwrap_or("?")
}

/// Identity of a simulated core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreId(pub usize);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.0)
    }
}

/// Register simulation
#[derive(Clone, Copy, Debug, Default)]
pub struct Register {
    /// Current data in the register
    data: u32,
}

impl Register {
    pub fn new(data: u32) -> Self {
        Self { data }
    }

    /// Reads the register
    pub fn read(&self) -> u32 {
        self.data
    }

    /// Writes to register
    pub fn write(&mut self, value: u32) {
        self.data = value;
    }
}

/// Unified integer/float register file.
/// Float values live in the same slots, reinterpreted bit for bit.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterFile {
    gpr: [Register; 32],
}

impl RegisterFile {
    pub fn read(&self, index: u32) -> u32 {
        match index {
            0 => 0,
            i => self.gpr[(i & 0x1f) as usize].read(),
        }
    }

    /// Writes to `x0` are discarded
    pub fn write(&mut self, index: u32, value: u32) {
        if index != 0 {
            self.gpr[(index & 0x1f) as usize].write(value);
        }
    }

    pub fn read_f32(&self, index: u32) -> f32 {
        f32::from_bits(self.read(index))
    }

    pub fn write_f32(&mut self, index: u32, value: f32) {
        self.write(index, value.to_bits());
    }

    /// (name, value) of every register
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        (0..32).map(move |i| (register_name(i), self.read(i)))
    }
}

/// Per-core pipeline policy
#[derive(Clone, Copy, Debug)]
pub struct CorePolicy {
    /// Execute delay of floating-point instructions
    pub float_latency: u32,
    /// Execute delay of the single-cycle integer, branch and memory group
    pub integer_latency: u32,
    /// Extra store latency requested for `fsw`
    pub float_store_extra_delay: u32,
    /// Keep a record of every retired instruction
    pub record_timeline: bool,
}

impl Default for CorePolicy {
    fn default() -> Self {
        Self {
            float_latency: 5,
            integer_latency: 1,
            float_store_extra_delay: 0,
            record_timeline: false,
        }
    }
}

/// History module
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreHistory {
    /// Ticks this core has been stepped
    pub cycle_count: u64,
    /// Words fetched from memory, including flushed ones
    pub fetch_count: u64,
    /// Instructions that left the pipeline
    pub inst_count: u64,
    /// Instructions discarded by a flush
    pub flush_count: u64,
    /// Ticks Fetch spent waiting on memory
    pub fetch_stall_count: u64,
    /// Ticks Execute held an instruction without completing it
    pub execute_stall_count: u64,
    /// Ticks Store spent waiting on memory
    pub store_stall_count: u64,
    /// Polls refused because a peer owned the address
    pub blocked_count: u64,
}

impl CoreHistory {
    /// Cycles per retired instruction
    pub fn cpi(&self) -> f64 {
        if self.inst_count == 0 {
            0.0
        } else {
            self.cycle_count as f64 / self.inst_count as f64
        }
    }
}
