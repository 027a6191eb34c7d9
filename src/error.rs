use std::path::PathBuf;

use thiserror::Error;

use crate::pipelined::pipeline::Stage;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to load program: {0}")]
    LoadError(#[from] LoadError),

    #[error("Core execution error: {0}")]
    ExecutionError(#[from] ExecutionError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Errors related to loading program binaries
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read program file '{0}': {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),

    #[error("Program of {size} bytes at {base:#010x} does not fit in memory")]
    DoesNotFit { base: u32, size: usize },
}

/// Errors related to core execution
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Core {core}: {stage:?} slot is already occupied")]
    SlotOccupied { core: usize, stage: Stage },

    #[error("Core {core}: {stage:?} has no successor stage")]
    NoSuccessor { core: usize, stage: Stage },

    #[error("Core {core}: instruction at {pc:#010x} left Decode without being decoded")]
    Undecoded { core: usize, pc: u32 },

    #[error("No such core: {0}")]
    UnknownCore(usize),
}

/// Errors related to memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory access error at address {address:#010x}: {kind}")]
    AccessError { address: u32, kind: MemoryErrorKind },

    #[error("Invalid access size: {0}")]
    InvalidAccessSize(u32),
}

/// Specific kinds of memory errors
#[derive(Error, Debug)]
pub enum MemoryErrorKind {
    #[error("Attempted to read outside addressable range")]
    ReadOutOfBounds,

    #[error("Attempted to write outside addressable range")]
    WriteOutOfBounds,
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
