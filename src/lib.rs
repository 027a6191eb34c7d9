pub mod alu;
pub mod config;
pub mod cpu;
pub mod flags;
pub mod instruction;
pub mod loader;
pub mod memory;
pub mod report;
pub mod run_wrapper;
pub mod simulator;

pub mod pipelined;

pub mod error;
