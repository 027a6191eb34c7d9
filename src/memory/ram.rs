//! Byte-addressable main memory with per-address access latency

use std::collections::HashMap;

use super::Delays;
use super::Response;
use crate::error::MemoryError;
use crate::error::MemoryErrorKind;
use crate::error::SimulatorResult;

/// Main memory
pub struct Memory {
    data: Vec<u8>,
    /// Only addresses with an operation in flight have an entry
    delays: HashMap<u32, Delays>,
    latency: u32,
}

impl Memory {
    /// Make a zeroed memory of `size` bytes with the given base latency
    pub fn make(size: usize, latency: u32) -> Self {
        Self { data: vec![0; size], delays: HashMap::new(), latency }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Delay state of an address
    pub fn delays(&self, address: u32) -> Delays {
        self.delays.get(&address).copied().unwrap_or_default()
    }

    fn check(&self, address: u32, step: u32, kind: MemoryErrorKind) -> SimulatorResult<usize> {
        let start = address as usize;
        if start + step as usize > self.data.len() {
            return Err(MemoryError::AccessError { address, kind }.into());
        }
        Ok(start)
    }

    fn get32(&self, start: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[start..start + 4]);
        u32::from_le_bytes(bytes)
    }

    fn set(&mut self, start: usize, step: u32, value: u32) {
        let bytes = value.to_le_bytes();
        self.data[start..start + step as usize]
            .copy_from_slice(&bytes[..step as usize]);
    }

    /// Polls a read of the word at `address`.
    /// A pending store on the same address always drains first.
    pub fn read(&mut self, address: u32, bypass: bool) -> SimulatorResult<Response<u32>> {
        let start = self.check(address, 4, MemoryErrorKind::ReadOutOfBounds)?;

        if bypass {
            self.delays.remove(&address);
            return Ok(Response::Ready(self.get32(start)));
        }

        let delays = self.delays.entry(address).or_default();
        if delays.store > 0 {
            return Ok(Response::Pending(*delays));
        }

        match delays.load {
            0 => {
                delays.load = self.latency;
                Ok(Response::Pending(*delays))
            }
            1 => {
                self.delays.remove(&address);
                Ok(Response::Ready(self.get32(start)))
            }
            _ => {
                delays.load -= 1;
                Ok(Response::Pending(*delays))
            }
        }
    }

    /// Polls a write of the low `step` bytes of `value` to `address`.
    /// The value is committed on the poll that completes the countdown.
    pub fn write(
        &mut self,
        address: u32,
        step: u32,
        value: u32,
        extra_delay: u32,
        bypass: bool,
    ) -> SimulatorResult<Response<()>> {
        if !matches!(step, 1 | 2 | 4) {
            return Err(MemoryError::InvalidAccessSize(step).into());
        }
        let start = self.check(address, step, MemoryErrorKind::WriteOutOfBounds)?;

        if bypass {
            self.delays.remove(&address);
            self.set(start, step, value);
            return Ok(Response::Ready(()));
        }

        let delays = self.delays.entry(address).or_default();
        match delays.store {
            0 => {
                delays.store = self.latency + extra_delay;
                Ok(Response::Pending(*delays))
            }
            1 => {
                delays.store = 0;
                if delays.is_idle() {
                    self.delays.remove(&address);
                }
                self.set(start, step, value);
                Ok(Response::Ready(()))
            }
            _ => {
                delays.store -= 1;
                Ok(Response::Pending(*delays))
            }
        }
    }

    /// Drops an in-flight load countdown on `address`
    pub fn cancel_load(&mut self, address: u32) {
        if let Some(delays) = self.delays.get_mut(&address) {
            delays.load = 0;
            if delays.is_idle() {
                self.delays.remove(&address);
            }
        }
    }

    /// Words in `[start, end)`, read without latency
    pub fn dump(&self, start: u32, end: u32) -> Vec<u32> {
        (start..end)
            .step_by(4)
            .filter(|address| *address as usize + 4 <= self.data.len())
            .map(|address| self.get32(address as usize))
            .collect()
    }
}
