//! Memory structure: a latency-modelling store behind an arbitrating bus

pub mod bus;
pub mod ram;

use crate::cpu::CoreId;
use crate::error::SimulatorResult;

/// Remaining ticks of the in-flight operations on one address
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delays {
    pub store: u32,
    pub load: u32,
}

impl Delays {
    pub fn is_idle(&self) -> bool {
        self.store == 0 && self.load == 0
    }
}

/// Outcome of a single poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response<T> {
    /// The operation completed; reads carry the value
    Ready(T),
    /// This requester's own operation is still counting down
    Pending(Delays),
    /// Another core owns the address; `delays` are the owner's last known ones
    Blocked { owner: CoreId, delays: Delays },
}

impl<T> Response<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Response::Ready(_))
    }
}

/// Memory interface seen by a core
pub trait StorageInterface {
    /// Reads the 32-bit word at `address`
    fn read(
        &mut self,
        core: CoreId,
        address: u32,
        bypass: bool,
    ) -> SimulatorResult<Response<u32>>;

    /// Writes the low `step` bytes of `value` to `address`
    fn write(
        &mut self,
        core: CoreId,
        address: u32,
        step: u32,
        value: u32,
        extra_delay: u32,
        bypass: bool,
    ) -> SimulatorResult<Response<()>>;

    /// Gives up an outstanding read, e.g. a fetch discarded by a flush
    fn abandon(&mut self, core: CoreId, address: u32);

    fn write32(
        &mut self,
        core: CoreId,
        address: u32,
        value: u32,
        extra_delay: u32,
        bypass: bool,
    ) -> SimulatorResult<Response<()>> {
        self.write(core, address, 4, value, extra_delay, bypass)
    }
}
