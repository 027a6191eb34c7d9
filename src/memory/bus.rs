//! Shared memory bus.
//!
//! Every core talks to [`Memory`] through the bus. The first core whose
//! non-bypass access leaves an address pending becomes its owner; any other
//! core touching that address gets [`Response::Blocked`] carrying the owner's
//! last known delays, and memory is not polled on its behalf. Ownership is
//! released when the owner's operation completes or a bypass access is made.
//!
//! Who is granted a released address is decided by [`ArbitrationPolicy`].

use std::collections::HashMap;
use std::collections::VecDeque;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::ram::Memory;
use super::Delays;
use super::Response;
use super::StorageInterface;
use crate::cpu::CoreId;
use crate::error::SimulatorResult;

/// Grant policy for an address that was just released
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArbitrationPolicy {
    /// Refused cores queue per address and are granted in arrival order
    #[default]
    Fifo,
    /// Whichever core polls first after release wins; with cores stepped in
    /// index order this favours lower indices
    FirstTouch,
}

impl FromStr for ArbitrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(ArbitrationPolicy::Fifo),
            "first-touch" | "ft" => Ok(ArbitrationPolicy::FirstTouch),
            _ => Err(format!(
                "Invalid arbitration policy: '{}'. Expected 'fifo' or 'first-touch'.",
                s
            )),
        }
    }
}

/// In-flight operation owned by a core
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ownership {
    pub owner: CoreId,
    pub delays: Delays,
}

/// Memory bus
pub struct Bus {
    memory: Memory,
    owners: HashMap<u32, Ownership>,
    waiters: HashMap<u32, VecDeque<CoreId>>,
    policy: ArbitrationPolicy,
}

impl Bus {
    pub fn make(memory: Memory, policy: ArbitrationPolicy) -> Self {
        Self {
            memory,
            owners: HashMap::new(),
            waiters: HashMap::new(),
            policy,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn policy(&self) -> ArbitrationPolicy {
        self.policy
    }

    /// Current owner of an address
    pub fn ownership(&self, address: u32) -> Option<Ownership> {
        self.owners.get(&address).copied()
    }

    /// Cores queued for an address, oldest first
    pub fn waiting(&self, address: u32) -> Vec<CoreId> {
        self.waiters
            .get(&address)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default()
    }

    fn enqueue(&mut self, core: CoreId, address: u32) {
        if self.policy != ArbitrationPolicy::Fifo {
            return;
        }
        let queue = self.waiters.entry(address).or_default();
        if !queue.contains(&core) {
            queue.push_back(core);
        }
    }

    fn dequeue(&mut self, core: CoreId, address: u32) {
        if let Some(queue) = self.waiters.get_mut(&address) {
            queue.retain(|waiter| *waiter != core);
            if queue.is_empty() {
                self.waiters.remove(&address);
            }
        }
    }

    /// Returns the core `core` must wait for, if any
    fn arbitrate(&mut self, core: CoreId, address: u32) -> Option<(CoreId, Delays)> {
        if let Some(ownership) = self.owners.get(&address).copied() {
            if ownership.owner == core {
                return None;
            }
            self.enqueue(core, address);
            return Some((ownership.owner, ownership.delays));
        }

        let head = self.waiters.get(&address).and_then(|queue| queue.front().copied());
        match head {
            Some(head) if head != core => {
                self.enqueue(core, address);
                Some((head, Delays::default()))
            }
            Some(_) => {
                self.dequeue(core, address);
                None
            }
            None => None,
        }
    }

    /// Records the outcome of a forwarded access
    fn settle<T>(&mut self, core: CoreId, address: u32, response: &Response<T>) {
        match response {
            Response::Pending(delays) => {
                self.owners.insert(address, Ownership { owner: core, delays: *delays });
            }
            Response::Ready(_) => {
                self.owners.remove(&address);
            }
            Response::Blocked { .. } => {}
        }
    }
}

impl StorageInterface for Bus {
    fn read(
        &mut self,
        core: CoreId,
        address: u32,
        bypass: bool,
    ) -> SimulatorResult<Response<u32>> {
        if bypass {
            self.owners.remove(&address);
            return self.memory.read(address, true);
        }

        if let Some((owner, delays)) = self.arbitrate(core, address) {
            log::trace!("bus: {} read of {:#06x} blocked by {}", core, address, owner);
            return Ok(Response::Blocked { owner, delays });
        }

        let response = self.memory.read(address, false)?;
        self.settle(core, address, &response);
        Ok(response)
    }

    fn write(
        &mut self,
        core: CoreId,
        address: u32,
        step: u32,
        value: u32,
        extra_delay: u32,
        bypass: bool,
    ) -> SimulatorResult<Response<()>> {
        if bypass {
            self.owners.remove(&address);
            return self.memory.write(address, step, value, extra_delay, true);
        }

        if let Some((owner, delays)) = self.arbitrate(core, address) {
            log::trace!("bus: {} write of {:#06x} blocked by {}", core, address, owner);
            return Ok(Response::Blocked { owner, delays });
        }

        let response = self.memory.write(address, step, value, extra_delay, false)?;
        self.settle(core, address, &response);
        Ok(response)
    }

    fn abandon(&mut self, core: CoreId, address: u32) {
        self.dequeue(core, address);
        if self.owners.get(&address).is_some_and(|o| o.owner == core) {
            log::debug!("bus: {} abandons {:#06x}", core, address);
            self.owners.remove(&address);
            self.memory.cancel_load(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: CoreId = CoreId(0);
    const B: CoreId = CoreId(1);
    const C: CoreId = CoreId(2);

    fn bus(policy: ArbitrationPolicy) -> Bus {
        Bus::make(Memory::make(0x100, 2), policy)
    }

    #[test]
    fn test_peer_blocked_during_write() {
        let mut bus = bus(ArbitrationPolicy::Fifo);
        let claimed = bus.write32(A, 0x40, 7, 0, false).unwrap();
        assert_eq!(claimed, Response::Pending(Delays { store: 2, load: 0 }));
        let before = bus.memory().delays(0x40);

        // B can neither read nor write, and does not advance A's countdown
        for _ in 0..4 {
            assert_eq!(
                bus.read(B, 0x40, false).unwrap(),
                Response::Blocked { owner: A, delays: Delays { store: 2, load: 0 } }
            );
            assert_eq!(
                bus.write32(B, 0x40, 9, 0, false).unwrap(),
                Response::Blocked { owner: A, delays: Delays { store: 2, load: 0 } }
            );
        }
        assert_eq!(bus.memory().delays(0x40), before);

        // A completes and releases the address
        assert!(!bus.write32(A, 0x40, 7, 0, false).unwrap().is_ready());
        assert_eq!(bus.write32(A, 0x40, 7, 0, false).unwrap(), Response::Ready(()));
        assert_eq!(bus.ownership(0x40), None);

        // B now reads the committed value
        assert!(!bus.read(B, 0x40, false).unwrap().is_ready());
        assert!(!bus.read(B, 0x40, false).unwrap().is_ready());
        assert_eq!(bus.read(B, 0x40, false).unwrap(), Response::Ready(7));
    }

    #[test]
    fn test_blocked_reports_owner_delays() {
        let mut bus = bus(ArbitrationPolicy::FirstTouch);
        bus.read(A, 0x10, false).unwrap();
        bus.read(A, 0x10, false).unwrap();
        assert_eq!(
            bus.read(B, 0x10, false).unwrap(),
            Response::Blocked { owner: A, delays: Delays { store: 0, load: 1 } }
        );
    }

    #[test]
    fn test_unrelated_addresses_do_not_block() {
        let mut bus = bus(ArbitrationPolicy::Fifo);
        bus.read(A, 0x10, false).unwrap();
        assert_eq!(
            bus.read(B, 0x14, false).unwrap(),
            Response::Pending(Delays { store: 0, load: 2 })
        );
    }

    #[test]
    fn test_bypass_releases_ownership() {
        let mut bus = bus(ArbitrationPolicy::FirstTouch);
        bus.write32(A, 0x20, 1, 0, false).unwrap();
        assert_eq!(bus.ownership(0x20).map(|o| o.owner), Some(A));
        assert_eq!(bus.write32(B, 0x20, 3, 0, true).unwrap(), Response::Ready(()));
        assert_eq!(bus.ownership(0x20), None);
        assert_eq!(bus.read(B, 0x20, true).unwrap(), Response::Ready(3));
    }

    #[test]
    fn test_first_touch_favours_first_poller() {
        let mut bus = bus(ArbitrationPolicy::FirstTouch);
        bus.write32(A, 0x0, 1, 0, false).unwrap();
        assert!(matches!(bus.read(B, 0x0, false).unwrap(), Response::Blocked { .. }));
        bus.write32(A, 0x0, 1, 0, false).unwrap();
        bus.write32(A, 0x0, 1, 0, false).unwrap();

        // A polls again before B and wins again
        assert!(matches!(bus.read(A, 0x0, false).unwrap(), Response::Pending(_)));
        assert!(matches!(bus.read(B, 0x0, false).unwrap(), Response::Blocked { .. }));
        assert!(bus.waiting(0x0).is_empty());
    }

    #[test]
    fn test_fifo_grants_in_arrival_order() {
        let mut bus = bus(ArbitrationPolicy::Fifo);
        bus.write32(A, 0x0, 1, 0, false).unwrap();
        bus.read(C, 0x0, false).unwrap();
        bus.read(B, 0x0, false).unwrap();
        assert_eq!(bus.waiting(0x0), vec![C, B]);

        bus.write32(A, 0x0, 1, 0, false).unwrap();
        assert!(bus.write32(A, 0x0, 1, 0, false).unwrap().is_ready());

        // A and B are refused while C is at the head of the queue
        assert_eq!(
            bus.read(A, 0x0, false).unwrap(),
            Response::Blocked { owner: C, delays: Delays::default() }
        );
        assert!(matches!(bus.read(B, 0x0, false).unwrap(), Response::Blocked { .. }));
        assert!(matches!(bus.read(C, 0x0, false).unwrap(), Response::Pending(_)));
        assert_eq!(bus.ownership(0x0).map(|o| o.owner), Some(C));
        assert_eq!(bus.waiting(0x0), vec![B, A]);
    }

    #[test]
    fn test_abandon_releases_read() {
        let mut bus = bus(ArbitrationPolicy::Fifo);
        bus.read(A, 0x8, false).unwrap();
        bus.read(B, 0x8, false).unwrap();
        bus.abandon(A, 0x8);
        assert_eq!(bus.ownership(0x8), None);
        assert!(bus.memory().delays(0x8).is_idle());
        assert_eq!(
            bus.read(B, 0x8, false).unwrap(),
            Response::Pending(Delays { store: 0, load: 2 })
        );
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("FIFO".parse::<ArbitrationPolicy>(), Ok(ArbitrationPolicy::Fifo));
        assert_eq!(
            "first-touch".parse::<ArbitrationPolicy>(),
            Ok(ArbitrationPolicy::FirstTouch)
        );
        assert!("round-robin".parse::<ArbitrationPolicy>().is_err());
    }
}
