//! Slave registry: the master's table of bus peers.
//!
//! The registry maps slave addresses to their device implementations and
//! tracks liveness. Slaves are added administratively at startup and never
//! removed. The table is bounded and kept sorted by address, so lookups
//! from the receive path are a binary search.
//!
//! Liveness works on silence: every reply from a slave re-arms its
//! staleness deadline, and a slave that stays silent past the window is
//! marked disconnected (the entry itself stays). The probe scheduler then
//! starts probing it again.

use std::time::Duration;

use tokio::time::Instant;

use crate::device::Device;
use crate::error::BusError;

/// Hard cap on registered slaves; the bus supports a small fixed set.
pub const MAX_SLAVES: usize = 10;

/// A slave is considered lost after this much silence.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(2);

/// One occupied slot in the slave table.
pub struct SlaveEntry {
    addr: u8,
    device: Box<dyn Device>,
    connected: bool,
    stale_at: Option<Instant>,
}

impl SlaveEntry {
    /// Bus address of this slave.
    #[inline]
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Whether the slave has answered a probe and is not stale.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Mutable access to the device implementation.
    #[inline]
    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }
}

/// Bounded, address-sorted table of slaves.
#[derive(Default)]
pub struct SlaveRegistry {
    slaves: Vec<SlaveEntry>,
}

impl SlaveRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slaves: Vec::with_capacity(MAX_SLAVES),
        }
    }

    /// Register a device at a bus address.
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidAddress`] for address zero (the master),
    /// [`BusError::AlreadyPresent`] for a duplicate address,
    /// [`BusError::RegistryFull`] when all [`MAX_SLAVES`] slots are taken.
    pub fn add(&mut self, addr: u8, device: Box<dyn Device>) -> Result<(), BusError> {
        if addr == 0 {
            return Err(BusError::InvalidAddress(addr));
        }

        match self.slaves.binary_search_by_key(&addr, |s| s.addr) {
            Ok(_) => Err(BusError::AlreadyPresent(addr)),
            Err(pos) => {
                if self.slaves.len() >= MAX_SLAVES {
                    return Err(BusError::RegistryFull);
                }
                self.slaves.insert(
                    pos,
                    SlaveEntry {
                        addr,
                        device,
                        connected: false,
                        stale_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    /// Find the table index for an address.
    pub fn lookup(&self, addr: u8) -> Option<usize> {
        self.slaves.binary_search_by_key(&addr, |s| s.addr).ok()
    }

    /// Borrow an entry by index.
    pub fn get(&self, idx: usize) -> &SlaveEntry {
        &self.slaves[idx]
    }

    /// Mutably borrow an entry by index.
    pub fn get_mut(&mut self, idx: usize) -> &mut SlaveEntry {
        &mut self.slaves[idx]
    }

    /// Mark a slave connected and re-arm its staleness deadline.
    ///
    /// Called when a probe reply arrives.
    pub fn mark_alive(&mut self, idx: usize, now: Instant) {
        let entry = &mut self.slaves[idx];
        entry.connected = true;
        entry.stale_at = Some(now + STALENESS_WINDOW);
    }

    /// Re-arm the staleness deadline without touching the connected flag.
    ///
    /// Called for every reply; any traffic from a slave proves it alive.
    pub fn refresh(&mut self, idx: usize, now: Instant) {
        self.slaves[idx].stale_at = Some(now + STALENESS_WINDOW);
    }

    /// The earliest pending staleness deadline across the table.
    pub fn next_staleness(&self) -> Option<Instant> {
        self.slaves.iter().filter_map(|s| s.stale_at).min()
    }

    /// Disconnect every slave whose staleness deadline has passed.
    pub fn expire_stale(&mut self, now: Instant) {
        for entry in &mut self.slaves {
            if entry.stale_at.is_some_and(|at| at <= now) {
                tracing::warn!("communication lost with slave {:#04x}", entry.addr);
                entry.connected = false;
                entry.stale_at = None;
            }
        }
    }

    /// Iterate occupied entries in ascending address order.
    pub fn entries(&self) -> impl Iterator<Item = &SlaveEntry> {
        self.slaves.iter()
    }

    /// Mutably iterate occupied entries in ascending address order.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut SlaveEntry> {
        self.slaves.iter_mut()
    }

    /// Number of registered slaves.
    pub fn len(&self) -> usize {
        self.slaves.len()
    }

    /// Check if no slaves are registered.
    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }
}
