//! Ephemeral port allocation.

use std::fmt;
use std::ops::RangeInclusive;

/// IANA dynamic/private port range.
const DYNAMIC_PORTS: RangeInclusive<u16> = 49152..=65535;

/// Chooses a listening port when the configuration does not pin one.
///
/// Plugins hold an allocator instead of reaching for a process-wide helper, so
/// tests can hand in a deterministic one.
pub trait PortAllocator: Send + Sync + fmt::Debug {
    /// Returns a port to bind. `0` asks the OS to pick at bind time; the plugin
    /// then advertises whatever the listener reports.
    fn allocate(&self) -> u16;
}

/// Picks a random port from the dynamic range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPorts;

impl PortAllocator for RandomPorts {
    fn allocate(&self) -> u16 {
        fastrand::u16(DYNAMIC_PORTS)
    }
}

/// Defers the choice to the OS by binding port `0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsAssignedPorts;

impl PortAllocator for OsAssignedPorts {
    fn allocate(&self) -> u16 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ports_stay_in_dynamic_range() {
        for _ in 0..1000 {
            assert!(DYNAMIC_PORTS.contains(&RandomPorts.allocate()));
        }
    }

    #[test]
    fn test_os_assigned() {
        assert_eq!(OsAssignedPorts.allocate(), 0);
    }
}
