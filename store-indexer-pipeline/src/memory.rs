//! Process memory probing for the sync loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Reports the resident memory of the current process.
pub trait MemoryProbe: Send + Sync {
    /// Resident set size in bytes, or `None` if it cannot be measured.
    fn resident_bytes(&self) -> Option<u64>;
}

/// `MemoryProbe` backed by the operating system's process table.
pub struct SysinfoProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(pid).map(|process| process.memory())
    }
}

/// Probe reporting a settable value.
#[derive(Debug, Default)]
pub struct FixedProbe {
    bytes: AtomicU64,
}

impl FixedProbe {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedProbe {
    fn resident_bytes(&self) -> Option<u64> {
        Some(self.bytes.load(Ordering::SeqCst))
    }
}

/// The measured usage, if it is above `threshold_bytes`.
///
/// An unmeasurable process is never considered under pressure.
pub fn over_threshold(probe: &dyn MemoryProbe, threshold_bytes: u64) -> Option<u64> {
    probe
        .resident_bytes()
        .filter(|bytes| *bytes > threshold_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_reads_this_process_memory() {
        let probe = SysinfoProbe::new();

        assert!(probe.resident_bytes().is_some_and(|bytes| bytes > 0));
    }

    #[test]
    fn test_over_threshold() {
        let probe = FixedProbe::new(100);
        assert_eq!(over_threshold(&probe, 200), None);

        probe.set(300);
        assert_eq!(over_threshold(&probe, 200), Some(300));
    }
}
