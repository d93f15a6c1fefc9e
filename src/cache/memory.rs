//! Process memory sampling for the `memory_usage` stat.

use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Reads the resident memory of the current process.
#[derive(Debug)]
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: get_current_pid().ok(),
        }
    }

    /// Resident memory in bytes, `0` where the platform offers no sample.
    pub fn sample(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}
