use std::collections::HashMap;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use super::counters::{CounterBatch, CounterKind, CounterSource};
use crate::error::SampleError;

/// Counter source for platforms without a native counter facility.
///
/// Synthesizes the process-category counters from `sysinfo`, naming
/// instances the way the OS counter facility does (`name`, `name#1`, ...).
/// GPU counters and the user/kernel split are not available and come back
/// empty.
pub struct SysinfoCounterSource {
    sys: System,
}

impl Default for SysinfoCounterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoCounterSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        SysinfoCounterSource { sys }
    }
}

impl CounterSource for SysinfoCounterSource {
    fn collect(&mut self) -> Result<CounterBatch, SampleError> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        let mut processes: Vec<_> = self.sys.processes().iter().collect();
        processes.sort_by_key(|(pid, _)| pid.as_u32());

        let mut seen: HashMap<String, u32> = HashMap::new();
        let mut batch = CounterBatch::new();
        for (pid, process) in processes {
            let name = process.name().to_string_lossy().to_string();
            let occurrence = seen.entry(name.clone()).or_insert(0);
            let instance = if *occurrence == 0 {
                name
            } else {
                format!("{name}#{occurrence}")
            };
            *occurrence += 1;

            batch.push(CounterKind::ProcessId, instance.clone(), pid.as_u32() as f64);
            // sysinfo reports per-core percent, same scale as the processor-time counter.
            batch.push(
                CounterKind::ProcessorTime,
                instance.clone(),
                process.cpu_usage() as f64,
            );
            batch.push(CounterKind::WorkingSet, instance, process.memory() as f64);
        }

        Ok(batch)
    }
}
