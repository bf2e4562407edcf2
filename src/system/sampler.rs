use std::collections::HashMap;

use sysinfo::System;

use super::counter_name::CounterName;
use super::counters::{AdapterCatalog, CounterBatch, CounterKind, CounterSource};
use super::process::{ProcessMetrics, ProcessTable};
use crate::error::SampleError;

/// Static host facts used to normalize every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInfo {
    pub logical_processors: usize,
    pub total_memory_bytes: u64,
}

impl HostInfo {
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        let logical = sys.cpus().len();
        HostInfo {
            logical_processors: if logical == 0 {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            } else {
                logical
            },
            total_memory_bytes: sys.total_memory(),
        }
    }
}

pub struct ProcessResourceSampler {
    source: Box<dyn CounterSource>,
    adapters: Box<dyn AdapterCatalog>,
    host: HostInfo,
    reserved_names: Vec<String>,
    table: ProcessTable,
}

impl ProcessResourceSampler {
    pub fn new(
        source: Box<dyn CounterSource>,
        adapters: Box<dyn AdapterCatalog>,
        host: HostInfo,
        reserved_names: Vec<String>,
    ) -> Self {
        ProcessResourceSampler {
            source,
            adapters,
            host,
            reserved_names,
            table: ProcessTable::default(),
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Collects and folds one tick. On failure the previous table is kept
    /// untouched.
    pub fn tick(&mut self) -> Result<&ProcessTable, SampleError> {
        let _span = tracing::debug_span!("sampler.tick").entered();

        let batch = self.source.collect()?;
        self.table = fold_batch(
            &batch,
            self.adapters.as_ref(),
            self.host,
            &self.reserved_names,
        );
        tracing::debug!(
            items = batch.len(),
            processes = self.table.len(),
            "process table refreshed"
        );
        Ok(&self.table)
    }
}

/// Builds a fresh process table from one collection.
pub fn fold_batch(
    batch: &CounterBatch,
    adapters: &dyn AdapterCatalog,
    host: HostInfo,
    reserved_names: &[String],
) -> ProcessTable {
    let _span = tracing::debug_span!("sampler.fold").entered();

    let mut processes: HashMap<u32, ProcessMetrics> = HashMap::new();
    let mut pid_by_instance: HashMap<&str, u32> = HashMap::new();

    for item in batch.items(CounterKind::ProcessId) {
        let pid = item.value as u32;
        let entry = processes.entry(pid).or_default();
        entry.pid = pid;
        entry.process_name = item.instance.clone();
        pid_by_instance.insert(item.instance.as_str(), pid);
    }

    for kind in [
        CounterKind::DedicatedVram,
        CounterKind::SharedVram,
        CounterKind::EngineUtilization,
    ] {
        for item in batch.items(kind) {
            fold_gpu_item(&mut processes, kind, &item.instance, item.value);
        }
    }

    for kind in [
        CounterKind::UserTime,
        CounterKind::PrivilegedTime,
        CounterKind::ProcessorTime,
        CounterKind::WorkingSet,
    ] {
        for item in batch.items(kind) {
            if is_reserved(&item.instance, reserved_names) {
                continue;
            }
            let Some(&pid) = pid_by_instance.get(item.instance.as_str()) else {
                continue;
            };
            let Some(process) = processes.get_mut(&pid) else {
                continue;
            };
            match kind {
                CounterKind::UserTime => process.cpu.user_percent = item.value,
                CounterKind::PrivilegedTime => process.cpu.kernel_percent = item.value,
                CounterKind::ProcessorTime => process.cpu.total_percent = item.value,
                CounterKind::WorkingSet => process.memory_usage_bytes = item.value.max(0.0) as u64,
                _ => {}
            }
        }
    }

    processes.retain(|_, p| {
        !p.process_name.is_empty() && !is_reserved(&p.process_name, reserved_names)
    });

    let cores = host.logical_processors.max(1) as f64;
    for process in processes.values_mut() {
        for gpu in process.gpus.values_mut() {
            if let Some(capacity) = adapters.capacity(gpu.gpu_index) {
                gpu.dedicated_available_bytes = capacity.dedicated_bytes;
                gpu.shared_available_bytes = capacity.shared_bytes;
            }
        }
        process.cpu.user_percent /= cores;
        process.cpu.kernel_percent /= cores;
        process.cpu.total_percent /= cores;
        process.memory_available_bytes = host.total_memory_bytes;
    }

    ProcessTable {
        processes: processes.into_iter().collect(),
    }
}

fn fold_gpu_item(
    processes: &mut HashMap<u32, ProcessMetrics>,
    kind: CounterKind,
    instance: &str,
    value: f64,
) {
    let name = CounterName::parse(instance);
    let Some(pid) = name.pid else {
        tracing::trace!(instance, "gpu counter without pid skipped");
        return;
    };
    let gpu_index = name.phys.unwrap_or(0);

    let process = processes.entry(pid).or_default();
    process.pid = pid;
    let gpu = process.gpus.entry(gpu_index).or_default();
    gpu.gpu_index = gpu_index;
    if let Some(luid) = name.luid {
        gpu.luid = luid;
    }

    match kind {
        CounterKind::DedicatedVram => gpu.dedicated_vram_bytes = value.max(0.0) as u64,
        CounterKind::SharedVram => gpu.shared_vram_bytes = value.max(0.0) as u64,
        CounterKind::EngineUtilization => {
            let engine_index = name.engine_index.unwrap_or(0);
            let engine = gpu.engines.entry(engine_index).or_default();
            engine.engine_index = engine_index;
            if let Some(ty) = name.engine_type {
                engine.engine_type = ty;
            }
            engine.utilization_percent = value as f32;
        }
        _ => {}
    }
}

/// Whole-name match, so `Idle` never hides `IdleChampions`.
fn is_reserved(name: &str, reserved_names: &[String]) -> bool {
    reserved_names.iter().any(|r| r == name)
}
