use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::counter_name::Luid;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineMetric {
    pub engine_index: u32,
    pub engine_type: String,
    pub utilization_percent: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GpuMetric {
    pub gpu_index: u32,
    pub luid: Luid,
    pub dedicated_vram_bytes: u64,
    pub shared_vram_bytes: u64,
    pub dedicated_available_bytes: u64,
    pub shared_available_bytes: u64,
    pub engines: BTreeMap<u32, EngineMetric>,
}

/// CPU usage where 100% means every logical processor is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CpuUsage {
    pub user_percent: f64,
    pub kernel_percent: f64,
    pub total_percent: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub pid: u32,
    pub process_name: String,
    pub gpus: BTreeMap<u32, GpuMetric>,
    pub cpu: CpuUsage,
    pub memory_usage_bytes: u64,
    pub memory_available_bytes: u64,
}

/// Per-process resource table. Rebuilt from scratch on every sampling tick,
/// so nothing in it keeps identity across ticks.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProcessTable {
    pub processes: BTreeMap<u32, ProcessMetrics>,
}

impl ProcessTable {
    pub fn get(&self, pid: u32) -> Option<&ProcessMetrics> {
        self.processes.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Flat presentation rows, one per process, using the GPU the process
    /// is currently rendering on.
    pub fn rows(&self, key: SortKey, direction: SortDirection) -> Vec<ProcessRow> {
        let mut rows: Vec<ProcessRow> = self.processes.values().map(ProcessRow::from).collect();
        rows.sort_by(|a, b| {
            let ord = a.compare(b, key);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
        rows
    }
}

/// The GPU on which the process has an active 3D engine, if any.
pub fn current_gpu(process: &ProcessMetrics) -> Option<&GpuMetric> {
    process.gpus.values().find(|gpu| {
        gpu.engines
            .values()
            .any(|eng| eng.engine_type == "3D" && eng.utilization_percent > 0.0)
    })
}

/// Utilization of the first busy 3D engine.
pub fn gpu_3d_percent(gpu: &GpuMetric) -> f32 {
    gpu.engines
        .values()
        .find(|eng| eng.engine_type == "3D" && eng.utilization_percent > 0.0)
        .map(|eng| eng.utilization_percent)
        .unwrap_or(0.0)
}

/// Utilization of the first busy video encode/codec engine.
pub fn gpu_video_percent(gpu: &GpuMetric) -> f32 {
    gpu.engines
        .values()
        .find(|eng| {
            (eng.engine_type.contains("Encode") || eng.engine_type.contains("Codec"))
                && eng.utilization_percent > 0.0
        })
        .map(|eng| eng.utilization_percent)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Pid,
    Name,
    #[default]
    Cpu,
    Gpu,
    Video,
    DedicatedVram,
    SharedVram,
    Memory,
}

impl SortKey {
    pub fn next(self) -> Self {
        match self {
            SortKey::Pid => SortKey::Name,
            SortKey::Name => SortKey::Cpu,
            SortKey::Cpu => SortKey::Gpu,
            SortKey::Gpu => SortKey::Video,
            SortKey::Video => SortKey::DedicatedVram,
            SortKey::DedicatedVram => SortKey::SharedVram,
            SortKey::SharedVram => SortKey::Memory,
            SortKey::Memory => SortKey::Pid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Pid => "PID",
            SortKey::Name => "Name",
            SortKey::Cpu => "CPU",
            SortKey::Gpu => "GPU",
            SortKey::Video => "Video",
            SortKey::DedicatedVram => "D-VRAM",
            SortKey::SharedVram => "S-VRAM",
            SortKey::Memory => "Memory",
        }
    }

    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pid" => SortKey::Pid,
            "name" => SortKey::Name,
            "gpu" => SortKey::Gpu,
            "video" => SortKey::Video,
            "dedicated" | "d-vram" => SortKey::DedicatedVram,
            "shared" | "s-vram" => SortKey::SharedVram,
            "memory" => SortKey::Memory,
            _ => SortKey::Cpu,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub gpu_percent: f32,
    pub video_percent: f32,
    pub dedicated_vram_bytes: u64,
    pub shared_vram_bytes: u64,
    pub memory_bytes: u64,
}

impl ProcessRow {
    fn compare(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Pid => self.pid.cmp(&other.pid),
            SortKey::Name => self.name.cmp(&other.name),
            SortKey::Cpu => self.cpu_percent.total_cmp(&other.cpu_percent),
            SortKey::Gpu => self.gpu_percent.total_cmp(&other.gpu_percent),
            SortKey::Video => self.video_percent.total_cmp(&other.video_percent),
            SortKey::DedicatedVram => self.dedicated_vram_bytes.cmp(&other.dedicated_vram_bytes),
            SortKey::SharedVram => self.shared_vram_bytes.cmp(&other.shared_vram_bytes),
            SortKey::Memory => self.memory_bytes.cmp(&other.memory_bytes),
        }
        .then_with(|| self.pid.cmp(&other.pid))
    }
}

impl From<&ProcessMetrics> for ProcessRow {
    fn from(process: &ProcessMetrics) -> Self {
        let gpu = current_gpu(process);
        ProcessRow {
            pid: process.pid,
            name: process.process_name.clone(),
            cpu_percent: process.cpu.total_percent,
            gpu_percent: gpu.map(gpu_3d_percent).unwrap_or(0.0),
            video_percent: gpu.map(gpu_video_percent).unwrap_or(0.0),
            dedicated_vram_bytes: gpu.map(|g| g.dedicated_vram_bytes).unwrap_or(0),
            shared_vram_bytes: gpu.map(|g| g.shared_vram_bytes).unwrap_or(0),
            memory_bytes: process.memory_usage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(index: u32, ty: &str, util: f32) -> (u32, EngineMetric) {
        (
            index,
            EngineMetric {
                engine_index: index,
                engine_type: ty.to_string(),
                utilization_percent: util,
            },
        )
    }

    fn process(pid: u32, name: &str, cpu: f64, gpu_util: f32, vram: u64) -> ProcessMetrics {
        let gpu = GpuMetric {
            gpu_index: 0,
            dedicated_vram_bytes: vram,
            engines: [engine(0, "3D", gpu_util), engine(5, "VideoEncode", 4.0)]
                .into_iter()
                .collect(),
            ..GpuMetric::default()
        };
        ProcessMetrics {
            pid,
            process_name: name.to_string(),
            gpus: [(0, gpu)].into_iter().collect(),
            cpu: CpuUsage {
                total_percent: cpu,
                ..CpuUsage::default()
            },
            memory_usage_bytes: pid as u64 * 1000,
            memory_available_bytes: 0,
        }
    }

    fn table() -> ProcessTable {
        let processes = vec![
            process(10, "vrserver", 3.5, 12.0, 300),
            process(20, "game", 22.0, 71.0, 4_000),
            process(30, "browser", 8.0, 0.0, 900),
        ];
        ProcessTable {
            processes: processes.into_iter().map(|p| (p.pid, p)).collect(),
        }
    }

    #[test]
    fn current_gpu_requires_busy_3d_engine() {
        let t = table();
        assert!(current_gpu(t.get(20).unwrap()).is_some());
        assert!(current_gpu(t.get(30).unwrap()).is_none());
    }

    #[test]
    fn video_percent_matches_encode_and_codec() {
        let gpu = GpuMetric {
            engines: [engine(0, "3D", 0.0), engine(1, "Video Codec", 9.0)]
                .into_iter()
                .collect(),
            ..GpuMetric::default()
        };
        assert_eq!(gpu_3d_percent(&gpu), 0.0);
        assert_eq!(gpu_video_percent(&gpu), 9.0);
    }

    #[test]
    fn rows_sort_by_gpu_descending() {
        let rows = table().rows(SortKey::Gpu, SortDirection::Descending);
        let pids: Vec<u32> = rows.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![20, 10, 30]);
        assert_eq!(rows[2].dedicated_vram_bytes, 0);
        assert_eq!(rows[0].video_percent, 4.0);
    }

    #[test]
    fn rows_sort_by_name_ascending() {
        let rows = table().rows(SortKey::Name, SortDirection::Ascending);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["browser", "game", "vrserver"]);
    }

    #[test]
    fn sort_key_cycles_through_all_columns() {
        let mut key = SortKey::Pid;
        for _ in 0..8 {
            key = key.next();
        }
        assert_eq!(key, SortKey::Pid);
        assert_eq!(SortKey::from_str_config("MEMORY"), SortKey::Memory);
        assert_eq!(SortKey::from_str_config("bogus"), SortKey::Cpu);
    }
}
