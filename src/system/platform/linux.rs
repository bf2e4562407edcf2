use std::path::Path;

use super::PlatformExtensions;
use crate::error::InitError;
use crate::system::counters::{AdapterCapacity, AdapterCatalog, CounterSource};
use crate::system::sysinfo_source::SysinfoCounterSource;

pub struct Platform;

impl PlatformExtensions for Platform {
    type Adapters = SysfsAdapters;

    fn open_adapters() -> SysfsAdapters {
        SysfsAdapters
    }

    fn open_counter_source() -> Result<Box<dyn CounterSource>, InitError> {
        Ok(Box::new(SysinfoCounterSource::new()))
    }
}

/// Reads adapter sizes from `/sys/class/drm`.
pub struct SysfsAdapters;

impl AdapterCatalog for SysfsAdapters {
    fn capacity(&self, gpu_index: u32) -> Option<AdapterCapacity> {
        // amdgpu exposes VRAM and GTT (shared system memory) sizes in sysfs.
        let device = format!("/sys/class/drm/card{gpu_index}/device");
        let device = Path::new(&device);
        let dedicated_bytes = read_u64(&device.join("mem_info_vram_total"))?;
        let shared_bytes = read_u64(&device.join("mem_info_gtt_total")).unwrap_or(0);
        Some(AdapterCapacity {
            dedicated_bytes,
            shared_bytes,
        })
    }
}

fn read_u64(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
