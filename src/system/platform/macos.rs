use super::PlatformExtensions;
use crate::error::InitError;
use crate::system::counters::{AdapterCapacity, AdapterCatalog, CounterSource};
use crate::system::sysinfo_source::SysinfoCounterSource;

pub struct Platform;

impl PlatformExtensions for Platform {
    type Adapters = UnifiedMemory;

    fn open_adapters() -> UnifiedMemory {
        UnifiedMemory
    }

    fn open_counter_source() -> Result<Box<dyn CounterSource>, InitError> {
        Ok(Box::new(SysinfoCounterSource::new()))
    }
}

pub struct UnifiedMemory;

impl AdapterCatalog for UnifiedMemory {
    fn capacity(&self, _gpu_index: u32) -> Option<AdapterCapacity> {
        // No separate dedicated pool to report.
        None
    }
}
