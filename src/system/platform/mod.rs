use crate::error::InitError;
use crate::system::counters::{AdapterCapacity, AdapterCatalog, CounterSource};

pub trait PlatformExtensions {
    type Adapters: AdapterCatalog;

    fn open_adapters() -> Self::Adapters;
    fn open_counter_source() -> Result<Box<dyn CounterSource>, InitError>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use self::windows as platform_impl;

/// Opens the native counter facility, registering every counter the sampler
/// needs. Failure here is fatal for startup.
pub fn open_counter_source() -> Result<Box<dyn CounterSource>, InitError> {
    platform_impl::Platform::open_counter_source()
}

type NativeAdapters = <platform_impl::Platform as PlatformExtensions>::Adapters;

/// Adapter catalog backed by the running platform. Any native handle it needs
/// is opened once here and reused for every lookup.
pub struct PlatformAdapters {
    native: NativeAdapters,
}

impl PlatformAdapters {
    pub fn open() -> Self {
        PlatformAdapters {
            native: platform_impl::Platform::open_adapters(),
        }
    }
}

impl AdapterCatalog for PlatformAdapters {
    fn capacity(&self, gpu_index: u32) -> Option<AdapterCapacity> {
        self.native.capacity(gpu_index)
    }
}
