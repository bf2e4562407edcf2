use ::windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, IDXGIFactory1};
use windows_sys::Win32::System::Performance::{
    PDH_FMT_COUNTERVALUE_ITEM_W, PDH_FMT_DOUBLE, PDH_FMT_LARGE, PDH_FMT_NOCAP100, PDH_HCOUNTER,
    PDH_HQUERY, PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData,
    PdhGetFormattedCounterArrayW, PdhOpenQueryW,
};

use super::PlatformExtensions;
use crate::error::{InitError, SampleError};
use crate::system::counters::{
    AdapterCapacity, AdapterCatalog, CounterBatch, CounterItem, CounterKind, CounterSource,
};

const STATUS_SUCCESS: u32 = 0;
const PDH_MORE_DATA: u32 = 0x8000_07D2;
const PDH_NO_DATA: u32 = 0x8000_07D5;

pub struct Platform;

impl PlatformExtensions for Platform {
    type Adapters = DxgiAdapters;

    fn open_adapters() -> DxgiAdapters {
        DxgiAdapters::open()
    }

    fn open_counter_source() -> Result<Box<dyn CounterSource>, InitError> {
        Ok(Box::new(PdhCounterSource::open()?))
    }
}

/// DXGI factory held for the life of the sampler. Adapter `N` of the
/// factory enumeration is physical GPU `N` in the counter instance names.
pub struct DxgiAdapters {
    factory: Option<IDXGIFactory1>,
}

impl DxgiAdapters {
    pub fn open() -> Self {
        let factory = match unsafe { CreateDXGIFactory1::<IDXGIFactory1>() } {
            Ok(factory) => Some(factory),
            Err(err) => {
                tracing::warn!(error = %err, "CreateDXGIFactory1 failed, adapter capacity unavailable");
                None
            }
        };
        DxgiAdapters { factory }
    }
}

impl AdapterCatalog for DxgiAdapters {
    fn capacity(&self, gpu_index: u32) -> Option<AdapterCapacity> {
        let factory = self.factory.as_ref()?;
        let adapter = unsafe { factory.EnumAdapters1(gpu_index) }.ok()?;
        let desc = unsafe { adapter.GetDesc1() }.ok()?;
        Some(AdapterCapacity {
            dedicated_bytes: desc.DedicatedVideoMemory as u64,
            shared_bytes: desc.SharedSystemMemory as u64,
        })
    }
}

/// Performance Data Helper query with the full counter set registered.
pub struct PdhCounterSource {
    query: PDH_HQUERY,
    counters: Vec<(CounterKind, PDH_HCOUNTER)>,
}

impl PdhCounterSource {
    pub fn open() -> Result<Self, InitError> {
        let mut query: PDH_HQUERY = unsafe { std::mem::zeroed() };
        let status = unsafe { PdhOpenQueryW(std::ptr::null(), 0, &mut query) } as u32;
        if status != STATUS_SUCCESS {
            return Err(InitError::OpenQuery(format!("PdhOpenQueryW returned {status:#x}")));
        }

        // Dropping `source` on an early return closes the query.
        let mut source = PdhCounterSource {
            query,
            counters: Vec::with_capacity(CounterKind::ALL.len()),
        };

        for kind in CounterKind::ALL {
            let path = wide(kind.path());
            let mut counter: PDH_HCOUNTER = unsafe { std::mem::zeroed() };
            let status =
                unsafe { PdhAddEnglishCounterW(source.query, path.as_ptr(), 0, &mut counter) }
                    as u32;
            if status != STATUS_SUCCESS {
                return Err(InitError::CounterRegistration {
                    path: kind.path(),
                    reason: format!("PdhAddEnglishCounterW returned {status:#x}"),
                });
            }
            source.counters.push((kind, counter));
        }

        Ok(source)
    }

    fn read_array(&self, kind: CounterKind, counter: PDH_HCOUNTER) -> Result<Vec<CounterItem>, SampleError> {
        let integral = kind == CounterKind::ProcessId || kind.is_gpu();
        let format = if integral {
            PDH_FMT_LARGE
        } else {
            PDH_FMT_DOUBLE | PDH_FMT_NOCAP100
        };

        let mut size: u32 = 0;
        let mut count: u32 = 0;
        let status = unsafe {
            PdhGetFormattedCounterArrayW(counter, format, &mut size, &mut count, std::ptr::null_mut())
        } as u32;
        match status {
            PDH_MORE_DATA => {}
            STATUS_SUCCESS | PDH_NO_DATA => return Ok(Vec::new()),
            other => {
                return Err(SampleError::CounterRead {
                    counter: kind,
                    reason: format!("size query returned {other:#x}"),
                });
            }
        }

        // u64 backing keeps the item array 8-byte aligned.
        let mut buffer: Vec<u64> = vec![0; (size as usize).div_ceil(8)];
        let items = buffer.as_mut_ptr().cast::<PDH_FMT_COUNTERVALUE_ITEM_W>();
        let status =
            unsafe { PdhGetFormattedCounterArrayW(counter, format, &mut size, &mut count, items) }
                as u32;
        if status != STATUS_SUCCESS {
            return Err(SampleError::CounterRead {
                counter: kind,
                reason: format!("array read returned {status:#x}"),
            });
        }

        let items = unsafe { std::slice::from_raw_parts(items, count as usize) };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if item.FmtValue.CStatus != STATUS_SUCCESS {
                continue;
            }
            let instance = unsafe { from_wide_ptr(item.szName) };
            let value = if integral {
                unsafe { item.FmtValue.Anonymous.largeValue as f64 }
            } else {
                unsafe { item.FmtValue.Anonymous.doubleValue }
            };
            out.push(CounterItem { instance, value });
        }
        Ok(out)
    }
}

impl CounterSource for PdhCounterSource {
    fn collect(&mut self) -> Result<CounterBatch, SampleError> {
        let status = unsafe { PdhCollectQueryData(self.query) } as u32;
        if status != STATUS_SUCCESS {
            return Err(SampleError::Collect(format!(
                "PdhCollectQueryData returned {status:#x}"
            )));
        }

        let mut batch = CounterBatch::new();
        for &(kind, counter) in &self.counters {
            for item in self.read_array(kind, counter)? {
                batch.push(kind, item.instance, item.value);
            }
        }
        Ok(batch)
    }
}

impl Drop for PdhCounterSource {
    fn drop(&mut self) {
        unsafe {
            PdhCloseQuery(self.query);
        }
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe fn from_wide_ptr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    String::from_utf16_lossy(unsafe { std::slice::from_raw_parts(ptr, len) })
}
