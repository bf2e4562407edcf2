use std::collections::HashMap;

use crate::error::SampleError;

/// The fixed counter set collected on every sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKind {
    ProcessId,
    DedicatedVram,
    SharedVram,
    EngineUtilization,
    UserTime,
    PrivilegedTime,
    ProcessorTime,
    WorkingSet,
}

impl CounterKind {
    pub const ALL: [CounterKind; 8] = [
        CounterKind::ProcessId,
        CounterKind::DedicatedVram,
        CounterKind::SharedVram,
        CounterKind::EngineUtilization,
        CounterKind::UserTime,
        CounterKind::PrivilegedTime,
        CounterKind::ProcessorTime,
        CounterKind::WorkingSet,
    ];

    /// English counter path, as registered with the OS counter facility.
    pub fn path(self) -> &'static str {
        match self {
            CounterKind::ProcessId => "\\Process(*)\\ID Process",
            CounterKind::DedicatedVram => "\\GPU Process Memory(*)\\Dedicated Usage",
            CounterKind::SharedVram => "\\GPU Process Memory(*)\\Shared Usage",
            CounterKind::EngineUtilization => "\\GPU Engine(*)\\Utilization Percentage",
            CounterKind::UserTime => "\\Process(*)\\% User Time",
            CounterKind::PrivilegedTime => "\\Process(*)\\% Privileged Time",
            CounterKind::ProcessorTime => "\\Process(*)\\% Processor Time",
            CounterKind::WorkingSet => "\\Process(*)\\Working Set",
        }
    }

    /// GPU counters identify themselves through a structured instance name;
    /// the others use the process instance name (`name`, `name#1`, ...).
    pub fn is_gpu(self) -> bool {
        matches!(
            self,
            CounterKind::DedicatedVram | CounterKind::SharedVram | CounterKind::EngineUtilization
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CounterItem {
    pub instance: String,
    pub value: f64,
}

/// Raw `(instance, value)` pairs returned by one collection, per counter.
#[derive(Debug, Clone, Default)]
pub struct CounterBatch {
    items: HashMap<CounterKind, Vec<CounterItem>>,
}

impl CounterBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: CounterKind, instance: impl Into<String>, value: f64) {
        self.items.entry(kind).or_default().push(CounterItem {
            instance: instance.into(),
            value,
        });
    }

    /// Items for one counter; a counter that returned nothing yields an empty slice.
    pub fn items(&self, kind: CounterKind) -> &[CounterItem] {
        self.items.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Issues one synchronous, bounded collection of every counter in
/// [`CounterKind::ALL`].
pub trait CounterSource {
    fn collect(&mut self) -> Result<CounterBatch, SampleError>;
}

/// Installed capacity of one physical adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterCapacity {
    pub dedicated_bytes: u64,
    pub shared_bytes: u64,
}

/// Resolves adapter capacity by physical GPU index.
pub trait AdapterCatalog {
    fn capacity(&self, gpu_index: u32) -> Option<AdapterCapacity>;
}
