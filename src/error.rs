use thiserror::Error;

use crate::system::counters::CounterKind;

/// A single sampling tick could not complete. The previous process table
/// stays valid and the tick is skipped.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to collect counter data: {0}")]
    Collect(String),
    #[error("failed to read counter array `{}`: {reason}", .counter.path())]
    CounterRead {
        counter: CounterKind,
        reason: String,
    },
}

/// A tracked-device query failed mid-poll. The device is dropped from the
/// roster, never fatal.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {0} is not connected")]
    Disconnected(u32),
    #[error("failed to read property {property:?} of device {device}: {reason}")]
    Property {
        device: u32,
        property: crate::telemetry::devices::DeviceProperty,
        reason: String,
    },
}

/// Startup could not register what the session needs. Propagated to the
/// caller, which is expected to abort.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to open counter query: {0}")]
    OpenQuery(String),
    #[error("failed to register counter `{path}`: {reason}")]
    CounterRegistration { path: &'static str, reason: String },
    #[error("refresh rate must be finite and within (0, 1000] Hz, got {0}")]
    InvalidRefreshRate(f32),
}

/// A compositor timing recording could not be loaded.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid timing record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
