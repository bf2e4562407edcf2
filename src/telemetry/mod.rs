//! Frame-driven telemetry core. Nothing here talks to the OS directly; all
//! platform data arrives through the collaborator traits.

pub mod bottleneck;
pub mod devices;
pub mod frame;
pub mod history;
pub mod session;

pub use bottleneck::{BottleneckDetector, BottleneckSource, BottleneckThresholds};
pub use frame::{CompositorTiming, FrameFlags, FrameSample, FrameTimingSource};
pub use history::FrameHistory;
pub use session::{SessionOptions, TelemetrySession, TelemetrySnapshot};
