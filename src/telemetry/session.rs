use std::time::{Duration, Instant};

use serde::Serialize;

use super::bottleneck::{BottleneckDetector, BottleneckSource, BottleneckState, BottleneckThresholds};
use super::devices::{DeviceProvider, DeviceRoster, TrackedDevice};
use super::frame::{self, CompositorTiming, FrameClassification};
use super::history::{FrameHistory, FrameTotals, MAX_REFRESH_RATE_HZ};
use crate::error::InitError;
use crate::system::process::ProcessTable;
use crate::system::sampler::ProcessResourceSampler;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub refresh_rate_hz: f32,
    pub sample_interval: Duration,
    pub thresholds: BottleneckThresholds,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            refresh_rate_hz: 90.0,
            sample_interval: Duration::from_millis(500),
            thresholds: BottleneckThresholds::default(),
        }
    }
}

/// CPU and GPU frametimes as last shown to the user, refreshed on the
/// sampling interval instead of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DisplayedFrametimes {
    pub cpu_ms: f32,
    pub gpu_ms: f32,
}

/// Owns all per-frame and per-interval state. Single writer, driven by the
/// host loop: [`on_frame`](Self::on_frame) once per display frame and
/// [`on_interval`](Self::on_interval) as often as convenient.
pub struct TelemetrySession {
    refresh_rate_hz: f32,
    target_ms: f32,
    sample_interval: Duration,
    history: FrameHistory,
    detector: BottleneckDetector,
    sampler: ProcessResourceSampler,
    devices: DeviceRoster,
    latest: FrameClassification,
    displayed: DisplayedFrametimes,
    wireless_latency_ms: f32,
    fps: f32,
    scene_pid: u32,
    last_sample_at: Option<Instant>,
}

/// Read-only view handed to the presentation layer between ticks.
#[derive(Debug, Serialize)]
pub struct TelemetrySnapshot<'a> {
    pub refresh_rate_hz: f32,
    pub target_frametime_ms: f32,
    pub fps: f32,
    pub wireless_latency_ms: f32,
    pub bottleneck: BottleneckSource,
    pub bottlenecked: bool,
    pub detector: BottleneckState,
    pub totals: FrameTotals,
    pub latest: FrameClassification,
    pub displayed: DisplayedFrametimes,
    pub scene_pid: u32,
    pub history: &'a FrameHistory,
    pub processes: &'a ProcessTable,
    pub devices: &'a [TrackedDevice],
}

impl TelemetrySession {
    pub fn new(options: SessionOptions, sampler: ProcessResourceSampler) -> Result<Self, InitError> {
        let refresh_rate_hz = validate_refresh_rate(options.refresh_rate_hz)?;
        tracing::info!(
            refresh_rate_hz,
            sample_interval_ms = options.sample_interval.as_millis() as u64,
            "telemetry session started"
        );
        Ok(TelemetrySession {
            refresh_rate_hz,
            target_ms: 1000.0 / refresh_rate_hz,
            sample_interval: options.sample_interval,
            history: FrameHistory::new(refresh_rate_hz),
            detector: BottleneckDetector::new(options.thresholds),
            sampler,
            devices: DeviceRoster::default(),
            latest: FrameClassification::default(),
            displayed: DisplayedFrametimes::default(),
            wireless_latency_ms: 0.0,
            fps: 0.0,
            scene_pid: 0,
            last_sample_at: None,
        })
    }

    pub fn refresh_rate_hz(&self) -> f32 {
        self.refresh_rate_hz
    }

    /// Frame budget in milliseconds.
    pub fn target_ms(&self) -> f32 {
        self.target_ms
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn bottleneck(&self) -> BottleneckSource {
        self.detector.stable()
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    pub fn processes(&self) -> &ProcessTable {
        self.sampler.table()
    }

    pub fn devices(&self) -> &[TrackedDevice] {
        self.devices.devices()
    }

    /// Rebuilds the ring for a new headset rate. History, totals and the
    /// detector start over.
    pub fn set_refresh_rate(&mut self, refresh_rate_hz: f32) -> Result<(), InitError> {
        let refresh_rate_hz = validate_refresh_rate(refresh_rate_hz)?;
        tracing::info!(
            from = self.refresh_rate_hz,
            to = refresh_rate_hz,
            "refresh rate changed"
        );
        self.refresh_rate_hz = refresh_rate_hz;
        self.target_ms = 1000.0 / refresh_rate_hz;
        self.history = FrameHistory::new(refresh_rate_hz);
        self.reset();
        Ok(())
    }

    /// Per-frame tick: classify, write the ring, then run the detector.
    /// `None` means the compositor had no record this frame; the tick is
    /// skipped and the last state stays visible.
    pub fn on_frame(&mut self, timing: Option<&CompositorTiming>) -> BottleneckSource {
        let _span = tracing::debug_span!("session.frame").entered();

        let Some(timing) = timing else {
            tracing::trace!("no compositor timing this frame");
            return self.detector.stable();
        };

        let classified = frame::classify(timing, self.target_ms);
        self.history.record(classified, timing);
        self.latest = classified;

        self.wireless_latency_ms = frame::wireless_latency_ms(timing);
        self.fps = frame::effective_fps(
            self.target_ms,
            classified.gpu.frametime_ms,
            self.detector.stable(),
        );

        let slot = self.history.at_cursor();
        let candidate = self.detector.candidate(
            self.wireless_latency_ms,
            &slot.cpu,
            &slot.gpu,
            self.fps,
            self.refresh_rate_hz,
        );
        self.detector.update(candidate)
    }

    /// Runs the process sampler when the sampling interval has elapsed.
    /// Returns whether a sampling tick was attempted.
    pub fn on_interval(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sample_at
            && now.saturating_duration_since(last) < self.sample_interval
        {
            return false;
        }
        self.last_sample_at = Some(now);

        if let Err(err) = self.sampler.tick() {
            tracing::warn!(error = %err, "process sampling skipped, keeping previous table");
        }

        self.displayed = DisplayedFrametimes {
            cpu_ms: self.latest.cpu.frametime_ms,
            gpu_ms: self.latest.gpu.frametime_ms,
        };
        true
    }

    pub fn poll_devices(&mut self, provider: &dyn DeviceProvider) {
        self.devices.poll(provider);
    }

    /// Tracks the pid of the application currently rendering. Switching from
    /// one application to another starts the frame history over.
    pub fn observe_scene_pid(&mut self, pid: u32) {
        if pid != 0 && self.scene_pid != 0 && pid != self.scene_pid {
            tracing::info!(from = self.scene_pid, to = pid, "scene application changed");
            self.reset();
        }
        self.scene_pid = pid;
    }

    /// Clears frame history, totals and the detector. The process table and
    /// device roster are untouched.
    pub fn reset(&mut self) {
        self.history.reset();
        self.detector.reset();
        self.latest = FrameClassification::default();
        self.displayed = DisplayedFrametimes::default();
        self.wireless_latency_ms = 0.0;
        self.fps = 0.0;
    }

    pub fn snapshot(&self) -> TelemetrySnapshot<'_> {
        TelemetrySnapshot {
            refresh_rate_hz: self.refresh_rate_hz,
            target_frametime_ms: self.target_ms,
            fps: self.fps,
            wireless_latency_ms: self.wireless_latency_ms,
            bottleneck: self.detector.stable(),
            bottlenecked: self.detector.is_bottlenecked(),
            detector: self.detector.state(),
            totals: self.history.totals(),
            latest: self.latest,
            displayed: self.displayed,
            scene_pid: self.scene_pid,
            history: &self.history,
            processes: self.sampler.table(),
            devices: self.devices.devices(),
        }
    }
}

fn validate_refresh_rate(refresh_rate_hz: f32) -> Result<f32, InitError> {
    if refresh_rate_hz.is_finite() && refresh_rate_hz > 0.0 && refresh_rate_hz <= MAX_REFRESH_RATE_HZ {
        Ok(refresh_rate_hz)
    } else {
        Err(InitError::InvalidRefreshRate(refresh_rate_hz))
    }
}
