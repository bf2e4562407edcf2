//! Bottleneck detection with hysteresis. A candidate must repeat to be
//! promoted and must stay absent for longer to be cleared.

use serde::{Deserialize, Serialize};

use super::frame::{FrameFlags, FrameSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BottleneckSource {
    #[default]
    None,
    Cpu,
    Gpu,
    Wireless,
}

impl BottleneckSource {
    pub fn label(self) -> &'static str {
        match self {
            BottleneckSource::None => "None",
            BottleneckSource::Cpu => "CPU",
            BottleneckSource::Gpu => "GPU",
            BottleneckSource::Wireless => "Wireless",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BottleneckThresholds {
    /// Consecutive identical candidates needed to promote.
    pub trigger_frames: u32,
    /// Consecutive clean frames needed to demote back to none.
    pub clear_frames: u32,
    pub wireless_latency_ms: f32,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        BottleneckThresholds {
            trigger_frames: 3,
            clear_frames: 10,
            wireless_latency_ms: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BottleneckState {
    pub stable: BottleneckSource,
    pub last_candidate: BottleneckSource,
    pub trigger_count: u32,
    pub clear_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BottleneckDetector {
    thresholds: BottleneckThresholds,
    state: BottleneckState,
}

impl BottleneckDetector {
    pub fn new(thresholds: BottleneckThresholds) -> Self {
        Self {
            thresholds,
            state: BottleneckState::default(),
        }
    }

    pub fn thresholds(&self) -> &BottleneckThresholds {
        &self.thresholds
    }

    pub fn state(&self) -> BottleneckState {
        self.state
    }

    pub fn stable(&self) -> BottleneckSource {
        self.state.stable
    }

    pub fn is_bottlenecked(&self) -> bool {
        self.state.stable != BottleneckSource::None
    }

    /// Raw per-frame guess. Frame flags only count while the displayed rate
    /// actually falls short of the refresh rate.
    pub fn candidate(
        &self,
        wireless_latency_ms: f32,
        cpu: &FrameSample,
        gpu: &FrameSample,
        fps: f32,
        refresh_rate_hz: f32,
    ) -> BottleneckSource {
        let below_refresh = fps.round() as i64 != refresh_rate_hz.round() as i64;

        if wireless_latency_ms >= self.thresholds.wireless_latency_ms {
            BottleneckSource::Wireless
        } else if gpu
            .flags
            .intersects(FrameFlags::REPROJECTING | FrameFlags::ONE_THIRD_PRESENTED)
            && below_refresh
        {
            BottleneckSource::Gpu
        } else if cpu.flags.contains(FrameFlags::CPU_STALLED) && below_refresh {
            BottleneckSource::Cpu
        } else {
            BottleneckSource::None
        }
    }

    /// Feeds one candidate through the hysteresis and returns the stable source.
    /// A clean tick while nothing is stable leaves a pending run untouched.
    pub fn update(&mut self, candidate: BottleneckSource) -> BottleneckSource {
        let s = &mut self.state;

        if candidate == s.stable {
            s.clear_count = 0;
        } else if candidate != BottleneckSource::None {
            if candidate == s.last_candidate {
                s.trigger_count += 1;
            } else {
                s.last_candidate = candidate;
                s.trigger_count = 1;
            }
            if s.trigger_count >= self.thresholds.trigger_frames {
                tracing::debug!(from = ?s.stable, to = ?candidate, "bottleneck promoted");
                s.stable = candidate;
                s.trigger_count = 0;
                s.clear_count = 0;
            }
        } else if s.stable != BottleneckSource::None {
            s.clear_count += 1;
            if s.clear_count >= self.thresholds.clear_frames {
                tracing::debug!(from = ?s.stable, "bottleneck cleared");
                s.stable = BottleneckSource::None;
                s.trigger_count = 0;
                s.clear_count = 0;
            }
        }

        s.stable
    }

    pub fn reset(&mut self) {
        self.state = BottleneckState::default();
    }
}
