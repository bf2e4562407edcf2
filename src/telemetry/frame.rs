//! Per-frame classification of compositor timing records.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::bottleneck::BottleneckSource;

/// Reprojection flag bits reported by the compositor.
pub mod reprojection {
    pub const REASON_CPU: u32 = 0x01;
    pub const REASON_GPU: u32 = 0x02;
    pub const ASYNC: u32 = 0x04;
    pub const MOTION: u32 = 0x08;
    pub const PREDICTED_MASK: u32 = 0xF0;
    pub const PREDICTED_SHIFT: u32 = 4;
    pub const THROTTLED_MASK: u32 = 0xF00;
    pub const THROTTLED_SHIFT: u32 = 8;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u8 {
        const REPROJECTING = 1 << 0;
        const PREDICTED_AHEAD = 1 << 1;
        const MOTION_SMOOTHING = 1 << 2;
        const ONE_THIRD_PRESENTED = 1 << 3;
        const DROPPED = 1 << 4;
        const CPU_STALLED = 1 << 5;
        const THROTTLED = 1 << 6;
    }
}

impl Serialize for FrameFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

/// One classified frame on one track (CPU or GPU).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameSample {
    pub frametime_ms: f32,
    pub flags: FrameFlags,
}

/// Single display category of a sample, most severe flag first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameCategory {
    Reprojecting,
    MotionSmoothing,
    OneThirdPresented,
    Dropped,
    CpuStalled,
    Throttled,
    PredictedAhead,
    Normal,
}

impl FrameSample {
    pub fn category(&self) -> FrameCategory {
        let f = self.flags;
        if f.contains(FrameFlags::REPROJECTING) {
            FrameCategory::Reprojecting
        } else if f.contains(FrameFlags::MOTION_SMOOTHING) {
            FrameCategory::MotionSmoothing
        } else if f.contains(FrameFlags::ONE_THIRD_PRESENTED) {
            FrameCategory::OneThirdPresented
        } else if f.contains(FrameFlags::DROPPED) {
            FrameCategory::Dropped
        } else if f.contains(FrameFlags::CPU_STALLED) {
            FrameCategory::CpuStalled
        } else if f.contains(FrameFlags::THROTTLED) {
            FrameCategory::Throttled
        } else if f.contains(FrameFlags::PREDICTED_AHEAD) {
            FrameCategory::PredictedAhead
        } else {
            FrameCategory::Normal
        }
    }
}

/// Raw per-frame timing record from the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositorTiming {
    pub compositor_render_cpu_ms: f32,
    pub present_call_cpu_ms: f32,
    pub wait_for_present_cpu_ms: f32,
    pub client_frame_interval_ms: f32,
    pub submit_frame_ms: f32,
    pub total_render_gpu_ms: f32,
    pub compositor_idle_cpu_ms: f32,
    pub transfer_latency_ms: f32,
    pub num_dropped_frames: u32,
    pub num_mis_presented: u32,
    pub num_frame_presents: u32,
    pub reprojection_flags: u32,
}

impl CompositorTiming {
    /// Sum of the CPU-side stages of the frame.
    pub fn cpu_frametime_ms(&self) -> f32 {
        self.compositor_render_cpu_ms
            + self.present_call_cpu_ms
            + self.wait_for_present_cpu_ms
            + self.client_frame_interval_ms
            + self.submit_frame_ms
    }

    pub fn predicted_frames(&self) -> u32 {
        (self.reprojection_flags & reprojection::PREDICTED_MASK) >> reprojection::PREDICTED_SHIFT
    }

    pub fn throttled_frames(&self) -> u32 {
        (self.reprojection_flags & reprojection::THROTTLED_MASK) >> reprojection::THROTTLED_SHIFT
    }

    pub fn async_reprojection(&self) -> bool {
        self.reprojection_flags & reprojection::ASYNC != 0
    }

    pub fn motion_smoothing(&self) -> bool {
        self.reprojection_flags & reprojection::MOTION != 0
    }
}

/// Source of compositor timing records, one query per host frame.
pub trait FrameTimingSource {
    /// `None` when the compositor has no new record for this frame.
    fn next_timing(&mut self) -> Option<CompositorTiming>;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameClassification {
    pub cpu: FrameSample,
    pub gpu: FrameSample,
}

/// Classifies one timing record against the frame budget `target_ms`.
///
/// The first matching rule decides both tracks:
/// 1. dropped frames: both tracks `DROPPED`, idle time folded into the CPU
///    time and the GPU time pinned to two frame budgets when it overran;
/// 2. multiple presents: mispresentation (`ONE_THIRD_PRESENTED`, CPU
///    `THROTTLED`) or async reprojection (`MOTION_SMOOTHING`/`REPROJECTING`);
/// 3. extra predicted frames: CPU `CPU_STALLED` or `PREDICTED_AHEAD`.
pub fn classify(timing: &CompositorTiming, target_ms: f32) -> FrameClassification {
    let mut cpu_ms = timing.cpu_frametime_ms();
    let mut gpu_ms = timing.total_render_gpu_ms;
    let mut cpu_flags = FrameFlags::empty();
    let mut gpu_flags = FrameFlags::empty();

    let predicted = timing.predicted_frames();
    let throttled = timing.throttled_frames();

    if timing.num_dropped_frames >= 1 {
        if timing.compositor_idle_cpu_ms >= target_ms {
            cpu_ms += timing.compositor_idle_cpu_ms;
        }
        if gpu_ms >= target_ms {
            gpu_ms = target_ms * 2.0;
        }
        cpu_flags |= FrameFlags::DROPPED;
        gpu_flags |= FrameFlags::DROPPED;
    } else if timing.num_frame_presents > 1 {
        if timing.num_mis_presented >= 2 {
            gpu_flags |= FrameFlags::ONE_THIRD_PRESENTED;
            if throttled >= 2 {
                cpu_flags |= FrameFlags::THROTTLED;
            }
        } else if timing.async_reprojection() {
            if timing.motion_smoothing() {
                gpu_flags |= FrameFlags::MOTION_SMOOTHING;
            } else {
                gpu_flags |= FrameFlags::REPROJECTING;
            }
        }
    } else if predicted >= 1 {
        if cpu_ms > target_ms && predicted >= 2 {
            cpu_flags |= FrameFlags::CPU_STALLED;
        } else {
            cpu_flags |= FrameFlags::PREDICTED_AHEAD;
        }
    }

    FrameClassification {
        cpu: FrameSample {
            frametime_ms: cpu_ms.max(0.0),
            flags: cpu_flags,
        },
        gpu: FrameSample {
            frametime_ms: gpu_ms.max(0.0),
            flags: gpu_flags,
        },
    }
}

/// Transfer latency when the runtime measures it, otherwise compositor idle
/// time of at least 1 ms as an estimate, otherwise zero.
pub fn wireless_latency_ms(timing: &CompositorTiming) -> f32 {
    if timing.transfer_latency_ms > 0.0 {
        timing.transfer_latency_ms
    } else if timing.compositor_idle_cpu_ms >= 1.0 {
        timing.compositor_idle_cpu_ms
    } else {
        0.0
    }
}

/// Frames per second as the headset shows them. A GPU-bound frame is only
/// guaranteed to be shown every other refresh, so it counts as two budgets.
pub fn effective_fps(target_ms: f32, gpu_frametime_ms: f32, stable: BottleneckSource) -> f32 {
    let effective = if stable == BottleneckSource::Gpu {
        target_ms * 2.0
    } else {
        target_ms.max(gpu_frametime_ms)
    };
    if effective > 0.0 { 1000.0 / effective } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET_90HZ: f32 = 1000.0 / 90.0;

    fn timing() -> CompositorTiming {
        CompositorTiming {
            compositor_render_cpu_ms: 1.0,
            present_call_cpu_ms: 0.5,
            wait_for_present_cpu_ms: 2.0,
            client_frame_interval_ms: 3.0,
            submit_frame_ms: 0.5,
            total_render_gpu_ms: 8.0,
            num_frame_presents: 1,
            ..CompositorTiming::default()
        }
    }

    #[test]
    fn clean_frame_has_no_flags() {
        let c = classify(&timing(), TARGET_90HZ);
        assert_eq!(c.cpu.flags, FrameFlags::empty());
        assert_eq!(c.gpu.flags, FrameFlags::empty());
        assert_eq!(c.cpu.frametime_ms, 7.0);
        assert_eq!(c.gpu.frametime_ms, 8.0);
        assert_eq!(c.gpu.category(), FrameCategory::Normal);
    }

    #[test]
    fn dropped_frame_clamps_gpu_to_two_budgets() {
        let t = CompositorTiming {
            num_dropped_frames: 1,
            total_render_gpu_ms: 25.0,
            ..timing()
        };
        let c = classify(&t, TARGET_90HZ);
        assert_eq!(c.gpu.flags, FrameFlags::DROPPED);
        assert_eq!(c.cpu.flags, FrameFlags::DROPPED);
        assert_eq!(c.gpu.frametime_ms, TARGET_90HZ * 2.0);
        assert!((c.gpu.frametime_ms - 22.22).abs() < 0.01);
    }

    #[test]
    fn dropped_frame_below_budget_keeps_gpu_time() {
        let t = CompositorTiming {
            num_dropped_frames: 2,
            total_render_gpu_ms: 6.0,
            ..timing()
        };
        assert_eq!(classify(&t, TARGET_90HZ).gpu.frametime_ms, 6.0);
    }

    #[test]
    fn dropped_frame_adds_long_idle_to_cpu() {
        let t = CompositorTiming {
            num_dropped_frames: 1,
            compositor_idle_cpu_ms: 12.0,
            ..timing()
        };
        assert_eq!(classify(&t, TARGET_90HZ).cpu.frametime_ms, 19.0);

        let t = CompositorTiming {
            num_dropped_frames: 1,
            compositor_idle_cpu_ms: 4.0,
            ..timing()
        };
        assert_eq!(classify(&t, TARGET_90HZ).cpu.frametime_ms, 7.0);
    }

    #[test]
    fn mispresented_frames_mark_one_third_and_throttle() {
        let t = CompositorTiming {
            num_frame_presents: 2,
            num_mis_presented: 3,
            reprojection_flags: 3 << reprojection::THROTTLED_SHIFT,
            ..timing()
        };
        let c = classify(&t, TARGET_90HZ);
        assert_eq!(c.gpu.flags, FrameFlags::ONE_THIRD_PRESENTED);
        assert_eq!(c.cpu.flags, FrameFlags::THROTTLED);
    }

    #[test]
    fn single_throttled_frame_leaves_cpu_clean() {
        let t = CompositorTiming {
            num_frame_presents: 2,
            num_mis_presented: 2,
            reprojection_flags: 1 << reprojection::THROTTLED_SHIFT,
            ..timing()
        };
        let c = classify(&t, TARGET_90HZ);
        assert_eq!(c.gpu.flags, FrameFlags::ONE_THIRD_PRESENTED);
        assert!(c.cpu.flags.is_empty());
    }

    #[test]
    fn async_reprojection_distinguishes_motion_smoothing() {
        let t = CompositorTiming {
            num_frame_presents: 2,
            reprojection_flags: reprojection::ASYNC | reprojection::MOTION,
            ..timing()
        };
        assert_eq!(
            classify(&t, TARGET_90HZ).gpu.flags,
            FrameFlags::MOTION_SMOOTHING
        );

        let t = CompositorTiming {
            num_frame_presents: 2,
            reprojection_flags: reprojection::ASYNC,
            ..timing()
        };
        assert_eq!(classify(&t, TARGET_90HZ).gpu.flags, FrameFlags::REPROJECTING);

        let t = CompositorTiming {
            num_frame_presents: 2,
            reprojection_flags: reprojection::MOTION,
            ..timing()
        };
        assert!(classify(&t, TARGET_90HZ).gpu.flags.is_empty());
    }

    #[test]
    fn predicted_frames_mark_cpu_track() {
        let ahead = CompositorTiming {
            reprojection_flags: 1 << reprojection::PREDICTED_SHIFT,
            ..timing()
        };
        assert_eq!(
            classify(&ahead, TARGET_90HZ).cpu.flags,
            FrameFlags::PREDICTED_AHEAD
        );

        let stalled = CompositorTiming {
            client_frame_interval_ms: 14.0,
            reprojection_flags: 2 << reprojection::PREDICTED_SHIFT,
            ..timing()
        };
        let c = classify(&stalled, TARGET_90HZ);
        assert_eq!(c.cpu.flags, FrameFlags::CPU_STALLED);
        assert!(c.gpu.flags.is_empty());

        let fast_but_predicted = CompositorTiming {
            reprojection_flags: 2 << reprojection::PREDICTED_SHIFT,
            ..timing()
        };
        assert_eq!(
            classify(&fast_but_predicted, TARGET_90HZ).cpu.flags,
            FrameFlags::PREDICTED_AHEAD
        );
    }

    #[test]
    fn rules_are_mutually_exclusive() {
        let t = CompositorTiming {
            num_dropped_frames: 1,
            num_frame_presents: 3,
            num_mis_presented: 3,
            reprojection_flags: reprojection::ASYNC | (3 << reprojection::PREDICTED_SHIFT),
            ..timing()
        };
        let c = classify(&t, TARGET_90HZ);
        assert_eq!(c.cpu.flags, FrameFlags::DROPPED);
        assert_eq!(c.gpu.flags, FrameFlags::DROPPED);
    }

    #[test]
    fn classification_is_deterministic() {
        let t = CompositorTiming {
            num_frame_presents: 2,
            reprojection_flags: reprojection::ASYNC,
            ..timing()
        };
        assert_eq!(classify(&t, TARGET_90HZ), classify(&t, TARGET_90HZ));
    }

    #[test]
    fn wireless_latency_prefers_measured_transfer() {
        let t = CompositorTiming {
            transfer_latency_ms: 20.0,
            compositor_idle_cpu_ms: 5.0,
            ..timing()
        };
        assert_eq!(wireless_latency_ms(&t), 20.0);

        let t = CompositorTiming {
            compositor_idle_cpu_ms: 5.0,
            ..timing()
        };
        assert_eq!(wireless_latency_ms(&t), 5.0);

        let t = CompositorTiming {
            compositor_idle_cpu_ms: 0.4,
            ..timing()
        };
        assert_eq!(wireless_latency_ms(&t), 0.0);
    }

    #[test]
    fn effective_fps_halves_when_gpu_bound() {
        assert_eq!(effective_fps(10.0, 8.0, BottleneckSource::None), 100.0);
        assert_eq!(effective_fps(10.0, 20.0, BottleneckSource::Cpu), 50.0);
        assert_eq!(effective_fps(10.0, 8.0, BottleneckSource::Gpu), 50.0);
        assert_eq!(effective_fps(0.0, 0.0, BottleneckSource::None), 0.0);
    }

    #[test]
    fn category_priority_follows_severity() {
        let sample = FrameSample {
            frametime_ms: 1.0,
            flags: FrameFlags::DROPPED | FrameFlags::PREDICTED_AHEAD,
        };
        assert_eq!(sample.category(), FrameCategory::Dropped);
    }
}
