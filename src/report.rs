use std::fmt::Write;

use crate::format::{format_bytes, format_frametime, truncate_unicode};
use crate::system::process::{SortDirection, SortKey};
use crate::telemetry::frame::FrameCategory;
use crate::telemetry::session::TelemetrySnapshot;

const NAME_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub top_processes: usize,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            top_processes: 10,
            sort: SortKey::default(),
            direction: SortDirection::default(),
        }
    }
}

/// Frame categories seen over the last second of history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub reprojected: usize,
    pub motion_smoothed: usize,
    pub one_third: usize,
    pub dropped: usize,
    pub cpu_stalled: usize,
    pub throttled: usize,
}

pub fn category_counts(snapshot: &TelemetrySnapshot<'_>) -> CategoryCounts {
    let mut counts = CategoryCounts::default();
    for sample in snapshot.history.gpu() {
        match sample.category() {
            FrameCategory::Reprojecting => counts.reprojected += 1,
            FrameCategory::MotionSmoothing => counts.motion_smoothed += 1,
            FrameCategory::OneThirdPresented => counts.one_third += 1,
            FrameCategory::Dropped => counts.dropped += 1,
            _ => {}
        }
    }
    for sample in snapshot.history.cpu() {
        match sample.category() {
            FrameCategory::CpuStalled => counts.cpu_stalled += 1,
            FrameCategory::Throttled => counts.throttled += 1,
            _ => {}
        }
    }
    counts
}

/// Plain-text report of one snapshot, without a trailing newline.
pub fn render_text(snapshot: &TelemetrySnapshot<'_>, options: &ReportOptions) -> String {
    let mut out = String::new();

    line(
        &mut out,
        "refresh",
        format_args!(
            "{:.0} Hz ({:.2} ms)  fps {:.1}",
            snapshot.refresh_rate_hz, snapshot.target_frametime_ms, snapshot.fps
        ),
    );
    line(
        &mut out,
        "bottleneck",
        format_args!(
            "{}  wireless {:.1} ms",
            snapshot.bottleneck.label(),
            snapshot.wireless_latency_ms
        ),
    );
    line(
        &mut out,
        "frametime",
        format_args!(
            "cpu {}  gpu {}",
            format_frametime(snapshot.displayed.cpu_ms),
            format_frametime(snapshot.displayed.gpu_ms)
        ),
    );

    let t = snapshot.totals;
    line(
        &mut out,
        "frames",
        format_args!(
            "total {}  dropped {}  missed {}  throttled {}  predicted {}",
            t.total, t.dropped, t.missed, t.throttled, t.predicted
        ),
    );

    let c = category_counts(snapshot);
    line(
        &mut out,
        "last 1s",
        format_args!(
            "reprojected {}  motion {}  one-third {}  dropped {}  stalled {}  throttled {}",
            c.reprojected, c.motion_smoothed, c.one_third, c.dropped, c.cpu_stalled, c.throttled
        ),
    );

    let devices = if snapshot.devices.is_empty() {
        "none".to_string()
    } else {
        snapshot
            .devices
            .iter()
            .map(|d| match d.battery_percent() {
                Some(pct) => format!("{} {pct}%", d.label),
                None => format!("{} --", d.label),
            })
            .collect::<Vec<_>>()
            .join("  ")
    };
    line(&mut out, "devices", format_args!("{devices}"));

    if snapshot.scene_pid != 0 {
        let name = snapshot
            .processes
            .get(snapshot.scene_pid)
            .map(|p| p.process_name.as_str())
            .unwrap_or("?");
        line(&mut out, "scene", format_args!("{} {name}", snapshot.scene_pid));
    }

    line(
        &mut out,
        "processes",
        format_args!("{} sorted by {}", snapshot.processes.len(), options.sort.label()),
    );
    let _ = write!(
        out,
        "{:>7} {:<width$} {:>6} {:>6} {:>7} {:>9} {:>9} {:>9}",
        "PID",
        "NAME",
        "CPU%",
        "GPU%",
        "VIDEO%",
        "D-VRAM",
        "S-VRAM",
        "MEMORY",
        width = NAME_WIDTH,
    );

    for row in snapshot
        .processes
        .rows(options.sort, options.direction)
        .into_iter()
        .take(options.top_processes)
    {
        let _ = write!(
            out,
            "\n{:>7} {:<width$} {:>6.1} {:>6.1} {:>7.1} {:>9} {:>9} {:>9}",
            row.pid,
            truncate_unicode(&row.name, NAME_WIDTH),
            row.cpu_percent,
            row.gpu_percent,
            row.video_percent,
            format_bytes(row.dedicated_vram_bytes),
            format_bytes(row.shared_vram_bytes),
            format_bytes(row.memory_bytes),
            width = NAME_WIDTH,
        );
    }

    out
}

pub fn render_json(snapshot: &TelemetrySnapshot<'_>) -> serde_json::Result<String> {
    serde_json::to_string(snapshot)
}

fn line(out: &mut String, label: &str, value: std::fmt::Arguments<'_>) {
    let _ = writeln!(out, "{label:<11}{value}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::process::ProcessTable;
    use crate::telemetry::history::FrameHistory;
    use crate::telemetry::session::SessionOptions;

    #[test]
    fn empty_snapshot_has_header_only() {
        let history = FrameHistory::new(SessionOptions::default().refresh_rate_hz);
        let table = ProcessTable::default();
        let snapshot = TelemetrySnapshot {
            refresh_rate_hz: 90.0,
            target_frametime_ms: 1000.0 / 90.0,
            fps: 0.0,
            wireless_latency_ms: 0.0,
            bottleneck: Default::default(),
            bottlenecked: false,
            detector: Default::default(),
            totals: Default::default(),
            latest: Default::default(),
            displayed: Default::default(),
            scene_pid: 0,
            history: &history,
            processes: &table,
            devices: &[],
        };
        let text = render_text(&snapshot, &ReportOptions::default());
        assert!(text.starts_with("refresh    90 Hz (11.11 ms)  fps 0.0\n"));
        assert!(text.contains("devices    none\n"));
        assert!(!text.contains("scene"));
        assert!(text.ends_with("MEMORY"));
        assert_eq!(category_counts(&snapshot), CategoryCounts::default());
    }
}
