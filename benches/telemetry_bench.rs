use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vrpulse::system::counter_name::CounterName;
use vrpulse::system::counters::{AdapterCapacity, AdapterCatalog, CounterBatch, CounterKind};
use vrpulse::system::sampler::{HostInfo, fold_batch};
use vrpulse::telemetry::frame::{CompositorTiming, classify, reprojection};

struct FixedAdapters;

impl AdapterCatalog for FixedAdapters {
    fn capacity(&self, _gpu_index: u32) -> Option<AdapterCapacity> {
        Some(AdapterCapacity {
            dedicated_bytes: 8 << 30,
            shared_bytes: 16 << 30,
        })
    }
}

fn engine_name(pid: u32, engine: u32) -> String {
    let ty = match engine % 4 {
        0 => "3D",
        1 => "Copy",
        2 => "VideoEncode",
        _ => "Compute_0",
    };
    format!("pid_{pid}_luid_0x00000000_0x0000d1a3_phys_0_eng_{engine}_engtype_{ty}")
}

/// One collection as a busy host reports it: every process has a few
/// engines and both memory counters.
fn make_batch(processes: usize) -> CounterBatch {
    let mut batch = CounterBatch::new();
    for i in 0..processes {
        let pid = i as u32 + 100;
        let name = format!("proc_{i}");
        batch.push(CounterKind::ProcessId, name.clone(), pid as f64);
        batch.push(CounterKind::ProcessorTime, name.clone(), (i % 400) as f64);
        batch.push(CounterKind::UserTime, name.clone(), (i % 300) as f64);
        batch.push(CounterKind::PrivilegedTime, name.clone(), (i % 100) as f64);
        batch.push(CounterKind::WorkingSet, name, ((i + 1) * 4096) as f64);
        for engine in 0..4 {
            batch.push(
                CounterKind::EngineUtilization,
                engine_name(pid, engine),
                (i % 100) as f64,
            );
        }
        let memory = format!("pid_{pid}_luid_0x00000000_0x0000d1a3_phys_0");
        batch.push(CounterKind::DedicatedVram, memory.clone(), 1_048_576.0);
        batch.push(CounterKind::SharedVram, memory, 65_536.0);
    }
    batch
}

fn make_timings(n: usize) -> Vec<CompositorTiming> {
    (0..n)
        .map(|i| CompositorTiming {
            compositor_render_cpu_ms: 1.0,
            client_frame_interval_ms: (i % 15) as f32,
            total_render_gpu_ms: (i % 25) as f32,
            compositor_idle_cpu_ms: (i % 13) as f32,
            num_dropped_frames: (i % 17 == 0) as u32,
            num_frame_presents: 1 + (i % 3) as u32,
            num_mis_presented: (i % 5) as u32,
            reprojection_flags: if i % 2 == 0 {
                reprojection::ASYNC
            } else {
                (2 << reprojection::PREDICTED_SHIFT) | (2 << reprojection::THROTTLED_SHIFT)
            },
            ..CompositorTiming::default()
        })
        .collect()
}

fn bench_counter_name_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_name_parse_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let names: Vec<String> = (0..size as u32).map(|i| engine_name(i, i % 8)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &names, |b, names| {
            b.iter(|| {
                for name in names {
                    black_box(CounterName::parse(black_box(name)));
                }
            })
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_90_120_144");

    for hz in [90u32, 120, 144] {
        let timings = make_timings(hz as usize);
        let target = 1000.0 / hz as f32;
        group.bench_with_input(BenchmarkId::from_parameter(hz), &timings, |b, timings| {
            b.iter(|| {
                for timing in timings {
                    black_box(classify(black_box(timing), target));
                }
            })
        });
    }

    group.finish();
}

fn bench_sampler_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler_fold_100_300_600");
    let host = HostInfo {
        logical_processors: 16,
        total_memory_bytes: 32 << 30,
    };
    let reserved = vec!["Idle".to_string(), "_Total".to_string()];

    for size in [100usize, 300, 600] {
        let batch = make_batch(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| {
                let table = fold_batch(black_box(batch), &FixedAdapters, host, &reserved);
                black_box(table);
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_counter_name_parse,
    bench_classify,
    bench_sampler_fold
);
criterion_main!(benches);
