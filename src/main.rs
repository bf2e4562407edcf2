use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use tokio::time::MissedTickBehavior;
use vrpulse::config::{self, load_config, load_config_from_path};
use vrpulse::logging::{self, LogFormat};
use vrpulse::replay::ReplaySource;
use vrpulse::report::{self, ReportOptions};
use vrpulse::system::platform::{self, PlatformAdapters};
use vrpulse::system::process::SortKey;
use vrpulse::system::sampler::{HostInfo, ProcessResourceSampler};
use vrpulse::telemetry::{FrameTimingSource, TelemetrySession};

#[derive(Parser)]
#[command(
    name = "vrpulse",
    about = "VR frame timing, bottleneck detection and per-process resource telemetry"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Headset refresh rate in Hz
    #[arg(long)]
    refresh_rate: Option<f32>,

    /// Process sampling interval in milliseconds
    #[arg(long)]
    sample_interval_ms: Option<u64>,

    /// JSON-lines file of compositor timing records to replay
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the replay file when it runs out
    #[arg(long, default_value_t = false)]
    loop_replay: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Print reports as JSON lines instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Process table sort column: pid, name, cpu, gpu, video, dedicated, shared, memory
    #[arg(long)]
    sort: Option<String>,

    /// Log format: pretty, json
    #[arg(long)]
    log_format: Option<String>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);

    let format: LogFormat = config.logging.format.parse().map_err(|e: String| eyre!(e))?;
    logging::init_tracing(logging::parse_level(&config.logging.level)?, format)?;

    let source = platform::open_counter_source().wrap_err("failed to open process counters")?;
    let sampler = ProcessResourceSampler::new(
        source,
        Box::new(PlatformAdapters::open()),
        HostInfo::detect(),
        config.sampler.reserved_names.clone(),
    );
    let mut session = TelemetrySession::new(config.session_options(), sampler)?;

    let replay = match &cli.replay {
        Some(path) => Some(
            ReplaySource::from_path(path, cli.loop_replay)
                .wrap_err_with(|| format!("failed to load replay {}", path.display()))?,
        ),
        None => None,
    };

    run(&mut session, replay, &config, &cli).await
}

async fn run(
    session: &mut TelemetrySession,
    mut replay: Option<ReplaySource>,
    config: &config::Config,
    cli: &Cli,
) -> Result<()> {
    let options = ReportOptions {
        top_processes: config.general.top_processes,
        sort: SortKey::from_str_config(&config.general.sort),
        ..ReportOptions::default()
    };

    let frame_period = Duration::from_secs_f32(1.0 / session.refresh_rate_hz());
    let mut frame_tick = tokio::time::interval(frame_period);
    frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report_tick =
        tokio::time::interval(Duration::from_millis(config.general.report_interval_ms.max(1)));
    report_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut frames: u64 = 0;
    loop {
        tokio::select! {
            _ = frame_tick.tick() => {
                let timing = replay.as_mut().and_then(|r| r.next_timing());
                session.on_frame(timing.as_ref());
                session.on_interval(Instant::now());
                frames += 1;

                let replay_done = replay.as_ref().is_some_and(|r| r.is_exhausted());
                let limit_hit = cli.frames.is_some_and(|limit| frames >= limit);
                if replay_done || limit_hit {
                    tracing::info!(frames, "stopping");
                    break;
                }
            }
            _ = report_tick.tick() => print_report(session, &options, cli.json)?,
        }
    }

    print_report(session, &options, cli.json)
}

fn print_report(session: &TelemetrySession, options: &ReportOptions, json: bool) -> Result<()> {
    let snapshot = session.snapshot();
    if json {
        println!("{}", report::render_json(&snapshot)?);
    } else {
        println!("{}\n", report::render_text(&snapshot, options));
    }
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> config::Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_hz = rate;
    }
    if let Some(ms) = cli.sample_interval_ms {
        config.general.sample_interval_ms = ms;
    }
    if let Some(ref sort) = cli.sort {
        config.general.sort = sort.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    config
}
