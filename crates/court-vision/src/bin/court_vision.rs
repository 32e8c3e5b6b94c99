//! court-vision CLI: replay captured frames through the calibration pipeline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use court_vision::calib::{
    CalibrationConfig, CalibrationReport, CalibrationState, ChannelObserver, ScanOutcome,
};
use court_vision::frames::ImageSequenceSource;
use log::{info, warn};
use serde_json::json;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "court-vision")]
#[command(about = "Calibrate a court model placement from three surveyed QR markers")]
#[command(version)]
struct Cli {
    /// Log level or directives, e.g. `debug` or `warn,court_vision_calib=debug`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON logs (requires the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a directory of frames and write a calibration report.
    Calibrate {
        /// Directory of image frames, processed in file-name order.
        #[arg(long)]
        frames: PathBuf,

        /// JSON config (see `init-config`). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report path. Overrides `output_path` from the config.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Exit with an error if calibration did not complete.
        #[arg(long)]
        strict: bool,
    },
    /// Print the marker a QR payload resolves to.
    Resolve {
        payload: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default config as JSON.
    InitConfig {
        #[arg(long, default_value = "court_vision_config.json")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let result = match cli.command {
        Commands::Calibrate {
            frames,
            config,
            out,
            strict,
        } => run_calibrate(&frames, config.as_deref(), out, strict),
        Commands::Resolve { payload, config } => run_resolve(&payload, config.as_deref()),
        Commands::InitConfig { out } => run_init_config(&out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_level: &str, json: bool) {
    court_vision::core::init_tracing(json);
    let _ = tracing_log::LogTracer::init();
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: &str, json: bool) {
    if json {
        eprintln!("--json-logs needs the `tracing` feature; using plain logs");
    }
    let _ = court_vision::core::init_with_filter(court_vision::core::LogFilter::parse(level));
}

fn load_config(path: Option<&Path>) -> CliResult<CalibrationConfig> {
    match path {
        Some(path) => Ok(CalibrationConfig::load_json(path)?),
        None => Ok(CalibrationConfig::default()),
    }
}

fn run_calibrate(
    frames_dir: &Path,
    config_path: Option<&Path>,
    out: Option<PathBuf>,
    strict: bool,
) -> CliResult<()> {
    let cfg = load_config(config_path)?;
    let out_path = out.unwrap_or_else(|| cfg.output_path());
    let mut report = CalibrationReport::new(frames_dir.to_string_lossy(), config_path);
    let started = Instant::now();

    let mut coordinator = cfg.build_coordinator()?;
    let (observer, events) = ChannelObserver::channel();
    coordinator.subscribe(observer);

    let mut source = ImageSequenceSource::from_dir(frames_dir)?;
    info!("replaying {} frames from {}", source.len(), frames_dir.display());

    match coordinator.start(&mut source) {
        Ok(()) => loop {
            match coordinator.tick() {
                ScanOutcome::StreamEnded | ScanOutcome::Inactive => break,
                _ if coordinator.state() == CalibrationState::Complete => break,
                _ => {}
            }
        },
        Err(err) => report.set_error(&err),
    }
    coordinator.stop();

    report.set_snapshot(coordinator.snapshot());
    report.events = events.try_iter().collect();
    report.elapsed = Some(started.elapsed());
    if report.error.is_none() && !report.is_complete() {
        let missing: Vec<String> = coordinator
            .registry()
            .specs()
            .iter()
            .filter(|s| coordinator.marker(s.id).is_none())
            .map(|s| s.id.to_string())
            .collect();
        report.set_error(format!("calibration incomplete, missing: {}", missing.join(", ")));
    }

    report.write_json(&out_path)?;
    println!("wrote report JSON to {}", out_path.display());

    match (&report.error, report.transform) {
        (None, Some(rows)) => {
            println!("calibration complete");
            for row in rows {
                println!("  [{:9.4} {:9.4} {:9.4} {:9.4}]", row[0], row[1], row[2], row[3]);
            }
        }
        (Some(err), _) => {
            warn!("{err}");
            if strict {
                return Err(err.clone().into());
            }
        }
        (None, None) => {}
    }
    Ok(())
}

fn run_resolve(payload: &str, config_path: Option<&Path>) -> CliResult<()> {
    let registry = load_config(config_path)?.build_registry()?;
    let Some((spec, matched_by)) = registry.lookup_with_match(payload) else {
        return Err(format!("no marker matches payload {payload:?}").into());
    };
    let out = json!({
        "id": spec.id,
        "name": spec.name,
        "matched_by": matched_by,
        "world_position": [spec.world_position.x, spec.world_position.y, spec.world_position.z],
        "physical_size": spec.physical_size,
        "mount_height": spec.mount_height,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run_init_config(out: &Path) -> CliResult<()> {
    CalibrationConfig::default().write_json(out)?;
    println!("wrote default config to {}", out.display());
    Ok(())
}
