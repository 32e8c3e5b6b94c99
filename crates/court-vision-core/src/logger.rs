//! Stderr logger and optional tracing subscriber.
//!
//! [`init_with_filter`] installs a small `log` backend driven by a
//! [`LogFilter`]: a default level plus per-target overrides, written the same
//! way as `RUST_LOG` (`warn,court_vision_calib=debug`). Each line carries the
//! seconds since installation, the level and the crate that logged it.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Default level plus `target=level` overrides.
///
/// Overrides match on module-path prefix; the longest matching prefix wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    default: LevelFilter,
    targets: Vec<(String, LevelFilter)>,
}

impl LogFilter {
    pub fn new(default: LevelFilter) -> Self {
        Self {
            default,
            targets: Vec::new(),
        }
    }

    /// Parse comma-separated directives. A bare level sets the default;
    /// `target=level` adds an override. Unknown levels are skipped.
    pub fn parse(directives: &str) -> Self {
        let mut filter = Self::new(LevelFilter::Info);
        for part in directives.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some((target, level)) => {
                    if let Ok(level) = LevelFilter::from_str(level.trim()) {
                        filter = filter.with_target(target.trim(), level);
                    }
                }
                None => {
                    if let Ok(level) = LevelFilter::from_str(part) {
                        filter.default = level;
                    }
                }
            }
        }
        filter
    }

    pub fn with_target(mut self, target: &str, level: LevelFilter) -> Self {
        self.targets.retain(|(t, _)| t != target);
        self.targets.push((target.to_string(), level));
        self.targets.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Level that applies to records from `target`.
    pub fn level_for(&self, target: &str) -> LevelFilter {
        self.targets
            .iter()
            .find(|(prefix, _)| is_module_prefix(prefix, target))
            .map_or(self.default, |(_, level)| *level)
    }

    /// Most verbose level any target may log at.
    pub fn max_level(&self) -> LevelFilter {
        self.targets
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, Ord::max)
    }
}

fn is_module_prefix(prefix: &str, target: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

struct StderrLogger {
    filter: LogFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let krate = record.target().split("::").next().unwrap_or_default();
        let line = format!(
            "[+{:.3}s {:<5} {krate}] {}\n",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call takes effect.
pub fn init_with_filter(filter: LogFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let max = filter.max_level();
    let logger = LOGGER.get_or_init(|| StderrLogger {
        filter,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(max);
    Ok(())
}

/// [`init_with_filter`] with a single level for every target.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_filter(LogFilter::new(level))
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// `log` records are not bridged here; binaries that want them install
/// `tracing_log::LogTracer` themselves. Returns `false` if a subscriber was
/// already set.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if json {
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    result.is_ok()
}
