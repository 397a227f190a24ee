// SPDX-License-Identifier: GPL-3.0-only

//! Tracing setup: a stderr layer for the terminal and a daily rolling file.
//!
//! Stdout is reserved for the rendered Storage page. Both layers share a
//! runtime level gate so the level can change without reinstalling the
//! subscriber.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, SystemTime};

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{APP_DIR, Config, LoggingLevel};

const LOG_FILE_ENV: &str = "ZFS_POOL_CONSOLE_LOG_FILE";
const LOG_DIR_ENV: &str = "ZFS_POOL_CONSOLE_LOG_DIR";
const LOG_PREFIX: &str = "zfs-pool-console.log";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static MAX_RANK: AtomicU8 = AtomicU8::new(rank(LoggingLevel::Info));
static FILE_ENABLED: AtomicBool = AtomicBool::new(true);

/// Install the global subscriber. Call once, before anything logs.
///
/// `RUST_LOG` takes precedence over the configured level for filtering by
/// target; the runtime gate still applies on top.
pub fn init(config: &Config) {
    set_log_level(config.log_level);
    set_log_to_disk(config.log_to_disk);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    let terminal = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            gate_allows(*metadata.level())
        }));

    let location = LogLocation::from_env();
    match location.open() {
        Ok((writer, guard)) => {
            let file = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                    FILE_ENABLED.load(Ordering::Relaxed) && gate_allows(*metadata.level())
                }));

            tracing_subscriber::registry()
                .with(filter)
                .with(terminal)
                .with(file)
                .init();
            let _ = FILE_GUARD.set(guard);
            tracing::debug!(dir = %location.dir.display(), "file logging enabled");
        }
        Err(error) => {
            eprintln!("{APP_DIR}: file logging disabled: {error:#}");
            tracing_subscriber::registry()
                .with(filter)
                .with(terminal)
                .init();
        }
    }
}

fn default_filter(config: &Config) -> EnvFilter {
    let level = config.log_level.as_directive();
    let directives = [
        format!("zfs_pool_console={level}"),
        format!("pool_contracts={level}"),
        "zbus=warn".to_string(),
        "i18n_embed=warn".to_string(),
    ];

    directives
        .iter()
        .fold(EnvFilter::new(level), |filter, directive| match directive.parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(error) => {
                eprintln!("{APP_DIR}: ignoring log directive {directive}: {error}");
                filter
            }
        })
}

pub fn set_log_level(level: LoggingLevel) {
    MAX_RANK.store(rank(level), Ordering::Relaxed);
}

pub fn set_log_to_disk(enabled: bool) {
    FILE_ENABLED.store(enabled, Ordering::Relaxed);
}

const fn rank(level: LoggingLevel) -> u8 {
    match level {
        LoggingLevel::Error => 1,
        LoggingLevel::Warn => 2,
        LoggingLevel::Info => 3,
        LoggingLevel::Debug => 4,
        LoggingLevel::Trace => 5,
    }
}

fn gate_allows(level: Level) -> bool {
    let event = match level {
        Level::ERROR => rank(LoggingLevel::Error),
        Level::WARN => rank(LoggingLevel::Warn),
        Level::INFO => rank(LoggingLevel::Info),
        Level::DEBUG => rank(LoggingLevel::Debug),
        Level::TRACE => rank(LoggingLevel::Trace),
    };
    event <= MAX_RANK.load(Ordering::Relaxed)
}

/// Where the rolling log files go
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogLocation {
    dir: PathBuf,
    prefix: OsString,
}

impl LogLocation {
    /// `ZFS_POOL_CONSOLE_LOG_FILE` names the file, `ZFS_POOL_CONSOLE_LOG_DIR`
    /// only the directory; otherwise the XDG state dir is used.
    fn from_env() -> Self {
        if let Some(file) = std::env::var_os(LOG_FILE_ENV) {
            return Self::for_file(Path::new(&file));
        }
        let dir = std::env::var_os(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_log_dir);
        Self {
            dir,
            prefix: OsString::from(LOG_PREFIX),
        }
    }

    fn for_file(file: &Path) -> Self {
        Self {
            dir: file
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(default_log_dir),
            prefix: file
                .file_name()
                .map(OsString::from)
                .unwrap_or_else(|| OsString::from(LOG_PREFIX)),
        }
    }

    fn open(&self) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
        fs::create_dir_all(&self.dir).map_err(|error| {
            anyhow::anyhow!("cannot create {}: {error}", self.dir.display())
        })?;

        if let Some(cutoff) = SystemTime::now().checked_sub(RETENTION) {
            for path in self.stale_files(cutoff) {
                if let Err(error) = fs::remove_file(&path) {
                    eprintln!("{APP_DIR}: cannot remove {}: {error}", path.display());
                }
            }
        }

        let appender = tracing_appender::rolling::daily(&self.dir, &self.prefix);
        Ok(tracing_appender::non_blocking(appender))
    }

    /// Our own log files last modified before `cutoff`
    fn stale_files(&self, cutoff: SystemTime) -> Vec<PathBuf> {
        let prefix = self.prefix.to_string_lossy();
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix.as_ref()))
            .filter(|entry| {
                entry
                    .metadata()
                    .and_then(|metadata| metadata.modified())
                    .is_ok_and(|modified| modified < cutoff)
            })
            .map(|entry| entry.path())
            .collect()
    }
}

fn default_log_dir() -> PathBuf {
    let state = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .unwrap_or_else(std::env::temp_dir);
    state.join(APP_DIR).join("logs")
}
