//! Debug logging for skinsync.
//!
//! Every `log::info!()`/`log::debug!()`/... call in the workspace is routed to
//! `skinsync_debug.log` in the system temp directory (truncated at startup).
//! When `RUST_LOG` is set, records are mirrored to stderr as well.
//!
//! Level precedence: the `--log-level` flag, then `RUST_LOG`, then `info`.

use chrono::Utc;
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Location of the debug log.
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("skinsync_debug.log")
}

/// Pick the effective level from the CLI flag and the `RUST_LOG` value.
///
/// A `RUST_LOG` that is not a plain level name (e.g. `skinsync=debug`) is
/// ignored.
pub fn resolve_level(cli_level: Option<LevelFilter>, rust_log: Option<&str>) -> LevelFilter {
    cli_level
        .or_else(|| rust_log.and_then(|value| value.trim().parse().ok()))
        .unwrap_or(LevelFilter::Info)
}

/// `log` backend writing to the debug file and optionally stderr.
struct LogBridge {
    level: LevelFilter,
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
}

impl LogBridge {
    fn open(level: LevelFilter, mirror_stderr: bool) -> Self {
        let path = log_path();
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&path)
            .ok();

        let bridge = Self {
            level,
            file: Mutex::new(file),
            mirror_stderr,
        };
        bridge.write_raw(&format!(
            "{}\nskinsync debug session started at {} (level={})\n{}\n",
            "=".repeat(80),
            timestamp(),
            level,
            "=".repeat(80)
        ));
        bridge
    }

    fn write_raw(&self, line: &str) {
        // Silently skip if the log file couldn't be opened.
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record.level(), record.target(), &record.args().to_string());
        self.write_raw(&line);
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn format_record(level: log::Level, target: &str, message: &str) -> String {
    format!("[{}] [{:<5}] [{}] {}\n", timestamp(), level, target, message)
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Install the log bridge as the global logger.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init_log_bridge(cli_level: Option<LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let level = resolve_level(cli_level, rust_log.as_deref());
    let bridge = BRIDGE.get_or_init(|| LogBridge::open(level, rust_log.is_some()));
    if log::set_logger(bridge).is_ok() {
        log::set_max_level(bridge.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_level_wins() {
        assert_eq!(
            resolve_level(Some(LevelFilter::Trace), Some("warn")),
            LevelFilter::Trace
        );
    }

    #[test]
    fn test_rust_log_used_without_flag() {
        assert_eq!(resolve_level(None, Some(" debug ")), LevelFilter::Debug);
    }

    #[test]
    fn test_unparseable_rust_log_falls_back_to_info() {
        assert_eq!(resolve_level(None, Some("skinsync=debug")), LevelFilter::Info);
        assert_eq!(resolve_level(None, None), LevelFilter::Info);
    }

    #[test]
    fn test_record_format() {
        let line = format_record(log::Level::Warn, "skinsync_sync::sync", "offline");
        assert!(line.ends_with("] [WARN ] [skinsync_sync::sync] offline\n"), "{line}");
    }
}
