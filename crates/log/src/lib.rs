//! Process-wide logging for the wallet engine.
//!
//! Records go to stderr as text or JSON lines and can additionally be kept in a
//! bounded in-memory ring, which tests use to assert on what the engine reported.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::json;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Text = 0,
    Json = 1,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Text,
            timestamps: true,
        }
    }
}

/// A record kept by the capture ring.
#[derive(Clone, Debug)]
pub struct Record {
    pub ts_ms: u64,
    pub level: Level,
    pub target: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub msg: String,
}

struct Settings {
    level: AtomicU8,
    format: AtomicU8,
    timestamps: AtomicBool,
    stderr: AtomicBool,
}

static SETTINGS: Settings = Settings {
    level: AtomicU8::new(Level::Info as u8),
    format: AtomicU8::new(Format::Text as u8),
    timestamps: AtomicBool::new(true),
    stderr: AtomicBool::new(true),
};

struct Capture {
    enabled: AtomicBool,
    capacity: AtomicUsize,
    ring: OnceLock<Mutex<VecDeque<Record>>>,
}

static CAPTURE: Capture = Capture {
    enabled: AtomicBool::new(false),
    capacity: AtomicUsize::new(0),
    ring: OnceLock::new(),
};

pub fn init(config: LogConfig) {
    SETTINGS.level.store(config.level as u8, Ordering::Relaxed);
    SETTINGS.format.store(config.format as u8, Ordering::Relaxed);
    SETTINGS
        .timestamps
        .store(config.timestamps, Ordering::Relaxed);
}

pub fn current_level() -> Level {
    Level::from_u8(SETTINGS.level.load(Ordering::Relaxed))
}

pub fn set_stderr_enabled(enabled: bool) {
    SETTINGS.stderr.store(enabled, Ordering::Relaxed);
}

pub fn enable_capture(capacity: usize) {
    if capacity == 0 {
        disable_capture();
        return;
    }
    CAPTURE.capacity.store(capacity, Ordering::Relaxed);
    CAPTURE
        .ring
        .get_or_init(|| Mutex::new(VecDeque::with_capacity(capacity.min(1024))));
    CAPTURE.enabled.store(true, Ordering::Relaxed);
}

pub fn disable_capture() {
    CAPTURE.enabled.store(false, Ordering::Relaxed);
}

pub fn clear_captured() {
    if let Some(ring) = CAPTURE.ring.get() {
        if let Ok(mut guard) = ring.lock() {
            guard.clear();
        }
    }
}

/// Returns up to `limit` of the most recent captured records, oldest first.
pub fn captured(limit: usize) -> Vec<Record> {
    let Some(ring) = CAPTURE.ring.get() else {
        return Vec::new();
    };
    let Ok(guard) = ring.lock() else {
        return Vec::new();
    };
    let start = guard.len().saturating_sub(limit);
    guard.iter().skip(start).cloned().collect()
}

/// Captured records whose message contains `needle`.
pub fn captured_matching(needle: &str) -> Vec<Record> {
    captured(usize::MAX)
        .into_iter()
        .filter(|record| record.msg.contains(needle))
        .collect()
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= SETTINGS.level.load(Ordering::Relaxed)
}

pub fn log(
    level: Level,
    target: &'static str,
    file: &'static str,
    line: u32,
    args: fmt::Arguments<'_>,
) {
    if !enabled(level) {
        return;
    }

    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let ts_ms: u64 = since_epoch.as_millis().try_into().unwrap_or(u64::MAX);
    let capture = CAPTURE.enabled.load(Ordering::Relaxed);
    let json = SETTINGS.format.load(Ordering::Relaxed) == Format::Json as u8;
    let msg = (json || capture).then(|| args.to_string());

    if SETTINGS.stderr.load(Ordering::Relaxed) {
        let mut out = io::stderr().lock();
        if json {
            let entry = json!({
                "ts_ms": ts_ms,
                "level": level.as_str(),
                "target": target,
                "file": file,
                "line": line,
                "msg": msg.as_deref().unwrap_or_default(),
            });
            let _ = writeln!(out, "{entry}");
        } else {
            if SETTINGS.timestamps.load(Ordering::Relaxed) {
                let _ = write!(out, "{} ", Timestamp(since_epoch));
            }
            let _ = writeln!(out, "{level} {target}: {args}");
        }
    }

    if capture {
        push_captured(Record {
            ts_ms,
            level,
            target,
            file,
            line,
            msg: msg.unwrap_or_default(),
        });
    }
}

fn push_captured(record: Record) {
    let cap = CAPTURE.capacity.load(Ordering::Relaxed);
    let Some(ring) = CAPTURE.ring.get() else {
        return;
    };
    let Ok(mut guard) = ring.lock() else {
        return;
    };
    guard.push_back(record);
    while guard.len() > cap {
        guard.pop_front();
    }
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, module_path!(), file!(), line!(), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Error, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Warn, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Info, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Debug, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Trace, $($arg)*);
    }};
}

/// RFC 3339 UTC rendering of a duration since the unix epoch.
struct Timestamp(Duration);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let (year, month, day) = civil_from_days((secs / 86_400) as i64);
        let secs_of_day = secs % 86_400;
        write!(
            f,
            "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
            secs_of_day / 3600,
            (secs_of_day % 3600) / 60,
            secs_of_day % 60,
            self.0.subsec_millis()
        )
    }
}

// Howard Hinnant's days-to-civil conversion.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i32 + era as i32 * 400 + i32::from(month <= 2);
    (year, month, day)
}
