//! Timestamped logging for the sandbox binary.
//!
//! Every line is shaped like:
//!     <timestamp> LEVEL [TAG][thread] message
//!
//! stderr is always written. An append-only file sink can be enabled at startup with
//! `--log-file <path>` or `GLSANDBOX_LOG_FILE`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use glsandbox_engine::{EngineEvent, LogLevel};

pub const LOG_FILE_ENV: &str = "GLSANDBOX_LOG_FILE";

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();
static RUN_ID: OnceLock<String> = OnceLock::new();

/// Initialize logging. Call once at startup; returns the run id.
pub fn init(log_file: Option<PathBuf>) -> String {
    let rid = RUN_ID
        .get_or_init(|| {
            let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos() as u64;
            format!("{:08x}", nanos ^ std::process::id() as u64)
        })
        .clone();

    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Ok(mut guard) = sink.lock() {
                    *guard = Some(f);
                }
            }
            Err(e) => log_line("WARN", "LOG", &format!("failed to open log file {}: {e}", path.display())),
        }
    }

    rid
}

/// `--log-file` wins over the environment; blank values are ignored.
pub fn log_file_from(cli: Option<PathBuf>) -> Option<PathBuf> {
    cli.or_else(|| {
        std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    })
}

/// `YYYY-MM-DD HH:MM:SS.mmm`, local time when the offset is known, UTC otherwise.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    time::format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]")
        .ok()
        .and_then(|fmt| now.format(&fmt).ok())
        .unwrap_or_else(|| "<time-format-error>".to_string())
}

pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("main").to_string()
}

pub fn format_line(level: &str, tag: &str, msg: &str) -> String {
    format!("{} {:<5} [{}][{}] {}", log_timestamp(), level, tag, log_thread_name(), msg)
}

/// Write one line to stderr and the optional file sink.
pub fn log_line(level: &str, tag: &str, msg: &str) {
    let line = format_line(level, tag, msg);

    eprintln!("{line}");

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

/// Route one engine event into the log.
pub fn log_engine_event(ev: &EngineEvent) {
    match ev {
        EngineEvent::Log { level, tag, msg } => match level {
            LogLevel::Debug | LogLevel::Info => log_line("INFO", tag, msg),
            LogLevel::Warn => log_line("WARN", tag, msg),
            LogLevel::Error => log_line("ERROR", tag, msg),
        },
        EngineEvent::Diagnostic { stage, message, line } => {
            let stage = stage.map(|s| s.as_str()).unwrap_or("link");
            match line {
                Some(l) => log_line("WARN", "SHADER", &format!("{stage} line {l}: {message}")),
                None => log_line("WARN", "SHADER", &format!("{stage}: {message}")),
            }
        }
        EngineEvent::Fatal { message } => log_line("WARN", "FATAL", message),
        EngineEvent::Closed => log_line("INFO", "WINDOW", "User closed renderer"),
        EngineEvent::ShaderCompiled { description } => {
            log_line("INFO", "SHADER", &format!("compiled: {description}"))
        }
        EngineEvent::ModelLoaded { path, vertices, indices } => log_line(
            "INFO",
            "MODEL",
            &format!("loaded {} ({vertices} vertices, {indices} indices)", path.display()),
        ),
        EngineEvent::AudioFormat { format, channels } => match format {
            Some(f) => log_line("INFO", "AUDIO", &format!("capture format {f} x{channels}")),
            None => log_line("WARN", "AUDIO", &format!("unsupported capture format ({channels} channels); frames dropped")),
        },
    }
}

#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("INFO", $tag, &msg);
    }};
}

#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("WARN", $tag, &msg);
    }};
}

#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::logging::log_line("ERROR", $tag, &msg);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_shape_is_timestamp_tag_thread_message() {
        let line = std::thread::Builder::new()
            .name("worker".into())
            .spawn(|| format_line("INFO", "INIT", "hello"))
            .unwrap()
            .join()
            .unwrap();
        let (ts, rest) = line.split_at(23);
        assert_eq!(ts.len(), "2024-01-01 00:00:00.000".len());
        assert_eq!(&ts[4..5], "-");
        assert_eq!(rest, " INFO  [INIT][worker] hello");
    }

    #[test]
    fn level_is_part_of_the_line() {
        assert!(format_line("WARN", "FATAL", "default shader failed").contains(" WARN  [FATAL]["));
        assert!(format_line("ERROR", "INIT", "x").contains(" ERROR [INIT]["));
    }

    #[test]
    fn cli_log_file_wins() {
        let p = PathBuf::from("/tmp/explicit.log");
        assert_eq!(log_file_from(Some(p.clone())), Some(p));
    }
}
