use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::config::{DEBUG_VAR, config_dir, parse_bool};

const DEFAULT_LOG_FILTER: &str = "warn";
const DEBUG_LOG_FILTER: &str = "warn,clai=debug";
const DEFAULT_LOG_FILE_NAME: &str = "clai.log";
const LOGS_DIR: &str = "logs";

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
type FileInit = (InitResult, Option<WorkerGuard>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogOutput {
    Stderr,
    File,
    Both,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogSettings {
    format: LogFormat,
    output: LogOutput,
    file_path: PathBuf,
    debug: bool,
}

impl LogSettings {
    fn from_env_with(get_var: impl Fn(&str) -> Option<String>, home: Option<&Path>) -> Self {
        let format = match get_var("LOG_FORMAT")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let output = match get_var("LOG_OUTPUT")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stderr,
        };
        let file_path = get_var("LOG_FILE_PATH")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_log_file_path(home));

        Self {
            format,
            output,
            file_path,
            debug: parse_bool(get_var(DEBUG_VAR).as_deref(), false),
        }
    }

    fn default_filter(&self) -> &'static str {
        if self.debug {
            DEBUG_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        }
    }
}

fn default_log_file_path(home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) => config_dir(home).join(LOGS_DIR).join(DEFAULT_LOG_FILE_NAME),
        None => Path::new(LOGS_DIR).join(DEFAULT_LOG_FILE_NAME),
    }
}

fn build_file_writer(path: &Path) -> std::io::Result<(non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE_NAME));

    fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.default_filter()))
}

fn init_with_writer(settings: &LogSettings, writer: BoxMakeWriter) -> InitResult {
    match settings.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter(settings))
            .with_writer(writer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter(settings))
            .with_writer(writer)
            .try_init(),
    }
}

fn init_file_output(settings: &LogSettings, include_stderr: bool) -> FileInit {
    match build_file_writer(&settings.file_path) {
        Ok((file_writer, guard)) => {
            let writer = if include_stderr {
                BoxMakeWriter::new(std::io::stderr.and(file_writer))
            } else {
                BoxMakeWriter::new(file_writer)
            };

            let init_result = init_with_writer(settings, writer);
            let guard = init_result.is_ok().then_some(guard);
            (init_result, guard)
        }
        Err(err) => {
            let mode = if include_stderr { "both" } else { "file" };
            eprintln!(
                "clai: failed to initialize LOG_OUTPUT={} at '{}': {}; using stderr instead",
                mode,
                settings.file_path.display(),
                err
            );
            (
                init_with_writer(settings, BoxMakeWriter::new(std::io::stderr)),
                None,
            )
        }
    }
}

/// Installs the global subscriber. The returned guard flushes file output on
/// drop and must be held until the process is about to exit.
pub fn init() -> Option<WorkerGuard> {
    let home = dirs::home_dir();
    let settings = LogSettings::from_env_with(|key| env::var(key).ok(), home.as_deref());

    let (_, guard) = match settings.output {
        LogOutput::Stderr => (
            init_with_writer(&settings, BoxMakeWriter::new(std::io::stderr)),
            None,
        ),
        LogOutput::File => init_file_output(&settings, false),
        LogOutput::Both => init_file_output(&settings, true),
    };
    guard
}
