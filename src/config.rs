//! TOML-backed daemon configuration, with CLI overrides layered on top.

use std::path::Path;

use serde::Deserialize;

/// Default location the daemon looks for its config file when `-c` is not
/// given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/enforcerd/enforcerd.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct EnforcerConfig {
    /// Number of worker threads. Defaults to the host's logical core count
    /// when unset.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Interval used only by the illustrative recurring commands the
    /// engine registers; the scheduler core itself has no notion of
    /// intervals.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Default log verbosity when `-v` is not given on the command line.
    #[serde(default)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn bump(self, extra: u8) -> Self {
        let levels = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        let current = levels.iter().position(|l| *l == self).unwrap_or(1);
        let next = (current + extra as usize).min(levels.len() - 1);
        levels[next]
    }

    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            poll_interval_secs: default_poll_interval(),
            log_level: LogLevel::default(),
        }
    }
}

impl EnforcerConfig {
    /// Load configuration from `path` if it exists, falling back to
    /// defaults if the file is simply missing (but surfacing parse
    /// errors).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config: EnforcerConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get)
    }
}
