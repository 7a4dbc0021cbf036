//! Log output settings

/// Directives appended to the default filter; the HTTP stacks are chatty at
/// debug level and drown out per-request lines.
pub const QUIET_DEPENDENCIES: [&str; 4] = ["hyper=warn", "h2=warn", "reqwest=info", "rustls=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with the current span's fields
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `info,parc_historian_sdk=debug`
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: default_filter("info"),
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `RUST_LOG` is taken verbatim; a bare `LOG_LEVEL` gets the dependency
    /// directives added. `JSON_LOGS=false` switches to text output.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = match (lookup("RUST_LOG"), lookup("LOG_LEVEL")) {
            (Some(directives), _) if !directives.trim().is_empty() => directives,
            (_, Some(level)) if !level.trim().is_empty() => default_filter(level.trim()),
            _ => default_filter("info"),
        };
        let format = match lookup("JSON_LOGS").as_deref().map(str::trim) {
            Some("false") | Some("0") => LogFormat::Text,
            _ => LogFormat::Json,
        };
        Self { filter, format }
    }
}

fn default_filter(level: &str) -> String {
    format!("{},{}", level, QUIET_DEPENDENCIES.join(","))
}
