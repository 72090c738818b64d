use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "SyndicateIQ";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 3001;
/// 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 52_428_800;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_CACHE_CAPACITY: u64 = 256;
pub const DEFAULT_PRIMARY_LANGUAGE: &str = "eng";
/// Uploaded bytes are kept this long after a run finishes for reprocessing.
pub const DEFAULT_STAGED_RETENTION_SECS: u64 = 600;
/// Finished documents leave the registry after a day.
pub const DEFAULT_DOCUMENT_RETENTION_SECS: u64 = 86_400;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 100;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "syndicateiq=info,tower_http=warn"
}

/// Get the application data directory
/// ~/SyndicateIQ/ on all platforms. Falls back to the working directory
/// when no home directory can be determined (containers).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the score ledger.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("syndicateiq.db")
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub max_file_size: u64,
    pub database_path: PathBuf,
    /// Alternative peer/history reference file; the bundled one otherwise.
    pub benchmarks_path: Option<PathBuf>,
    pub enable_ocr: bool,
    pub enable_multilingual: bool,
    pub enable_feedback_learning: bool,
    pub primary_language: String,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    pub log_format: LogFormat,
    /// Zero drops the bytes as soon as a run finishes.
    pub staged_retention: Duration,
    pub document_retention: Duration,
    pub rate_limit_per_minute: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            database_path: default_database_path(),
            benchmarks_path: None,
            enable_ocr: false,
            enable_multilingual: false,
            enable_feedback_learning: false,
            primary_language: DEFAULT_PRIMARY_LANGUAGE.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            log_format: LogFormat::Json,
            staged_retention: Duration::from_secs(DEFAULT_STAGED_RETENTION_SECS),
            document_retention: Duration::from_secs(DEFAULT_DOCUMENT_RETENTION_SECS),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
        }
    }
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Unset keys keep
    /// their defaults; set but unparseable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = match get("HOST") {
            Some(v) => parse_value("HOST", &v)?,
            None => defaults.host,
        };
        let port = match get("PORT") {
            Some(v) => parse_value("PORT", &v)?,
            None => defaults.port,
        };
        let max_file_size = match get("MAX_FILE_SIZE") {
            Some(v) => parse_positive("MAX_FILE_SIZE", &v)?,
            None => defaults.max_file_size,
        };
        let cache_ttl = match get("CACHE_TTL_SECS") {
            Some(v) => Duration::from_secs(parse_positive("CACHE_TTL_SECS", &v)?),
            None => defaults.cache_ttl,
        };
        let cache_capacity = match get("CACHE_CAPACITY") {
            Some(v) => parse_positive("CACHE_CAPACITY", &v)?,
            None => defaults.cache_capacity,
        };
        let staged_retention = match get("STAGED_RETENTION_SECS") {
            Some(v) => Duration::from_secs(parse_value("STAGED_RETENTION_SECS", &v)?),
            None => defaults.staged_retention,
        };
        let document_retention = match get("DOCUMENT_RETENTION_SECS") {
            Some(v) => Duration::from_secs(parse_positive("DOCUMENT_RETENTION_SECS", &v)?),
            None => defaults.document_retention,
        };
        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(v) => {
                let limit = parse_positive("RATE_LIMIT_PER_MINUTE", &v)?;
                u32::try_from(limit).map_err(|e| ConfigError::InvalidValue {
                    key: "RATE_LIMIT_PER_MINUTE",
                    value: v.clone(),
                    reason: e.to_string(),
                })?
            }
            None => defaults.rate_limit_per_minute,
        };
        let log_format = match get("LOG_FORMAT").as_deref().map(str::trim) {
            None => defaults.log_format,
            Some("json") => LogFormat::Json,
            Some("pretty") | Some("text") => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected json or pretty".into(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            max_file_size,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            benchmarks_path: get("BENCHMARKS_PATH").map(PathBuf::from),
            enable_ocr: parse_flag("ENABLE_OCR", get("ENABLE_OCR"), defaults.enable_ocr)?,
            enable_multilingual: parse_flag(
                "ENABLE_MULTILINGUAL",
                get("ENABLE_MULTILINGUAL"),
                defaults.enable_multilingual,
            )?,
            enable_feedback_learning: parse_flag(
                "ENABLE_FEEDBACK_LEARNING",
                get("ENABLE_FEEDBACK_LEARNING"),
                defaults.enable_feedback_learning,
            )?,
            primary_language: get("PRIMARY_LANGUAGE")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or(defaults.primary_language),
            cache_ttl,
            cache_capacity,
            log_format,
            staged_retention,
            document_retention,
            rate_limit_per_minute,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value: u64 = parse_value(key, raw)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

fn parse_flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "expected true or false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("SyndicateIQ"));
        assert!(default_database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.port, 3001);
        assert_eq!(settings.max_file_size, 52_428_800);
        assert_eq!(settings.bind_addr().to_string(), "0.0.0.0:3001");
        assert!(!settings.enable_multilingual);
        assert!(!settings.enable_feedback_learning);
        assert_eq!(settings.rate_limit_per_minute, 100);
        assert_eq!(settings.document_retention, Duration::from_secs(86_400));
    }

    #[test]
    fn reads_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("MAX_FILE_SIZE", "1024"),
            ("ENABLE_OCR", "true"),
            ("ENABLE_MULTILINGUAL", "true"),
            ("ENABLE_FEEDBACK_LEARNING", "yes"),
            ("STAGED_RETENTION_SECS", "0"),
            ("DOCUMENT_RETENTION_SECS", "120"),
            ("RATE_LIMIT_PER_MINUTE", "20"),
            ("PRIMARY_LANGUAGE", "FRA"),
            ("CACHE_TTL_SECS", "60"),
            ("LOG_FORMAT", "pretty"),
            ("DATABASE_PATH", "/tmp/ledger.db"),
            ("BENCHMARKS_PATH", "/etc/syndicateiq/benchmarks.json"),
        ]))
        .unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.max_file_size, 1024);
        assert!(settings.enable_ocr);
        assert!(settings.enable_multilingual);
        assert!(settings.enable_feedback_learning);
        assert_eq!(settings.staged_retention, Duration::ZERO);
        assert_eq!(settings.document_retention, Duration::from_secs(120));
        assert_eq!(settings.rate_limit_per_minute, 20);
        assert_eq!(settings.primary_language, "fra");
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.database_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(
            settings.benchmarks_path.as_deref(),
            Some(std::path::Path::new("/etc/syndicateiq/benchmarks.json"))
        );
    }

    #[test]
    fn rejects_malformed_values() {
        let err = Settings::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));

        let err = Settings::from_lookup(lookup(&[("ENABLE_OCR", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "ENABLE_OCR", .. }));

        let err = Settings::from_lookup(lookup(&[("MAX_FILE_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "MAX_FILE_SIZE", .. }));

        let err = Settings::from_lookup(lookup(&[("RATE_LIMIT_PER_MINUTE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "RATE_LIMIT_PER_MINUTE", .. }));

        let err = Settings::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "LOG_FORMAT", .. }));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let settings = Settings::from_lookup(lookup(&[("PORT", "  ")])).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
    }
}
