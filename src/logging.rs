//! JSON-line logging. Each line starts from the process identity fields
//! (`service`, `env`, `host`), then `timestamp`, `level`, `event` and the
//! caller's context.

use chrono::{SecondsFormat, Utc};
use hostname::get;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{Map, Value};
use std::env;

const DEFAULT_SERVICE: &str = "radio-catalog";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Warn,
    Info,
    Debug,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    /// `LOG_LEVEL` value; unknown or missing values mean `info`. `error`
    /// keeps only warnings since nothing here logs above that.
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("error" | "warn" | "warning") => Level::Warn,
            Some("debug" | "trace") => Level::Debug,
            _ => Level::Info,
        }
    }
}

pub struct Logger {
    identity: Map<String, Value>,
    max_level: Level,
}

static LOGGER: OnceCell<Logger> = OnceCell::new();

pub fn init_logger(service: &'static str) -> &'static Logger {
    LOGGER.get_or_init(|| Logger::from_env(service))
}

/// The process logger. Library code may run before the binary calls
/// `init_logger`, so a default one is created on first use.
pub fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::from_env(DEFAULT_SERVICE))
}

impl Logger {
    fn from_env(service: &str) -> Self {
        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("RUST_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let host = get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .or_else(|| env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());
        let level = env::var("LOG_LEVEL").ok();
        Self::new(service, &environment, &host, Level::from_env_value(level.as_deref()))
    }

    fn new(service: &str, environment: &str, host: &str, max_level: Level) -> Self {
        let mut identity = Map::new();
        identity.insert("service".into(), Value::from(service));
        identity.insert("env".into(), Value::from(environment));
        identity.insert("host".into(), Value::from(host));
        Self {
            identity,
            max_level,
        }
    }

    fn line<T: Serialize>(&self, level: Level, event: &str, context: T) -> Value {
        let mut payload = self.identity.clone();
        payload.insert(
            "timestamp".into(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        payload.insert("level".into(), Value::from(level.label()));
        payload.insert("event".into(), Value::from(event));

        match serde_json::to_value(context).unwrap_or(Value::Null) {
            // Context keys never overwrite the identity or event fields.
            Value::Object(map) => {
                for (key, value) in map {
                    payload.entry(key).or_insert(value);
                }
            }
            Value::Null => {}
            other => {
                payload.insert("context".into(), other);
            }
        }
        Value::Object(payload)
    }

    fn emit<T: Serialize>(&self, level: Level, event: &str, context: T) {
        if level > self.max_level {
            return;
        }
        let line = self.line(level, event, context);
        if level == Level::Warn {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    pub fn debug<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Debug, event, context);
    }

    pub fn info<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Info, event, context);
    }

    pub fn warn<T: Serialize>(&self, event: &str, context: T) {
        self.emit(Level::Warn, event, context);
    }
}
