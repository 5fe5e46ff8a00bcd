use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Log severity levels understood by the runtime.
///
/// Levels are ordered from the most verbose ([`LogLevel::Trace`]) to the least
/// verbose ([`LogLevel::Fatal`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Trace level.
    Trace = 1,
    /// Debug level.
    Debug = 2,
    /// Info level.
    Info = 3,
    /// Warn level.
    Warn = 5,
    /// Error level.
    Error = 6,
    /// Fatal level.
    Fatal = 9,
}

impl LogLevel {
    /// All levels from the most to the least verbose.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Numeric severity of the level, lower is more verbose.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::LogLevel;
    ///
    /// assert_eq!(LogLevel::Info.severity(), 3);
    /// assert!(LogLevel::Trace.severity() < LogLevel::Fatal.severity());
    /// ```
    pub fn severity(&self) -> u8 {
        *self as u8
    }

    /// Returns `true` when a message at `desired` passes the `self` threshold.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::LogLevel;
    ///
    /// assert!(LogLevel::Info.allows(LogLevel::Warn));
    /// assert!(!LogLevel::Info.allows(LogLevel::Debug));
    /// ```
    pub fn allows(&self, desired: LogLevel) -> bool {
        self.severity() <= desired.severity()
    }

    /// The uppercase name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(format!("'{s}' is not a valid log level")),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error | LogLevel::Fatal => log::Level::Error,
        }
    }
}

/// Controls whether the server may sample the evaluation context for operational visibility.
///
/// The mode is forwarded verbatim as the `collectContextMode` query parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CollectContextMode {
    /// Never send an example context.
    None,
    /// Only the shape (attribute names and types) of the context is collected.
    Shapes,
    /// Periodically sample an example context.
    #[default]
    PeriodicExample,
}

impl CollectContextMode {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CollectContextMode::None => "NONE",
            CollectContextMode::Shapes => "SHAPES",
            CollectContextMode::PeriodicExample => "PERIODIC_EXAMPLE",
        }
    }
}

impl Display for CollectContextMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the polling lifecycle of the [`crate::Client`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PollStatus {
    /// [`crate::Client::poll`] was never called.
    #[default]
    NotStarted,
    /// The immediate fetch of a [`crate::Client::poll`] call is in flight.
    Pending,
    /// Fetches are scheduled with the given frequency.
    Running(Duration),
    /// [`crate::Client::stop_polling`] was called.
    Stopped,
}

/// The kind of value a [`crate::Config`] holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigType {
    /// Whole number.
    Int,
    /// Text.
    String,
    /// Binary data.
    Bytes,
    /// Decimal number.
    Double,
    /// On/off flag.
    Bool,
    /// Weighted value distribution.
    WeightedValues,
    /// Rate limit definition.
    LimitDefinition,
    /// Log level.
    LogLevel,
    /// List of strings.
    StringList,
    /// Integer range.
    IntRange,
    /// Value provided by the environment.
    Provided,
    /// Duration.
    Duration,
    /// Arbitrary JSON.
    Json,
    /// Schema definition.
    Schema,
    /// Confidential flag.
    Confidential,
    /// Reference to a decryption key.
    DecryptWith,
}

impl Display for ConfigType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigType::Int => "int",
            ConfigType::String => "string",
            ConfigType::Bytes => "bytes",
            ConfigType::Double => "double",
            ConfigType::Bool => "bool",
            ConfigType::WeightedValues => "weightedValues",
            ConfigType::LimitDefinition => "limitDefinition",
            ConfigType::LogLevel => "logLevel",
            ConfigType::StringList => "stringList",
            ConfigType::IntRange => "intRange",
            ConfigType::Provided => "provided",
            ConfigType::Duration => "duration",
            ConfigType::Json => "json",
            ConfigType::Schema => "schema",
            ConfigType::Confidential => "confidential",
            ConfigType::DecryptWith => "decryptWith",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod enum_tests {
    use super::*;

    #[test]
    fn log_level_parse_is_case_insensitive() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("WaRn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("FATAL".parse::<LogLevel>().unwrap(), LogLevel::Fatal);
        assert!("INVALID".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_severity() {
        assert_eq!(LogLevel::Trace.severity(), 1);
        assert_eq!(LogLevel::Debug.severity(), 2);
        assert_eq!(LogLevel::Info.severity(), 3);
        assert_eq!(LogLevel::Warn.severity(), 5);
        assert_eq!(LogLevel::Error.severity(), 6);
        assert_eq!(LogLevel::Fatal.severity(), 9);
    }

    #[test]
    fn log_level_allows() {
        for level in LogLevel::ALL {
            assert!(LogLevel::Trace.allows(level));
            assert_eq!(LogLevel::Fatal.allows(level), level == LogLevel::Fatal);
        }
        assert!(!LogLevel::Info.allows(LogLevel::Trace));
        assert!(!LogLevel::Info.allows(LogLevel::Debug));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(LogLevel::Info.allows(LogLevel::Error));
        assert!(!LogLevel::Error.allows(LogLevel::Warn));
    }

    #[test]
    fn log_level_serde() {
        let level: LogLevel = serde_json::from_str(r#""debug""#).unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), r#""WARN""#);
    }

    #[test]
    fn collect_context_mode_names() {
        assert_eq!(CollectContextMode::default().to_string(), "PERIODIC_EXAMPLE");
        assert_eq!(CollectContextMode::None.to_string(), "NONE");
        assert_eq!(CollectContextMode::Shapes.to_string(), "SHAPES");
    }
}
