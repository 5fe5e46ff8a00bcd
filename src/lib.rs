//! Reforge client runtime for Rust.

#![warn(missing_docs)]

#[macro_use]
mod macros;
mod backoff;
mod bootstrap;
mod client;
mod constants;
mod context;
mod dispatch;
mod errors;
mod fetch;
mod logger;
mod model;
mod options;
mod telemetry;
mod value;

pub use backoff::ExponentialBackoff;
pub use bootstrap::{inject_bootstrap, Bootstrap};
pub use client::{Client, ShouldLogParams};
pub use constants::PKG_VERSION;
pub use context::{ContextValue, EvaluationContext};
pub use errors::{ClientError, ErrorKind};
pub use fetch::prefetch::prefetch;
pub use logger::Logger;
pub use options::{AfterEvaluationCallback, Options, OptionsBuilder};
pub use telemetry::uploader::UploadOutcome;

pub use model::config::{Config, ConfigValue, DurationDefinition, EvaluationMetadata};
pub use model::enums::{CollectContextMode, ConfigType, LogLevel, PollStatus};

pub use value::{DurationValue, Value, ValuePrimitive};
