/// The version of this crate.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_CLIENT_NAME: &str = "sdk-rust";
pub const DEFAULT_ENDPOINTS: [&str; 2] = [
    "https://primary.reforge.com",
    "https://secondary.reforge.com",
];
pub const DEFAULT_TELEMETRY_ENDPOINT: &str = "https://telemetry.reforge.com/api/v1";
pub const EVAL_WITH_CONTEXT_PATH: &str = "/api/v2/configs/eval-with-context/";
pub const SDK_VERSION_HEADER: &str = "X-Reforge-SDK-Version";

pub const LOG_LEVEL_PREFIX: &str = "log-level";
pub const DEFAULT_LOGGER_KEY: &str = "log-levels.default";

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TELEMETRY_SYNC_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_MAX_TELEMETRY_KEYS: usize = 100_000;
