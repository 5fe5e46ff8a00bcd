use log::log;

use crate::{Client, LogLevel};

/// Logger whose messages are forwarded to the [`log`] facade when they pass the level
/// returned by [`Client::get_log_level`].
///
/// The level is re-read on each call, so it follows configuration updates.
pub struct Logger<'a> {
    client: &'a Client,
}

impl<'a> Logger<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Returns `true` when a message at `level` would be forwarded.
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.client.get_log_level("").allows(level)
    }

    /// Logs `message` at `level` when the level passes.
    pub fn log(&self, level: LogLevel, message: &str) {
        if self.enabled(level) {
            log!(target: "reforge", level.into(), "{message}");
        }
    }

    /// Logs at [`LogLevel::Trace`].
    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    /// Logs at [`LogLevel::Debug`].
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Logs at [`LogLevel::Info`].
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Logs at [`LogLevel::Warn`].
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs at [`LogLevel::Error`].
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Logs at [`LogLevel::Fatal`], forwarded as an error.
    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }
}
