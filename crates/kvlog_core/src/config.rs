//! Binlog configuration.

use kvlog_storage::PoolOptions;
use std::time::Duration;

/// Configuration for opening a binlog.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the log file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the file after every append (safer but slower).
    pub sync_on_append: bool,

    /// Whether to sync the file after every synced-flag write.
    pub sync_on_mark: bool,

    /// Maximum number of idle file handles kept for reuse.
    pub max_idle_handles: usize,

    /// How long an idle file handle may be cached before it is closed.
    pub handle_idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_append: false,
            sync_on_mark: false,
            max_idle_handles: 8,
            handle_idle_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the log file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets whether to sync after every synced-flag write.
    #[must_use]
    pub const fn sync_on_mark(mut self, value: bool) -> Self {
        self.sync_on_mark = value;
        self
    }

    /// Sets the idle handle cache size.
    #[must_use]
    pub const fn max_idle_handles(mut self, count: usize) -> Self {
        self.max_idle_handles = count;
        self
    }

    /// Sets the idle handle timeout.
    #[must_use]
    pub const fn handle_idle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_idle_timeout = timeout;
        self
    }

    /// Returns the handle pool options derived from this configuration.
    #[must_use]
    pub const fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            create_if_missing: self.create_if_missing,
            max_idle: self.max_idle_handles,
            idle_timeout: self.handle_idle_timeout,
        }
    }
}
