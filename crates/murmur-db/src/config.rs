use std::path::PathBuf;
use std::time::Duration;

/// Connection pool and query settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Upper bound on concurrently open connections
    pub max_open_conns: u32,
    /// Idle connections kept warm; surplus idle connections are closed
    /// after `max_idle_time`
    pub max_idle_conns: u32,
    pub max_idle_time: Duration,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
    /// Deadline for a single store operation, transaction included
    pub query_timeout: Duration,
}

impl DbConfig {
    pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_open_conns: 25,
            max_idle_conns: 5,
            max_idle_time: Duration::from_secs(15 * 60),
            acquire_timeout: Duration::from_secs(10),
            query_timeout: Self::DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::new("murmur.db")
    }
}
