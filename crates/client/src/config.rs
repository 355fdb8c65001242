//! Pool and adapter settings.

use std::time::Duration;

use thiserror::Error;

/// Settings of a [`PooledAdapter`](crate::PooledAdapter) and its pool.
///
/// ```
/// use std::time::Duration;
/// use restline::Config;
///
/// let config = Config::builder().max_per_origin(2).checkout_timeout(Duration::from_millis(500)).build().unwrap();
/// assert_eq!(config.max_total_connections(), 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    max_total_connections: usize,
    max_per_origin: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
    checkout_timeout: Duration,
    max_redirects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_total_connections: 32,
            max_per_origin: 6,
            connect_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(10),
            checkout_timeout: Duration::from_secs(2),
            max_redirects: 3,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Upper bound of idle plus checked out connections across all origins.
    pub fn max_total_connections(&self) -> usize {
        self.max_total_connections
    }

    pub fn max_per_origin(&self) -> usize {
        self.max_per_origin
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Idle connections older than this are closed instead of reused.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// How long a request may wait in the pool queue for a connection.
    pub fn checkout_timeout(&self) -> Duration {
        self.checkout_timeout
    }

    /// Redirects followed per request, 0 disables following.
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }
}

#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    fn new() -> Self {
        Self { config: Config::default() }
    }

    pub fn max_total_connections(mut self, max_total_connections: usize) -> Self {
        self.config.max_total_connections = max_total_connections;
        self
    }

    pub fn max_per_origin(mut self, max_per_origin: usize) -> Self {
        self.config.max_per_origin = max_per_origin;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.config.idle_timeout = idle_timeout;
        self
    }

    pub fn checkout_timeout(mut self, checkout_timeout: Duration) -> Self {
        self.config.checkout_timeout = checkout_timeout;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let config = self.config;
        if config.max_total_connections == 0 {
            return Err(ConfigError::Zero { name: "max_total_connections" });
        }
        if config.max_per_origin == 0 {
            return Err(ConfigError::Zero { name: "max_per_origin" });
        }
        for (name, timeout) in
            [("connect_timeout", config.connect_timeout), ("idle_timeout", config.idle_timeout), ("checkout_timeout", config.checkout_timeout)]
        {
            if timeout.is_zero() {
                return Err(ConfigError::Zero { name });
            }
        }
        Ok(config)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_per_origin(), 6);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_redirects(), 3);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert_eq!(Config::builder().max_per_origin(0).build(), Err(ConfigError::Zero { name: "max_per_origin" }));
        assert_eq!(Config::builder().max_total_connections(0).build(), Err(ConfigError::Zero { name: "max_total_connections" }));
        assert_eq!(Config::builder().checkout_timeout(Duration::ZERO).build(), Err(ConfigError::Zero { name: "checkout_timeout" }));
        assert!(Config::builder().max_redirects(0).build().is_ok());
    }
}
