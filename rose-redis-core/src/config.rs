//! Configuration types for Redis connections

use std::time::Duration;

/// Deployment topology of the Redis endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopologyMode {
    /// Single Redis node
    #[default]
    Standalone,
    /// Redis Cluster; the connection string lists seed nodes
    Cluster,
}

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection string (e.g., `<redis://localhost:6379>` or `<host1:6379,host2:6379>`)
    pub connection_string: String,

    /// Optional password for authentication
    pub password: Option<String>,

    /// Database number (only for standalone mode)
    pub database: i64,

    /// Connect over TLS without certificate verification
    pub tls: bool,

    /// Topology of the endpoint
    pub topology_mode: TopologyMode,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Timeout applied to every non-blocking command (None = no timeout)
    pub operation_timeout: Option<Duration>,

    /// Reconnection after read failures, inherited by queue consumers built
    /// from this configuration (5 attempts by default)
    pub reconnect: ReconnectConfig,
}

/// Configuration for reconnection behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection
    pub enabled: bool,

    /// Initial delay before first reconnect attempt
    pub initial_delay: Duration,

    /// Maximum delay between reconnect attempts
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,

    /// Maximum number of reconnect attempts (None = infinite)
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Reconnection turned off: the first failure is final
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Limit the number of reconnect attempts
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the initial and maximum backoff delays
    #[must_use]
    pub const fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Delay before the given reconnect attempt (1-based), capped at `max_delay`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Whether another attempt is allowed after `attempts` failed ones
    #[must_use]
    pub fn allows(&self, attempts: usize) -> bool {
        self.enabled && self.max_attempts.map_or(true, |max| attempts <= max)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_string: "redis://localhost:6379".to_string(),
            password: None,
            database: 0,
            tls: false,
            topology_mode: TopologyMode::Standalone,
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Some(Duration::from_secs(2)),
            reconnect: ReconnectConfig::default().with_max_attempts(5),
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration with the given connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Set the password for authentication
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Set the database number
    #[must_use]
    pub const fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    /// Enable TLS
    #[must_use]
    pub const fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set the topology mode
    #[must_use]
    pub const fn with_topology_mode(mut self, mode: TopologyMode) -> Self {
        self.topology_mode = mode;
        self
    }

    /// Set the connection timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the operation timeout (None disables it)
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the reconnection policy
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Check the configuration for values the driver would reject later
    pub fn validate(&self) -> crate::error::RedisResult<()> {
        use crate::error::RedisError;

        if self.parse_endpoints().is_empty() {
            return Err(RedisError::Config("No endpoints specified".to_string()));
        }
        if self.address_part().split(',').any(|endpoint| {
            let endpoint = endpoint.trim().trim_end_matches('/');
            endpoint.contains('@') || endpoint.contains('/')
        }) {
            return Err(RedisError::Config(format!(
                "Connection string must list host:port only, got {:?} - use with_password and with_database",
                self.connection_string
            )));
        }
        if self.database < 0 {
            return Err(RedisError::Config(format!(
                "Database index must be non-negative, got {}",
                self.database
            )));
        }
        if self.topology_mode == TopologyMode::Cluster && self.database != 0 {
            return Err(RedisError::Config(
                "Redis Cluster only supports database 0".to_string(),
            ));
        }
        if self.operation_timeout.is_some_and(|t| t.is_zero()) {
            return Err(RedisError::Config(
                "Operation timeout cannot be zero - use None for no timeout".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse connection endpoints from connection string
    ///
    /// Duplicate addresses are dropped, first occurrence wins.
    #[must_use]
    pub fn parse_endpoints(&self) -> Vec<(String, u16)> {
        let mut endpoints: Vec<(String, u16)> = Vec::new();
        for endpoint in self.address_part().split(',') {
            // Userinfo and database path are not part of the address
            let endpoint = endpoint.trim();
            let endpoint = endpoint.rsplit_once('@').map_or(endpoint, |(_, host)| host);
            let endpoint = endpoint.split_once('/').map_or(endpoint, |(host, _)| host);
            if endpoint.is_empty() {
                continue;
            }

            let parsed = match endpoint.rsplit_once(':') {
                Some((host, port_str)) => match port_str.parse::<u16>() {
                    Ok(port) => (host.to_string(), port),
                    Err(_) => (endpoint.to_string(), 6379),
                },
                // Default port 6379 if not specified
                None => (endpoint.to_string(), 6379),
            };

            if !endpoints.contains(&parsed) {
                endpoints.push(parsed);
            }
        }
        endpoints
    }

    fn address_part(&self) -> &str {
        let conn_str = self.connection_string.trim();
        conn_str
            .strip_prefix("redis://")
            .or_else(|| conn_str.strip_prefix("rediss://"))
            .unwrap_or(conn_str)
    }

    /// Build driver URLs, one per endpoint
    ///
    /// Credentials and database are applied separately so they never need
    /// URL escaping.
    #[must_use]
    pub fn endpoint_urls(&self) -> Vec<String> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let fragment = if self.tls { "#insecure" } else { "" };
        self.parse_endpoints()
            .into_iter()
            .map(|(host, port)| format!("{scheme}://{host}:{port}{fragment}"))
            .collect()
    }
}
