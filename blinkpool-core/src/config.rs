//! Pool configuration: tunables, defaults, and the validation/normalisation pass
//! that turns a user-supplied [`Config`] into one the pool manager can trust.

use crate::error::{Error, Result};
use std::time::Duration;
use url::Url;

const DEFAULT_POOL_NAME: &str = "blink-pool";
const DEFAULT_MIN_IDLE: u32 = 10;
const DEFAULT_MAX_POOL_SIZE: u32 = 20;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_LIFETIME: Duration = Duration::from_millis(1_800_000);
const MIN_MAX_LIFETIME: Duration = Duration::from_millis(60_000);
const DEFAULT_CHECK_INTERVAL_MS: i64 = 2_000;
const MIN_POSITIVE_CHECK_INTERVAL_MS: i64 = 500;
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_CHECK_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_BORROW_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Recognised `jdbc:<scheme>:` URL prefixes and the driver identifier they imply.
///
/// Preserved from the source project for compatibility with its configuration
/// files; this crate does not otherwise care what the string means.
const KNOWN_SCHEMES: &[(&str, &str)] = &[
    ("postgresql", "org.postgresql.Driver"),
    ("mysql", "com.mysql.cj.jdbc.Driver"),
    ("hsqldb", "org.hsqldb.jdbc.JDBCDriver"),
    ("h2", "org.h2.Driver"),
    ("oracle", "oracle.jdbc.OracleDriver"),
    ("sqlserver", "com.microsoft.sqlserver.jdbc.SQLServerDriver"),
    ("sybase", "com.sybase.jdbc4.jdbc.SybDriver"),
    ("db2", "com.ibm.db2.jcc.DB2Driver"),
    ("jtds", "net.sourceforge.jtds.jdbc.Driver"),
    ("kingbase8", "com.kingbase8.Driver"),
    ("uxdb", "com.ux.jdbc.Driver"),
    ("dm", "dm.jdbc.driver.DmDriver"),
    ("informix-sqli", "com.informix.jdbc.IfxDriver"),
    ("log4jdbc", "net.sf.log4jdbc.DriverSpy"),
];

/// How often liveness probes run against a borrowed-or-idle connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInterval {
    /// Probing is disabled entirely; a connection is trusted for its whole lifetime.
    Disabled,
    /// Probe on every single borrow.
    Always,
    /// Probe at most once per this many milliseconds for a given connection.
    Throttled(u32),
}

impl CheckInterval {
    fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            CheckInterval::Disabled
        } else if ms == 0 {
            CheckInterval::Always
        } else {
            CheckInterval::Throttled(ms as u32)
        }
    }
}

/// Validated, immutable tunables for a [`PoolManager`][crate::manager::PoolManager].
///
/// Build one with [`Config::new`], adjust it with the builder-style setters, then
/// call [`Config::validate_and_normalize`] once at pool construction time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pool_name: String,
    jdbc_url: String,
    driver_class_name: Option<String>,
    username: String,
    password: String,
    min_idle: u32,
    max_pool_size: u32,
    idle_timeout: Duration,
    max_lifetime: Duration,
    check_interval_ms: i64,
    check_timeout: Duration,
    check_sql: Option<String>,
    borrow_timeout: Duration,
    async_init_idle: bool,
}

impl Config {
    /// Starts a new configuration for the given JDBC-style URL, with every other
    /// field at its documented default.
    pub fn new(jdbc_url: impl Into<String>) -> Self {
        Config {
            pool_name: DEFAULT_POOL_NAME.to_string(),
            jdbc_url: jdbc_url.into(),
            driver_class_name: None,
            username: String::new(),
            password: String::new(),
            min_idle: DEFAULT_MIN_IDLE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            check_sql: None,
            borrow_timeout: DEFAULT_BORROW_TIMEOUT,
            async_init_idle: false,
        }
    }

    pub fn pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    pub fn driver_class_name(mut self, name: impl Into<String>) -> Self {
        self.driver_class_name = Some(name.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn min_idle(mut self, min_idle: u32) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn max_pool_size(mut self, max_pool_size: u32) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    /// Sets the minimum gap between liveness probes, in milliseconds.
    ///
    /// A negative value disables probing; zero forces a probe on every borrow.
    pub fn check_interval_ms(mut self, ms: i64) -> Self {
        self.check_interval_ms = ms;
        self
    }

    pub fn check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    /// Overrides the driver's native liveness probe with an explicit SQL statement.
    pub fn check_sql(mut self, sql: impl Into<String>) -> Self {
        self.check_sql = Some(sql.into());
        self
    }

    pub fn borrow_timeout(mut self, borrow_timeout: Duration) -> Self {
        self.borrow_timeout = borrow_timeout;
        self
    }

    /// When `true`, filling the idle queue up to `min_idle` at construction
    /// happens on a detached background task rather than blocking the
    /// constructor.
    pub fn async_init_idle(mut self, async_init_idle: bool) -> Self {
        self.async_init_idle = async_init_idle;
        self
    }

    pub fn get_pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn get_jdbc_url(&self) -> &str {
        &self.jdbc_url
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }

    pub fn get_password(&self) -> &str {
        &self.password
    }

    pub fn get_min_idle(&self) -> u32 {
        self.min_idle
    }

    pub fn get_max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    pub fn get_idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn get_max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    pub fn get_check_interval(&self) -> CheckInterval {
        CheckInterval::from_millis(self.check_interval_ms)
    }

    pub fn get_check_timeout(&self) -> Duration {
        self.check_timeout
    }

    pub fn get_check_sql(&self) -> Option<&str> {
        self.check_sql.as_deref()
    }

    pub fn get_borrow_timeout(&self) -> Duration {
        self.borrow_timeout
    }

    pub fn get_async_init_idle(&self) -> bool {
        self.async_init_idle
    }

    pub fn get_driver_class_name(&self) -> Option<&str> {
        self.driver_class_name.as_deref()
    }

    /// Resolves defaults, clamps out-of-range numeric fields to their minima,
    /// infers a driver class from the URL scheme when none was set explicitly,
    /// and returns a normalised copy.
    ///
    /// This is the only fallible step in configuring a pool; everything after
    /// this call is infallible with respect to configuration.
    pub fn validate_and_normalize(mut self) -> Result<Self> {
        if self.jdbc_url.trim().is_empty() {
            return Err(Error::Config("jdbcUrl must not be empty".to_string()));
        }
        if !self.jdbc_url.starts_with("jdbc:") {
            return Err(Error::Config(format!(
                "jdbcUrl must start with \"jdbc:\", got {:?}",
                self.jdbc_url
            )));
        }

        if self.driver_class_name.is_none() {
            self.driver_class_name = Some(infer_driver_class(&self.jdbc_url)?);
        }

        if self.pool_name.trim().is_empty() {
            self.pool_name = DEFAULT_POOL_NAME.to_string();
        }

        if self.max_pool_size == 0 {
            self.max_pool_size = DEFAULT_MAX_POOL_SIZE;
        }

        if self.min_idle > self.max_pool_size {
            tracing::warn!(
                pool = %self.pool_name,
                min_idle = self.min_idle,
                max_pool_size = self.max_pool_size,
                "minIdle exceeds maxPoolSize; swapping the two"
            );
            std::mem::swap(&mut self.min_idle, &mut self.max_pool_size);
        }

        if self.idle_timeout < MIN_IDLE_TIMEOUT {
            self.idle_timeout = if self.idle_timeout.is_zero() {
                DEFAULT_IDLE_TIMEOUT
            } else {
                MIN_IDLE_TIMEOUT
            };
        }

        if self.max_lifetime < MIN_MAX_LIFETIME {
            self.max_lifetime = if self.max_lifetime.is_zero() {
                DEFAULT_MAX_LIFETIME
            } else {
                MIN_MAX_LIFETIME
            };
        }

        if self.check_interval_ms > 0 && self.check_interval_ms < MIN_POSITIVE_CHECK_INTERVAL_MS {
            self.check_interval_ms = MIN_POSITIVE_CHECK_INTERVAL_MS;
        }

        if self.check_timeout.is_zero() {
            self.check_timeout = DEFAULT_CHECK_TIMEOUT;
        } else if self.check_timeout < MIN_CHECK_TIMEOUT {
            self.check_timeout = MIN_CHECK_TIMEOUT;
        }

        if self.borrow_timeout.is_zero() {
            self.borrow_timeout = DEFAULT_BORROW_TIMEOUT;
        }

        Ok(self)
    }
}

fn infer_driver_class(jdbc_url: &str) -> Result<String> {
    let rest = jdbc_url.trim_start_matches("jdbc:");
    let scheme = rest.split(':').next().unwrap_or_default();

    for (known_scheme, driver_class) in KNOWN_SCHEMES {
        if *known_scheme == scheme {
            return Ok((*driver_class).to_string());
        }
    }

    // Fall back to treating the remainder as a conventional URL, in case the
    // scheme is embedded differently than `jdbc:<scheme>:...`.
    if let Ok(parsed) = Url::parse(rest) {
        for (known_scheme, driver_class) in KNOWN_SCHEMES {
            if parsed.scheme() == *known_scheme {
                return Ok((*driver_class).to_string());
            }
        }
    }

    Err(Error::Config(format!(
        "no known driver for jdbcUrl scheme {:?}; set driver_class_name explicitly",
        scheme
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_known_driver_from_scheme() {
        let cfg = Config::new("jdbc:postgresql://localhost:5432/app")
            .validate_and_normalize()
            .unwrap();
        assert_eq!(cfg.get_driver_class_name(), Some("org.postgresql.Driver"));
    }

    #[test]
    fn rejects_empty_url() {
        let err = Config::new("").validate_and_normalize().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_unknown_scheme_without_explicit_driver() {
        let err = Config::new("jdbc:frobnicate://localhost/app")
            .validate_and_normalize()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn swaps_reversed_min_idle_and_max_pool_size() {
        let cfg = Config::new("jdbc:postgresql://localhost/app")
            .min_idle(50)
            .max_pool_size(5)
            .validate_and_normalize()
            .unwrap();
        assert_eq!(cfg.get_min_idle(), 5);
        assert_eq!(cfg.get_max_pool_size(), 50);
    }

    #[test]
    fn clamps_small_idle_timeout() {
        let cfg = Config::new("jdbc:postgresql://localhost/app")
            .idle_timeout(Duration::from_secs(1))
            .validate_and_normalize()
            .unwrap();
        assert_eq!(cfg.get_idle_timeout(), MIN_IDLE_TIMEOUT);
    }

    #[test]
    fn clamps_small_check_timeout() {
        let cfg = Config::new("jdbc:postgresql://localhost/app")
            .check_timeout(Duration::from_millis(500))
            .validate_and_normalize()
            .unwrap();
        assert_eq!(cfg.get_check_timeout(), MIN_CHECK_TIMEOUT);
    }

    #[test]
    fn zero_borrow_timeout_uses_default() {
        let cfg = Config::new("jdbc:postgresql://localhost/app")
            .borrow_timeout(Duration::ZERO)
            .validate_and_normalize()
            .unwrap();
        assert_eq!(cfg.get_borrow_timeout(), DEFAULT_BORROW_TIMEOUT);
    }
}
