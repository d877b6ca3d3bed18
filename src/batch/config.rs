//! Configuration consumed by [`BatchDeliverer`](super::BatchDeliverer).
//!
//! [`BatchConfig`] holds the raw options. Out-of-range values are not errors:
//! a zero batch size or cache capacity falls back to the default and batch
//! sizes above [`MAX_BATCH_SIZE`] are clamped. Only missing or malformed
//! endpoint URLs are rejected.

use std::time::Duration;

use crate::error::ConfigError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 20;
/// Upper bound on records per batch.
pub const MAX_BATCH_SIZE: usize = 200;
/// Default interval between auto-flush ticks.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
/// Default number of undelivered batches kept in the overflow cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;
/// Number of passes over the endpoint list made by one flush.
pub const MAX_ATTEMPTS: usize = 3;
/// `user-agent` sent to the primary endpoint.
pub const PRIMARY_USER_AGENT: &str = "hero-go-sdk";
/// Prefix of the integration headers sent to the primary endpoint.
pub const PRIMARY_HEADER_PREFIX: &str = "HERO-DATA-";
/// `user-agent` sent to the secondary endpoint.
pub const SECONDARY_USER_AGENT: &str = "ta-go-sdk";
/// Prefix of the integration headers sent to the secondary endpoint.
pub const SECONDARY_HEADER_PREFIX: &str = "TA-";
/// Path every secondary URL is rewritten to.
pub const SECONDARY_PATH: &str = "/sync_server";

/// Location, credentials, and request identity of one ingestion endpoint.
///
/// The two ingestion services expect different `user-agent` values and
/// integration header names, so each endpoint carries its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub app_id: String,
    pub user_agent: String,
    /// Prepended to `Integration-Type`, `Integration-Version` and
    /// `Integration-Count`.
    pub header_prefix: String,
}

impl Endpoint {
    /// A primary endpoint posting to `url` as given.
    pub fn new(url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            app_id: app_id.into(),
            user_agent: PRIMARY_USER_AGENT.to_owned(),
            header_prefix: PRIMARY_HEADER_PREFIX.to_owned(),
        }
    }

    /// A secondary endpoint. The path of `url` is replaced by
    /// [`SECONDARY_PATH`]; the scheme, host, query and fragment are kept.
    pub fn secondary(url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            url: replace_path(&url.into(), SECONDARY_PATH),
            app_id: app_id.into(),
            user_agent: SECONDARY_USER_AGENT.to_owned(),
            header_prefix: SECONDARY_HEADER_PREFIX.to_owned(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.header_prefix = prefix.into();
        self
    }

    /// Full name of an integration header, e.g. `HERO-DATA-Integration-Count`.
    pub fn header_name(&self, suffix: &str) -> String {
        format!("{}Integration-{suffix}", self.header_prefix)
    }
}

/// Swap the path of an absolute URL. Strings without a scheme are returned
/// unchanged and left for validation to reject.
fn replace_path(url: &str, path: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_owned();
    };
    let rest = &url[scheme_end..];
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let tail = &rest[authority_end..];
    let suffix = tail.find(['?', '#']).map_or("", |i| &tail[i..]);
    format!("{}{}{path}{suffix}", &url[..scheme_end], &rest[..authority_end])
}

/// Options for a batch deliverer.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Endpoint tried first on every attempt.
    pub primary: Endpoint,
    /// Endpoint tried after the primary fails.
    pub secondary: Option<Endpoint>,
    /// Records per batch; `0` selects [`DEFAULT_BATCH_SIZE`].
    pub batch_size: usize,
    /// Timeout applied to each request.
    pub timeout: Duration,
    /// Gzip request bodies.
    pub compress: bool,
    /// Run the periodic flush thread.
    pub auto_flush: bool,
    /// Interval between periodic flushes.
    pub flush_interval: Duration,
    /// Overflow cache bound; `0` selects [`DEFAULT_CACHE_CAPACITY`].
    pub cache_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            primary: Endpoint::new(String::new(), String::new()),
            secondary: None,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
            compress: true,
            auto_flush: false,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl BatchConfig {
    /// Configuration for a single endpoint with default options.
    pub fn new(server_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            primary: Endpoint::new(server_url, app_id),
            ..Self::default()
        }
    }

    /// Batch size after applying the default and the upper bound.
    pub fn effective_batch_size(&self) -> usize {
        match self.batch_size {
            0 => DEFAULT_BATCH_SIZE,
            size => size.min(MAX_BATCH_SIZE),
        }
    }

    /// Cache capacity after applying the default.
    pub fn effective_cache_capacity(&self) -> usize {
        match self.cache_capacity {
            0 => DEFAULT_CACHE_CAPACITY,
            capacity => capacity,
        }
    }

    /// Flush interval, with a zero interval replaced by the default.
    pub fn effective_flush_interval(&self) -> Duration {
        if self.flush_interval.is_zero() {
            DEFAULT_FLUSH_INTERVAL
        } else {
            self.flush_interval
        }
    }

    /// Check the endpoint URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("server_url", &self.primary.url)?;
        if let Some(secondary) = &self.secondary {
            validate_url("secondary_server_url", &secondary.url)?;
        }
        Ok(())
    }

    /// Endpoints in the order each attempt tries them.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }
}

fn validate_url(field: &'static str, url: &str) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidUrl(url.to_owned())),
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`BatchDeliverer`](super::BatchDeliverer)
/// instances.
#[derive(Clone, Debug, Default)]
pub struct BatchDelivererBuilder {
    primary: Option<Endpoint>,
    secondary: Option<Endpoint>,
    batch_size: Option<usize>,
    timeout_ms: Option<u64>,
    compress: Option<bool>,
    flush_interval_secs: Option<u64>,
    auto_flush: bool,
    cache_capacity: Option<usize>,
}

impl BatchDelivererBuilder {
    /// Create a new builder with no endpoint configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary endpoint (required).
    pub fn with_server(mut self, url: impl Into<String>, app_id: impl Into<String>) -> Self {
        self.primary = Some(Endpoint::new(url, app_id));
        self
    }

    /// Set the fallback endpoint tried when the primary fails.
    ///
    /// Requests go to [`SECONDARY_PATH`] on the given host.
    pub fn with_secondary_server(
        mut self,
        url: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        self.secondary = Some(Endpoint::secondary(url, app_id));
        self
    }

    /// Set the primary endpoint with its request identity spelled out.
    pub fn with_primary_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.primary = Some(endpoint);
        self
    }

    /// Set the fallback endpoint exactly as given, without path rewriting.
    pub fn with_secondary_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.secondary = Some(endpoint);
        self
    }

    option_setter!(
        #[doc = "Set the number of records per batch."]
        with_batch_size,
        batch_size,
        usize
    );
    option_setter!(
        #[doc = "Set the per-request timeout in milliseconds."]
        with_timeout_ms,
        timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Enable or disable gzip compression. Defaults to enabled."]
        with_compress,
        compress,
        bool
    );
    option_setter!(
        #[doc = "Set the overflow cache capacity in batches."]
        with_cache_capacity,
        cache_capacity,
        usize
    );

    /// Flush periodically every `interval_secs` seconds.
    pub fn with_auto_flush(mut self, interval_secs: u64) -> Self {
        self.auto_flush = true;
        self.flush_interval_secs = Some(interval_secs);
        self
    }

    /// Resolve the builder into a validated configuration.
    pub fn config(&self) -> Result<BatchConfig, ConfigError> {
        let defaults = BatchConfig::default();
        let primary = self.primary.clone().ok_or(ConfigError::Empty("server_url"))?;
        let config = BatchConfig {
            primary,
            secondary: self.secondary.clone(),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            timeout: self
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            compress: self.compress.unwrap_or(defaults.compress),
            auto_flush: self.auto_flush,
            flush_interval: self
                .flush_interval_secs
                .map_or(defaults.flush_interval, Duration::from_secs),
            cache_capacity: self.cache_capacity.unwrap_or(defaults.cache_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a deliverer posting to the configured HTTP endpoints.
    pub fn build(&self) -> Result<super::BatchDeliverer, ConfigError> {
        super::BatchDeliverer::with_config(self.config()?)
    }

    /// Build a deliverer over caller-supplied transports instead of HTTP.
    pub fn build_with_transports(
        &self,
        transports: Vec<Box<dyn crate::transport::Transport>>,
    ) -> Result<super::BatchDeliverer, ConfigError> {
        super::BatchDeliverer::with_transports(self.config()?, transports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, DEFAULT_BATCH_SIZE)]
    #[case(1, 1)]
    #[case(150, 150)]
    #[case(5_000, MAX_BATCH_SIZE)]
    fn batch_size_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        let config = BatchConfig {
            batch_size: requested,
            ..BatchConfig::new("http://localhost", "app")
        };
        assert_eq!(config.effective_batch_size(), expected);
    }

    #[test]
    fn zero_cache_capacity_uses_default() {
        let config = BatchConfig {
            cache_capacity: 0,
            ..BatchConfig::new("http://localhost", "app")
        };
        assert_eq!(config.effective_cache_capacity(), DEFAULT_CACHE_CAPACITY);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn rejects_empty_server_url(#[case] url: &str) {
        let err = BatchConfig::new(url, "app").validate().expect_err("empty url");
        assert!(matches!(err, ConfigError::Empty("server_url")));
    }

    #[rstest]
    #[case("localhost:8080/sync")]
    #[case("ftp://example.com")]
    #[case("http://")]
    fn rejects_non_http_urls(#[case] url: &str) {
        let err = BatchConfig::new(url, "app").validate().expect_err("bad url");
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn rejects_bad_secondary_url() {
        let config = BatchConfig {
            secondary: Some(Endpoint::secondary("", "other")),
            ..BatchConfig::new("http://localhost/sync", "app")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Empty("secondary_server_url"))
        ));
    }

    #[test]
    fn builder_requires_server() {
        let err = BatchDelivererBuilder::new().config().expect_err("missing server");
        assert!(matches!(err, ConfigError::Empty("server_url")));
    }

    #[test]
    fn builder_applies_overrides() {
        let config = BatchDelivererBuilder::new()
            .with_server("https://collector.example.com/sync", "app")
            .with_secondary_server("https://backup.example.com/sync", "backup-app")
            .with_batch_size(100)
            .with_timeout_ms(250)
            .with_compress(false)
            .with_cache_capacity(4)
            .with_auto_flush(5)
            .config()
            .expect("valid config");
        assert_eq!(config.effective_batch_size(), 100);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(!config.compress);
        assert!(config.auto_flush);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.effective_cache_capacity(), 4);
        let urls: Vec<_> = config.endpoints().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://collector.example.com/sync",
                "https://backup.example.com/sync_server"
            ]
        );
    }

    #[rstest]
    #[case("https://backup.example.com/sync", "https://backup.example.com/sync_server")]
    #[case("http://10.0.0.1:8991", "http://10.0.0.1:8991/sync_server")]
    #[case("http://backup/a/b?x=1#top", "http://backup/sync_server?x=1#top")]
    #[case("backup.example.com/sync", "backup.example.com/sync")]
    fn secondary_url_path_is_rewritten(#[case] given: &str, #[case] expected: &str) {
        assert_eq!(Endpoint::secondary(given, "app").url, expected);
    }

    #[test]
    fn endpoints_carry_their_own_identity() {
        let primary = Endpoint::new("http://primary/sync_data", "app");
        let secondary = Endpoint::secondary("http://backup", "app");
        assert_eq!(primary.user_agent, PRIMARY_USER_AGENT);
        assert_eq!(primary.header_name("Count"), "HERO-DATA-Integration-Count");
        assert_eq!(secondary.user_agent, SECONDARY_USER_AGENT);
        assert_eq!(secondary.header_name("Type"), "TA-Integration-Type");

        let custom = primary.with_user_agent("agent/1").with_header_prefix("");
        assert_eq!(custom.user_agent, "agent/1");
        assert_eq!(custom.header_name("Version"), "Integration-Version");
    }

    #[test]
    fn explicit_secondary_endpoint_keeps_its_url() {
        let config = BatchDelivererBuilder::new()
            .with_server("http://primary/sync_data", "app")
            .with_secondary_endpoint(Endpoint::new("http://backup/ingest", "app"))
            .config()
            .expect("valid config");
        let secondary = config.secondary.expect("secondary endpoint");
        assert_eq!(secondary.url, "http://backup/ingest");
    }
}
