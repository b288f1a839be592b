use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub stream_server: String,
    pub accounts_file: String,

    // Catalog ceilings
    pub max_live: usize,
    pub max_movie: usize,
    pub max_series: usize,

    // Cache
    pub catalog_ttl_ms: u64,

    // Fetching
    pub fetch_timeout_ms: u64,
    pub max_playlist_size_mb: usize,
    pub max_retries: u32,
    pub user_agent: String,
}

/// Per-kind entry ceilings applied while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    pub max_live: usize,
    pub max_movie: usize,
    pub max_series: usize,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_live: 5000,
            max_movie: 2000,
            max_series: 1000,
        }
    }
}

/// Bounds for a single remote playlist fetch
#[derive(Debug, Clone)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bytes: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(120_000),
            max_bytes: 500 * 1024 * 1024,
            max_retries: 2,
            user_agent: "VLC/3.0.20 LibVLC/3.0.20".to_string(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// `Config::default()` for anything unset or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            // Server
            port: env_or("PORT", defaults.port),
            stream_server: env::var("STREAM_SERVER").unwrap_or(defaults.stream_server),
            accounts_file: env::var("ACCOUNTS_FILE").unwrap_or(defaults.accounts_file),

            // Catalog ceilings
            max_live: env_or("MAX_LIVE", defaults.max_live),
            max_movie: env_or("MAX_MOVIE", defaults.max_movie),
            max_series: env_or("MAX_SERIES", defaults.max_series),

            // Cache
            catalog_ttl_ms: env_or("CATALOG_TTL_MS", defaults.catalog_ttl_ms),

            // Fetching
            fetch_timeout_ms: env_or("FETCH_TIMEOUT_MS", defaults.fetch_timeout_ms),
            max_playlist_size_mb: env_or("MAX_PLAYLIST_SIZE_MB", defaults.max_playlist_size_mb),
            max_retries: env_or("MAX_RETRIES", defaults.max_retries),
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    pub fn catalog_limits(&self) -> CatalogLimits {
        CatalogLimits {
            max_live: self.max_live,
            max_movie: self.max_movie,
            max_series: self.max_series,
        }
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: Duration::from_millis(self.fetch_timeout_ms),
            max_bytes: (self.max_playlist_size_mb as u64) * 1024 * 1024,
            max_retries: self.max_retries,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_millis(self.catalog_ttl_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        let catalog = CatalogLimits::default();
        Self {
            port: 5000,
            stream_server: "http://localhost:5000".to_string(),
            accounts_file: "accounts.json".to_string(),
            max_live: catalog.max_live,
            max_movie: catalog.max_movie,
            max_series: catalog.max_series,
            catalog_ttl_ms: 86_400_000, // 24 hours
            fetch_timeout_ms: 120_000,  // 2 minutes
            max_playlist_size_mb: 500,
            max_retries: 2,
            // Use VLC user agent to avoid IPTV server blocks
            user_agent: "VLC/3.0.20 LibVLC/3.0.20".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_limits_from_megabytes() {
        let config = Config {
            max_playlist_size_mb: 3,
            fetch_timeout_ms: 1500,
            ..Config::default()
        };
        let limits = config.fetch_limits();
        assert_eq!(limits.max_bytes, 3 * 1024 * 1024);
        assert_eq!(limits.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_defaults_are_fixed() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.catalog_ttl(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.catalog_limits(), CatalogLimits::default());

        let limits = config.fetch_limits();
        let expected = FetchLimits::default();
        assert_eq!(limits.timeout, expected.timeout);
        assert_eq!(limits.max_bytes, expected.max_bytes);
        assert_eq!(limits.max_retries, expected.max_retries);
    }

    #[test]
    fn test_catalog_limits_copy_ceilings() {
        let config = Config {
            max_live: 7,
            max_movie: 8,
            max_series: 9,
            ..Config::default()
        };
        assert_eq!(
            config.catalog_limits(),
            CatalogLimits { max_live: 7, max_movie: 8, max_series: 9 }
        );
    }
}
