//! Engine runtime configuration: trading pair, feed toggles, and the
//! cadences for the Engine's recurring scheduled tasks.

use std::time::Duration;

use super::thresholds::ThresholdProfile;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trading pair the ingest supervisor tracks.
    pub symbol: String,
    /// When true, regime events drive a paper-trading strategy instead of
    /// live execution. The engine never executes live trades either way;
    /// this flag is forwarded to downstream consumers unchanged.
    pub paper_trading: bool,
    /// Master switch for the order-book/derivatives/whale ingest streams.
    pub enable_real_time_feeds: bool,
    /// Active classifier calibration.
    pub threshold_profile: ThresholdProfile,

    /// Cadence for per-address whale-balance checks.
    pub whale_balance_check_interval: Duration,
    /// Cadence for the system health check (spec default 30s).
    pub system_health_check_interval: Duration,
    /// Cadence for upstream API health checks.
    pub api_health_check_interval: Duration,
    /// Cadence for the memory-cleanup task.
    pub memory_cleanup_interval: Duration,

    /// Addresses tracked by the whale-balance-check task.
    pub whale_watchlist: Vec<String>,
    /// Derivatives venues to subscribe, as `(name, websocket url)` pairs.
    pub derivatives_venues: Vec<(String, String)>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let symbol = std::env::var("SYMBOL").unwrap_or_else(|_| "ETHUSDT".to_string());
        let paper_trading = Self::bool_env("PAPER_TRADING", true);
        let enable_real_time_feeds = Self::bool_env("ENABLE_REAL_TIME_FEEDS", true);
        let whale_watchlist = std::env::var("WHALE_WATCHLIST")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let derivatives_venues = std::env::var("DERIVATIVES_VENUES")
            .map(|v| {
                v.split(',')
                    .filter_map(|pair| {
                        let pair = pair.trim();
                        let (name, url) = pair.split_once('=')?;
                        let name = name.trim();
                        let url = url.trim();
                        if name.is_empty() || url.is_empty() {
                            None
                        } else {
                            Some((name.to_string(), url.to_string()))
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            symbol,
            paper_trading,
            enable_real_time_feeds,
            threshold_profile: ThresholdProfile::from_env(),
            whale_balance_check_interval: Duration::from_secs(Self::u64_env(
                "WHALE_BALANCE_CHECK_INTERVAL_SECS",
                300,
            )),
            system_health_check_interval: Duration::from_secs(30),
            api_health_check_interval: Duration::from_secs(Self::u64_env(
                "API_HEALTH_CHECK_INTERVAL_SECS",
                60,
            )),
            memory_cleanup_interval: Duration::from_secs(Self::u64_env(
                "MEMORY_CLEANUP_INTERVAL_SECS",
                900,
            )),
            whale_watchlist,
            derivatives_venues,
        }
    }

    fn bool_env(name: &str, default: bool) -> bool {
        match std::env::var(name) {
            Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => default,
        }
    }

    fn u64_env(name: &str, default: u64) -> u64 {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::remove_var("SYMBOL");
            std::env::remove_var("PAPER_TRADING");
            std::env::remove_var("ENABLE_REAL_TIME_FEEDS");
            std::env::remove_var("WHALE_WATCHLIST");
            std::env::remove_var("DERIVATIVES_VENUES");
        }
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert!(cfg.paper_trading);
        assert!(cfg.enable_real_time_feeds);
        assert_eq!(cfg.system_health_check_interval, Duration::from_secs(30));
        assert!(cfg.whale_watchlist.is_empty());
        assert!(cfg.derivatives_venues.is_empty());
    }

    #[test]
    fn derivatives_venues_parses_name_url_pairs() {
        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::set_var(
                "DERIVATIVES_VENUES",
                "binance=wss://fstream.binance.com/ws, bybit=wss://stream.bybit.com/v5/public/linear",
            );
        }
        let cfg = EngineConfig::from_env();
        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::remove_var("DERIVATIVES_VENUES");
        }
        assert_eq!(
            cfg.derivatives_venues,
            vec![
                ("binance".to_string(), "wss://fstream.binance.com/ws".to_string()),
                ("bybit".to_string(), "wss://stream.bybit.com/v5/public/linear".to_string()),
            ]
        );
    }
}
