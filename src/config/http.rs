//! HTTP control-plane configuration.

use std::net::SocketAddr;

/// Bind and auth settings for the HTTP control plane.
///
/// ## Environment Variables
///
/// - `HTTP_HOST`: bind address (default: 0.0.0.0)
/// - `PORT`: bind port (default: 8080)
/// - `WEBHOOK_SECURITY_TOKEN`: bearer token required on the webhook route
/// - `HTTP_RATE_LIMIT`: requests per minute per client (default: 100)
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub addr: SocketAddr,
    pub rate_limit: u32,
}

impl HttpConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let host = std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;
        let rate_limit: u32 = std::env::var("HTTP_RATE_LIMIT")
            .unwrap_or_else(|_| "100".to_string())
            .parse()?;

        Ok(Self {
            addr: format!("{host}:{port}").parse()?,
            rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        // SAFETY: test-only, single-threaded test environment.
        unsafe {
            std::env::remove_var("HTTP_HOST");
            std::env::remove_var("PORT");
            std::env::remove_var("HTTP_RATE_LIMIT");
        }

        let config = HttpConfig::from_env().expect("config should load with defaults");

        assert_eq!(config.addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.rate_limit, 100);
    }
}
