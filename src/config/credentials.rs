//! Secret credential management
//!
//! Secure handling of the engine's secrets, loaded from environment variables.
//! Secrets are never logged at INFO/WARN levels and are masked when displayed.

use std::fmt;

/// Secure string wrapper that masks sensitive data in logs.
///
/// Debug output shows only `SecretString(***)`; Display shows the truncated
/// form `first4...last4`.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        SecretString(value)
    }

    /// Returns a reference to the inner string.
    ///
    /// Only use this when actually needed for an outbound call. Never log or
    /// display the returned value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Masked form for safe logging: `first4...last4`.
    pub fn masked(&self) -> String {
        let s = &self.0;
        if s.len() <= 8 {
            return "***".to_string();
        }
        format!("{}...{}", &s[..4], &s[s.len() - 4..])
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString::new(s)
    }
}

/// Secrets required by the engine's outbound collaborators: the Telegram
/// sink, the whale-transaction webhook, and the balance-lookup provider.
///
/// The Telegram pair is optional: when `TELEGRAM_BOT_TOKEN` is unset, the
/// engine falls back to a `NullSink` instead of failing startup.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_chat_id: Option<String>,
    pub webhook_security_token: SecretString,
    pub balance_provider_api_key: SecretString,
}

impl Credentials {
    /// Loads credentials from environment variables.
    ///
    /// Reads `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID` (both optional),
    /// `WEBHOOK_SECURITY_TOKEN`, and `ETHERSCAN_API_KEY` (both mandatory).
    /// Trims whitespace and validates non-empty where present.
    pub fn from_env() -> Result<Self, String> {
        let telegram_bot_token = Self::optional_env("TELEGRAM_BOT_TOKEN");
        let telegram_chat_id = Self::optional_env("TELEGRAM_CHAT_ID");
        let webhook_security_token = Self::require_env("WEBHOOK_SECURITY_TOKEN")?;
        let balance_provider_api_key = Self::require_env("ETHERSCAN_API_KEY")?;

        Ok(Self {
            telegram_bot_token: telegram_bot_token.map(SecretString::new),
            telegram_chat_id,
            webhook_security_token: SecretString::new(webhook_security_token),
            balance_provider_api_key: SecretString::new(balance_provider_api_key),
        })
    }

    fn require_env(name: &str) -> Result<String, String> {
        let value = std::env::var(name).map_err(|_| format!("{name} not set"))?;
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(format!("{name} is empty after trimming whitespace"));
        }
        Ok(value)
    }

    /// `None` if the variable is unset or empty after trimming.
    fn optional_env(name: &str) -> Option<String> {
        let value = std::env::var(name).ok()?.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_short_secret_is_fully_redacted() {
        let s = SecretString::new("short".to_string());
        assert_eq!(s.masked(), "***");
    }

    #[test]
    fn masked_long_secret_keeps_first_and_last_four() {
        let s = SecretString::new("abcdefghijklmnop".to_string());
        assert_eq!(s.masked(), "abcd...mnop");
    }

    #[test]
    fn debug_never_exposes_value() {
        let s = SecretString::new("super-secret-token".to_string());
        assert_eq!(format!("{s:?}"), "SecretString(***)");
    }
}
