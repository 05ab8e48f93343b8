//! Runtime configuration for the escrow engine.

use std::time::Duration;

use serde::Deserialize;

/// Tunable escrow parameters. Defaults match the marketplace policy:
/// 15% platform cut, 4-digit confirmation codes valid for 24 hours.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Platform cut in basis points (1500 = 15%).
    pub fee_bps: u16,
    /// Number of digits in a seller confirmation code.
    pub code_length: u8,
    /// Confirmation code time-to-live in seconds.
    pub code_ttl_secs: i64,
    /// Upper bound on payment-verification and payout calls, in milliseconds.
    pub upstream_timeout_ms: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            fee_bps: 1_500,
            code_length: 4,
            code_ttl_secs: 24 * 60 * 60,
            upstream_timeout_ms: 5_000,
        }
    }
}

impl EscrowConfig {
    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.code_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Defaults overridden by the `ESCROW_FEE_BPS`, `ESCROW_CODE_LENGTH`,
    /// `ESCROW_CODE_TTL_SECS` and `ESCROW_UPSTREAM_TIMEOUT_MS` environment
    /// variables. Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok()?.parse().ok()
        }

        let mut config = Self::default();
        if let Some(v) = parse("ESCROW_FEE_BPS") {
            config.fee_bps = v;
        }
        if let Some(v) = parse("ESCROW_CODE_LENGTH") {
            config.code_length = v;
        }
        if let Some(v) = parse("ESCROW_CODE_TTL_SECS") {
            config.code_ttl_secs = v;
        }
        if let Some(v) = parse("ESCROW_UPSTREAM_TIMEOUT_MS") {
            config.upstream_timeout_ms = v;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_marketplace_policy() {
        let config = EscrowConfig::default();
        assert_eq!(config.fee_bps, 1_500);
        assert_eq!(config.code_length, 4);
        assert_eq!(config.code_ttl_secs, 86_400);
        assert_eq!(config.upstream_timeout_ms, 5_000);
    }

    #[test]
    fn code_ttl_converts_to_chrono_duration() {
        let config = EscrowConfig::default();
        assert_eq!(config.code_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn upstream_timeout_converts_to_std_duration() {
        let config = EscrowConfig::default();
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
    }
}
