//! # Realm Client Configuration
//!
//! Session-wide settings: target network, mint price, debounce timing,
//! notification lifetime and cache sizing.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::{ChainId, U256};

use crate::domain::ConfigError;

/// Provider diagnostic that never helps the user.
pub const DEFAULT_NOISY_ERROR_MARKER: &str = "version=providers/5.4.5";

/// Realm client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network the contracts live on.
    pub chain: ChainId,

    /// Value attached to a claim, in wei.
    pub mint_price_wei: U256,

    /// Delay before a form's predicate is evaluated (ms).
    pub validation_settle_ms: u64,

    /// Delay after which an unresolved form falls back to `Invalid` (ms).
    pub validation_fallback_ms: u64,

    /// Mint requires a connected account.
    pub require_account_for_mint: bool,

    /// How long notifications stay visible (ms).
    pub notification_duration_ms: u64,

    /// Error messages containing this are shown as a generic failure.
    pub noisy_error_marker: String,

    /// Gas limit for farm builds.
    pub farm_build_gas_limit: u64,

    /// Unobserved cache entries kept before LRU eviction.
    pub cache_capacity: usize,

    /// Buffer of session and workflow command channels.
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain: ChainId::Arbitrum,
            // 0.01 ether
            mint_price_wei: U256::from(10_000_000_000_000_000u64),
            validation_settle_ms: 0,
            validation_fallback_ms: 300,
            require_account_for_mint: true,
            notification_duration_ms: 7000,
            noisy_error_marker: DEFAULT_NOISY_ERROR_MARKER.to_string(),
            farm_build_gas_limit: 300_000,
            cache_capacity: 1000,
            command_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Create a config for testing (testnet, small cache).
    pub fn for_testing() -> Self {
        Self {
            chain: ChainId::Rinkeby,
            notification_duration_ms: 1000,
            cache_capacity: 64,
            command_buffer: 16,
            ..Self::default()
        }
    }

    /// Defaults overridden by `REALM_*` environment variables, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("REALM_CHAIN") {
            config.chain = parse_var("REALM_CHAIN", &value)?;
        }
        if let Some(value) = lookup("REALM_MINT_PRICE_WEI") {
            config.mint_price_wei =
                U256::from_dec_str(value.trim()).map_err(|_| ConfigError::InvalidEnv {
                    var: "REALM_MINT_PRICE_WEI",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup("REALM_VALIDATION_FALLBACK_MS") {
            config.validation_fallback_ms = parse_var("REALM_VALIDATION_FALLBACK_MS", &value)?;
        }
        if let Some(value) = lookup("REALM_CACHE_CAPACITY") {
            config.cache_capacity = parse_var("REALM_CACHE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("REALM_NOTIFICATION_DURATION_MS") {
            config.notification_duration_ms =
                parse_var("REALM_NOTIFICATION_DURATION_MS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validation_fallback_ms < self.validation_settle_ms {
            return Err(ConfigError::InvalidField {
                field: "validation_fallback_ms",
                reason: format!(
                    "{} is shorter than the settle delay ({})",
                    self.validation_fallback_ms, self.validation_settle_ms
                ),
            });
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidField {
                field: "cache_capacity",
                reason: "cannot be 0".to_string(),
            });
        }

        if self.command_buffer == 0 {
            return Err(ConfigError::InvalidField {
                field: "command_buffer",
                reason: "cannot be 0".to_string(),
            });
        }

        if self.notification_duration_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: "notification_duration_ms",
                reason: "cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.chain, ChainId::Arbitrum);
        assert_eq!(config.validation_fallback_ms, 300);
        assert_eq!(config.notification_duration_ms, 7000);
        assert_eq!(config.farm_build_gas_limit, 300_000);
        assert!(config.require_account_for_mint);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_testing_is_valid() {
        assert!(ClientConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = tokio_test::assert_ok!(ClientConfig::from_lookup(lookup(&[
            ("REALM_CHAIN", "0x4"),
            ("REALM_MINT_PRICE_WEI", "5"),
            ("REALM_CACHE_CAPACITY", " 32 "),
        ])));
        assert_eq!(config.chain, ChainId::Rinkeby);
        assert_eq!(config.mint_price_wei, U256::from(5));
        assert_eq!(config.cache_capacity, 32);
        assert_eq!(config.validation_fallback_ms, 300);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let err = tokio_test::assert_err!(ClientConfig::from_lookup(lookup(&[(
            "REALM_CACHE_CAPACITY",
            "lots"
        )])));
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "REALM_CACHE_CAPACITY",
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let err = ClientConfig::from_lookup(lookup(&[("REALM_CACHE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { field: "cache_capacity", .. }));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"validation_fallback_ms": 500}"#).unwrap();
        assert_eq!(config.validation_fallback_ms, 500);
        assert_eq!(config.cache_capacity, 1000);
    }
}
