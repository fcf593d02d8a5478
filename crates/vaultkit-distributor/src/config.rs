//! Distributor configuration file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vaultkit_cell::{Address, Coins};
use vaultkit_client::confirm::RetryPolicy;
use vaultkit_rewards::orchestrator::{RewardConfig, VaultTarget};
use vaultkit_rewards::period::DEFAULT_PERIOD_SECS;

/// File name looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "distributor.toml";

/// Complete distributor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Identity that signs distributions and funding transfers.
    pub governor: GovernorConfig,
    /// Ledger gateway connection.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Reward policy.
    #[serde(default)]
    pub rewards: RewardsConfig,
    /// Submission retry limits.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Vaults to distribute for, processed in file order.
    pub vaults: Vec<VaultEntry>,
}

/// Governor identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Wallet address the gateway signs for.
    pub address: Address,
    /// Name used in logs.
    #[serde(default = "default_governor_label")]
    pub label: String,
}

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Unix socket of the ledger gateway. Empty = $data_dir/gateway.sock.
    #[serde(default)]
    pub socket_path: String,
}

/// Reward policy. Amounts are decimal strings in native units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Distributed per period per vault.
    #[serde(default = "default_period_budget", with = "decimal")]
    pub period_budget: Coins,
    /// Added to each funding transfer for pool fees.
    #[serde(default = "default_protocol_fee_margin", with = "decimal")]
    pub protocol_fee_margin: Coins,
    /// Period length in seconds.
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// Denominator of vault management fee rates.
    #[serde(default = "default_management_fee_precision")]
    pub management_fee_precision: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for vaultkit crates: "trace" | "debug" | "info" | "warn" | "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// One `[[vaults]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub vault: Address,
    pub strategy: Address,
    pub distribution_pool: Address,
}

// Default value functions

fn default_governor_label() -> String {
    "governor".to_string()
}

fn default_period_budget() -> Coins {
    1_000_000_000
}

fn default_protocol_fee_margin() -> Coins {
    100_000_000
}

fn default_period_secs() -> u64 {
    DEFAULT_PERIOD_SECS
}

fn default_management_fee_precision() -> u32 {
    RewardConfig::default().management_fee_precision
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            period_budget: default_period_budget(),
            protocol_fee_margin: default_protocol_fee_margin(),
            period_secs: default_period_secs(),
            management_fee_precision: default_management_fee_precision(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DistributorConfig {
    /// Load and validate the configuration at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DistributorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the distributor cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vaults.is_empty() {
            anyhow::bail!("no [[vaults]] configured");
        }
        for (i, entry) in self.vaults.iter().enumerate() {
            if self.vaults[..i].iter().any(|e| e.vault == entry.vault) {
                anyhow::bail!("vault {} listed twice", entry.vault);
            }
        }
        self.retry.validate()?;
        self.reward_config().validate()?;
        Ok(())
    }

    /// Reward policy for the orchestrator.
    pub fn reward_config(&self) -> RewardConfig {
        RewardConfig {
            period_budget: self.rewards.period_budget,
            protocol_fee_margin: self.rewards.protocol_fee_margin,
            period_secs: self.rewards.period_secs,
            management_fee_precision: self.rewards.management_fee_precision,
        }
    }

    /// Vault targets in file order.
    pub fn targets(&self) -> Vec<VaultTarget> {
        self.vaults
            .iter()
            .map(|e| VaultTarget {
                vault: e.vault,
                strategy: e.strategy,
                distribution_pool: e.distribution_pool,
            })
            .collect()
    }

    /// Gateway socket path, defaulting into the data directory.
    pub fn socket_path(&self) -> PathBuf {
        if self.gateway.socket_path.is_empty() {
            default_data_dir().join("gateway.sock")
        } else {
            PathBuf::from(&self.gateway.socket_path)
        }
    }
}

/// Config file location from the environment.
pub fn config_path() -> PathBuf {
    resolve_config_path(
        std::env::var("VAULTKIT_CONFIG").ok(),
        std::env::var("VAULTKIT_DATA_DIR").ok(),
        std::env::var("HOME").ok(),
    )
}

/// `VAULTKIT_CONFIG`, else `$VAULTKIT_DATA_DIR/distributor.toml`, else
/// `~/.vaultkit/distributor.toml`.
fn resolve_config_path(
    config: Option<String>,
    data_dir: Option<String>,
    home: Option<String>,
) -> PathBuf {
    if let Some(path) = config.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    resolve_data_dir(data_dir, home).join(CONFIG_FILE_NAME)
}

fn default_data_dir() -> PathBuf {
    resolve_data_dir(
        std::env::var("VAULTKIT_DATA_DIR").ok(),
        std::env::var("HOME").ok(),
    )
}

fn resolve_data_dir(data_dir: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(dir) = data_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    home.map(|h| PathBuf::from(h).join(".vaultkit"))
        .unwrap_or_else(|| PathBuf::from("/tmp/vaultkit"))
}

/// `u128` amounts as decimal strings; TOML integers stop at `i64`.
mod decimal {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid amount {s:?}: {e}")))
    }
}
