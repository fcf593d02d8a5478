//! vaultkit-distributor: one extra-reward distribution pass.
//!
//! Loads the TOML config, connects to the ledger gateway over its Unix
//! socket, and distributes the current period's budget for every configured
//! vault. Meant to be run once per period by an external scheduler.

mod config;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vaultkit_client::confirm::ConfirmationTracker;
use vaultkit_client::gateway::GatewayProvider;
use vaultkit_client::session::Session;
use vaultkit_rewards::orchestrator::Distributor;
use vaultkit_rewards::period::{now_unix, seconds_until_next_period};

use crate::config::DistributorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config_path = std::env::args_os()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(config::config_path);
    let config = DistributorConfig::load(&config_path)?;

    // 2. Initialize tracing
    init_tracing(&config.logging.log_level)?;
    info!(
        config = %config_path.display(),
        vaults = config.vaults.len(),
        "vaultkit distributor starting"
    );

    // 3. Ledger gateway
    let socket_path = config.socket_path();
    info!(socket = %socket_path.display(), "connecting to ledger gateway");
    let gateway = GatewayProvider::connect(socket_path)
        .await
        .context("connecting to ledger gateway")?;

    // 4. Governor session and submission tracker
    let session = Session::new(config.governor.address, config.governor.label.clone());
    let tracker = ConfirmationTracker::new(config.retry.clone())?;

    // 5. Run one pass
    let distributor = Distributor::new(
        &gateway,
        &gateway,
        &session,
        &tracker,
        config.reward_config(),
    )?;
    let now = now_unix();
    let report = distributor.run(&config.targets(), now).await?;

    for vault in &report.vaults {
        info!(
            vault = %vault.vault,
            recipients = vault.recipients,
            distributed = %vault.distributed,
            remainder = %vault.remainder,
            funding_tx = %vault.funding_tx,
            "vault done"
        );
    }
    info!(
        period = report.period,
        next_in_secs = seconds_until_next_period(now, config.rewards.period_secs),
        "distributor finished"
    );
    Ok(())
}

/// `RUST_LOG` wins; otherwise vaultkit crates log at the configured level.
fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new("warn").add_directive(
            format!("vaultkit={log_level}")
                .parse()
                .context("invalid logging.log_level")?,
        ),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
