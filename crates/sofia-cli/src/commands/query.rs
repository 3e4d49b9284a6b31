//! Query command implementation

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::output::{format_json, print_warning};
use sofia_client::Session;
use sofia_core::config::DeviceConfig;

/// What to ask the device for
#[derive(Debug, Clone, Subcommand)]
pub enum QueryKind {
    /// Hardware and firmware information
    Sysinfo,
    /// Supported features
    Abilities,
    /// Vendor information
    Oem,
    /// Permissions of the logged-in user
    Authority,
    /// A configuration section
    Config {
        /// Section name, e.g. General.General
        name: String,
    },
}

/// Connect, log in, run one query and print the reply as JSON
pub async fn query_command(config: DeviceConfig, kind: QueryKind) -> Result<()> {
    let address = config.address();
    let (device, session) = sofia_client::connect_and_login(config)
        .await
        .with_context(|| format!("Could not open a session on {}", address))?;
    tracing::info!(
        "Logged in to {} as {} ({})",
        address,
        session.username(),
        session.session_id()
    );

    let result = run_query(&session, kind).await;
    if let Err(e) = session.logout().await {
        print_warning(&format!("Logout failed: {}", e));
    }
    device.disconnect().await;

    println!("{}", format_json(&result?));
    Ok(())
}

async fn run_query(session: &Session, kind: QueryKind) -> Result<serde_json::Value> {
    let value = match kind {
        QueryKind::Sysinfo => serde_json::to_value(session.system_info().await?)?,
        QueryKind::Abilities => serde_json::to_value(session.abilities().await?)?,
        QueryKind::Oem => serde_json::to_value(session.oem_info().await?)?,
        QueryKind::Authority => serde_json::to_value(session.authority_list().await?)?,
        QueryKind::Config { name } => serde_json::to_value(
            session
                .config(&name)
                .await
                .with_context(|| format!("Failed to read config section {}", name))?,
        )?,
    };
    Ok(value)
}
