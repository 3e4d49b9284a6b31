//! Discover command implementation

use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::output::{format_devices, print_info};
use sofia_client::Discovery;
use sofia_core::config::DiscoveryConfig;

/// Listen for announcements for `seconds`, then print every device heard
pub async fn discover_command(config: DiscoveryConfig, seconds: u64) -> Result<()> {
    let bind_address = config.bind_address.clone();
    let discovery = Discovery::bind(config)
        .await
        .with_context(|| format!("Failed to bind discovery socket on {}", bind_address))?;

    print_info(&format!(
        "Listening on {} for {}s...",
        discovery.local_addr()?,
        seconds
    ));

    let cancel = CancellationToken::new();
    let (mut events, task) = discovery.spawn(cancel.clone());
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            Some(device) = events.recv() => {
                tracing::info!(
                    "Announcement from {} ({})",
                    device.source,
                    device.host_name().unwrap_or("unnamed")
                );
            }
        }
    }

    cancel.cancel();
    if let Err(e) = task.await {
        tracing::warn!("Discovery task ended abnormally: {}", e);
    }

    println!("{}", format_devices(&discovery.devices()));
    Ok(())
}
