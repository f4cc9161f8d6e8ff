//! `bulwark check`: probe configured peers through their breakers.

use std::path::Path;

use futures_util::future::join_all;

use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::HttpPeer;
use crate::error::{Error, Result};

/// Probe each peer's health path once, with its configured retries.
pub async fn execute(config_path: &Path, peers: &[HttpPeer]) -> Result<()> {
    output::section("Peer Check");
    output::field("Config", config_path.display());

    if peers.is_empty() {
        output::warning("No peers configured");
        return Ok(());
    }

    let probes = peers.iter().map(|peer| async move { (peer, peer.health().await) });

    let mut failed = 0;
    for (peer, result) in join_all(probes).await {
        match result {
            Ok(status) => output::success(&format!(
                "{} {} ({status})",
                peer.name(),
                output::highlight(peer.base_url())
            )),
            Err(err) => {
                failed += 1;
                output::error(&format!("{} [{}] {err}", peer.name(), err.kind()));
                let breaker = peer.dependency().breaker().snapshot();
                output::note(&format!(
                    "breaker {} ({}/{} failures)",
                    breaker.state, breaker.failure_count, breaker.failure_threshold
                ));
            }
        }
    }

    if failed > 0 {
        return Err(Error::PeersUnhealthy {
            failed,
            total: peers.len(),
        });
    }
    output::success("All peers healthy");
    Ok(())
}
