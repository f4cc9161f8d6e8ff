//! Logical names of the peer services the fleet calls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A peer HTTP service reached through a
/// [`DependencyClient`](crate::application::resilience::DependencyClient).
///
/// Each peer gets its own breaker; failures on one never affect another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Peer {
    RiskEngine,
    MarketData,
    Signals,
    Workspace,
    Docs,
    ScrapeProxy,
}

impl Peer {
    pub const ALL: [Peer; 6] = [
        Peer::RiskEngine,
        Peer::MarketData,
        Peer::Signals,
        Peer::Workspace,
        Peer::Docs,
        Peer::ScrapeProxy,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RiskEngine => "risk-engine",
            Self::MarketData => "market-data",
            Self::Signals => "signals",
            Self::Workspace => "workspace",
            Self::Docs => "docs",
            Self::ScrapeProxy => "scrape-proxy",
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Peer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|peer| peer.name() == s)
            .ok_or_else(|| ConfigError::Unknown {
                kind: "peer",
                name: s.to_string(),
            })
    }
}
