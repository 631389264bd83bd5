use eyre::WrapErr as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConsensusConfig;

/// # Node Configuration
///
/// Consensus parameters plus the settings that are local to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Tracing filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Height of the block the fee market state is loaded at
    #[serde(default)]
    pub genesis_height: u64,

    pub consensus: ConsensusConfig,
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl NodeConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).wrap_err_with(|| format!("parsing config file {}", path.display()))
    }

    pub fn consensus_config(&self) -> ConsensusConfig {
        self.consensus.clone()
    }

    pub fn testing() -> Self {
        Self {
            log_filter: default_log_filter(),
            genesis_height: 0,
            consensus: ConsensusConfig::testing(),
        }
    }
}
