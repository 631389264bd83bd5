use eyre::ensure;
use std::{ops::Deref, sync::Arc};

pub mod consensus;
pub mod node;
pub use consensus::*;
pub use node::*;

/// Ergonomic and cheaply copyable Configuration that has the consensus and user-defined configs extracted out
#[derive(Debug, Clone)]
pub struct Config(Arc<CombinedConfigInner>);

impl Config {
    pub fn new(node_config: NodeConfig) -> Self {
        let consensus = node_config.consensus_config();
        Self(Arc::new(CombinedConfigInner {
            consensus,
            node_config,
        }))
    }

    // validate configuration invariants
    pub fn validate(&self) -> eyre::Result<()> {
        let consensus = &self.consensus;
        let params = &consensus.fee_market.params;

        // all three are divisors or multipliers of the base-fee update
        ensure!(
            params.target_gas_per_block > 0,
            "fee_market.params.target_gas_per_block must be > 0"
        );
        ensure!(
            params.max_change_denominator > 0,
            "fee_market.params.max_change_denominator must be > 0"
        );
        ensure!(
            params.elasticity_multiplier > 0,
            "fee_market.params.elasticity_multiplier must be > 0"
        );
        ensure!(
            params.no_base_fee || consensus.fee_market.base_fee >= params.min_base_fee,
            "genesis base fee ({}) is below min_base_fee ({})",
            consensus.fee_market.base_fee,
            params.min_base_fee
        );

        ensure!(
            !consensus.fee_denom.is_empty()
                && consensus
                    .fee_denom
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c)),
            "fee_denom ({:?}) must be a non-empty cosmos denom",
            consensus.fee_denom
        );
        ensure!(
            bech32::Hrp::parse(&consensus.bech32_prefix).is_ok(),
            "bech32_prefix ({:?}) is not a valid human readable part",
            consensus.bech32_prefix
        );

        let forks = &consensus.evm_forks;
        let ordered = [forks.eip155_block, forks.berlin_block, forks.london_block];
        ensure!(
            ordered
                .windows(2)
                .all(|pair| match (pair[0], pair[1]) {
                    (Some(earlier), Some(later)) => earlier <= later,
                    (None, Some(_)) => false,
                    _ => true,
                }),
            "evm forks must activate in order eip155 <= berlin <= london ({ordered:?})"
        );

        ensure!(
            consensus.ante.max_multisig_members > 0,
            "ante.max_multisig_members must be > 0"
        );

        Ok(())
    }
}

impl Deref for Config {
    type Target = CombinedConfigInner;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[derive(Debug)]
pub struct CombinedConfigInner {
    pub consensus: ConsensusConfig,
    pub node_config: NodeConfig,
}

pub mod serde_utils {
    /// 256-bit integers as decimal strings. Plain integers are accepted on
    /// input as well, toml cannot represent anything above `i64::MAX` as one.
    pub mod u256_decimal {
        use alloy_primitives::U256;
        use serde::{de, Deserializer, Serializer};
        use std::fmt;

        pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&value.to_string())
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(DecimalVisitor)
        }

        struct DecimalVisitor;

        impl de::Visitor<'_> for DecimalVisitor {
            type Value = U256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative decimal integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(U256::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(U256::from)
                    .map_err(|_| E::custom(format!("negative amount {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                crate::coin::parse_amount(v).map_err(E::custom)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use evl_testing_utils::temporary_directory;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // spellchecker:off
    const NODE_TOML: &str = r#"
        log_filter = "debug"
        genesis_height = 10

        [consensus]
        chain_id = "everlast_97-1"
        fee_denom = "aevl"
        bech32_prefix = "evl"
        min_gas_price = "20000000000"

        [consensus.fee_market]
        base_fee = "1000000000"

        [consensus.fee_market.params]
        target_gas_per_block = 15000000
        max_change_denominator = 8
        elasticity_multiplier = 2
        min_base_fee = 0
        enable_height = 5

        [consensus.evm_forks]
        eip155_block = 0
        berlin_block = 0
        london_block = 100

        [consensus.gas]
        tx_size_cost_per_byte = 10
        sig_verify_cost_secp256k1 = 21000
        sig_verify_cost_ed25519 = 590
        read_cost_flat = 1000
        write_cost_flat = 2000

        [consensus.ante]
        allowed_wrapper_messages = ["/cosmos.authz.v1beta1.MsgExec"]
        disabled_nested_messages = ["/ethermint.evm.v1.MsgEthereumTx"]
        allowed_extension_options = ["/ethermint.types.v1.ExtensionOptionDynamicFeeTx"]
        max_multisig_members = 7
    "#;
    // spellchecker:on

    #[test]
    fn test_deserialize_node_config_from_toml() {
        let config: NodeConfig = toml::from_str(NODE_TOML).expect("valid toml");

        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.genesis_height, 10);
        assert_eq!(config.consensus.chain_id.eip155(), 97);
        assert_eq!(
            config.consensus.min_gas_price,
            U256::from(20_000_000_000_u64)
        );
        assert_eq!(
            config.consensus.fee_market.base_fee,
            U256::from(1_000_000_000_u64)
        );
        assert_eq!(config.consensus.fee_market.params.enable_height, 5);
        assert_eq!(config.consensus.evm_forks.london_block, Some(100));
        Config::new(config).validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = format!("{NODE_TOML}\nunexpected = 1\n");
        assert!(toml::from_str::<NodeConfig>(&raw).is_err());
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = temporary_directory(None, false);
        let path = dir.path().join("config.toml");
        let config = NodeConfig::testing();
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        assert_eq!(NodeConfig::from_toml_file(&path).unwrap(), config);
        assert!(NodeConfig::from_toml_file(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn testing_config_is_valid() {
        Config::new(NodeConfig::testing()).validate().unwrap();
    }

    #[rstest]
    #[case::zero_target(|c: &mut ConsensusConfig| c.fee_market.params.target_gas_per_block = 0)]
    #[case::zero_denominator(|c: &mut ConsensusConfig| c.fee_market.params.max_change_denominator = 0)]
    #[case::zero_elasticity(|c: &mut ConsensusConfig| c.fee_market.params.elasticity_multiplier = 0)]
    #[case::base_fee_below_min(|c: &mut ConsensusConfig| c.fee_market.params.min_base_fee = U256::from(1_000_000_u64))]
    #[case::empty_denom(|c: &mut ConsensusConfig| c.fee_denom.clear())]
    #[case::bad_prefix(|c: &mut ConsensusConfig| c.bech32_prefix = "e vl".to_owned())]
    #[case::forks_out_of_order(|c: &mut ConsensusConfig| c.evm_forks.berlin_block = Some(50))]
    #[case::no_multisig_members(|c: &mut ConsensusConfig| c.ante.max_multisig_members = 0)]
    fn validate_rejects(#[case] mutate: fn(&mut ConsensusConfig)) {
        let mut node_config = NodeConfig::testing();
        mutate(&mut node_config.consensus);
        assert!(Config::new(node_config).validate().is_err());
    }
}
