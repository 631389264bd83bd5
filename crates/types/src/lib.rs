//! Contains a common set of types used across all of the `evl` crates.
//!
//! This module implements a single location where these types are managed,
//! making them easy to reference and maintain.
pub mod address;
pub mod chain_id;
pub mod coin;
pub mod config;
pub mod fee_market;
pub mod proto;
pub mod public_key;
pub mod signer;
pub mod transaction;

pub use address::{AccAddress, AddressError};
pub use chain_id::{ChainId, ChainIdError};
pub use coin::{amount_of, parse_amount, CoinAmountError};
pub use config::*;
pub use fee_market::*;
pub use public_key::{PublicKey, PublicKeyError, SignatureError};
pub use transaction::*;

pub use alloy_primitives::{Address, B256, U256};
