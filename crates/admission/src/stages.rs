//! The concrete admission stages, registered by the pipeline in lane order.

pub mod cosmos_sigverify;
pub mod deduct_fee;
pub mod eth_basic;
pub mod eth_sigverify;
pub mod fee_checker;
pub mod nested_guard;
pub mod tx_size;

pub use cosmos_sigverify::{required_signers, CosmosSigVerify};
pub use deduct_fee::{fee_collector, DeductFee};
pub use eth_basic::EthBasic;
pub use eth_sigverify::EthSigVerify;
pub use fee_checker::{check_fee, FeeChecker, FeeInput, FeeOutcome};
pub use nested_guard::NestedMessageGuard;
pub use tx_size::TxSizeGas;

use evl_types::{DecodedTx, EthereumTx, Transaction};

use crate::error::AdmissionError;

/// Stages registered on one lane reject the other lane's transactions.
fn wrong_lane(stage: &'static str) -> AdmissionError {
    AdmissionError::unsupported_shape(format!("{stage} does not apply to this lane"))
}

fn cosmos_tx<'a>(tx: &'a Transaction, stage: &'static str) -> Result<&'a DecodedTx, AdmissionError> {
    match tx {
        Transaction::CosmosNative(decoded) => Ok(decoded),
        Transaction::EthereumFormatted(_) => Err(wrong_lane(stage)),
    }
}

fn ethereum_tx<'a>(tx: &'a Transaction, stage: &'static str) -> Result<&'a EthereumTx, AdmissionError> {
    match tx {
        Transaction::EthereumFormatted(eth) => Ok(eth),
        Transaction::CosmosNative(_) => Err(wrong_lane(stage)),
    }
}
