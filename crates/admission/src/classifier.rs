//! Lane classification.
//!
//! An envelope whose only message is a `MsgEthereumTx` is routed to the
//! Ethereum lane; everything else is a Cosmos-native transaction. The two
//! kinds never mix: an Ethereum message next to any other message, or an
//! Ethereum envelope that also carries Cosmos signatures, is rejected before
//! any stage runs.

use evl_types::{
    proto::{MsgEthereumTx, MSG_ETHEREUM_TX_TYPE_URL},
    DecodedTx, EthereumTx, Transaction,
};
use prost::Message as _;

use crate::error::AdmissionError;

/// Decodes raw envelope bytes and classifies them.
pub fn classify_bytes(bytes: &[u8]) -> Result<Transaction, AdmissionError> {
    let decoded = DecodedTx::decode(bytes).map_err(AdmissionError::unsupported_shape)?;
    classify(decoded)
}

pub fn classify(tx: DecodedTx) -> Result<Transaction, AdmissionError> {
    let messages = &tx.body.messages;
    if messages.is_empty() {
        return Err(AdmissionError::unsupported_shape("transaction has no messages"));
    }
    if messages.iter().any(|msg| msg.type_url.is_empty()) {
        return Err(AdmissionError::unsupported_shape("message without a type url"));
    }

    let eth_messages = messages
        .iter()
        .filter(|msg| msg.type_url == MSG_ETHEREUM_TX_TYPE_URL)
        .count();
    match (eth_messages, messages.len()) {
        (0, _) => Ok(Transaction::CosmosNative(tx)),
        (1, 1) => classify_ethereum(tx),
        _ => Err(AdmissionError::unsupported_shape(format!(
            "{eth_messages} ethereum messages mixed into {} messages",
            messages.len()
        ))),
    }
}

fn classify_ethereum(tx: DecodedTx) -> Result<Transaction, AdmissionError> {
    if !tx.signatures.is_empty() || !tx.auth_info.signer_infos.is_empty() {
        return Err(AdmissionError::unsupported_shape(
            "ethereum transaction carries cosmos signatures",
        ));
    }
    let msg = MsgEthereumTx::decode(tx.body.messages[0].value.as_slice())
        .map_err(|e| AdmissionError::unsupported_shape(format!("MsgEthereumTx: {e}")))?;
    let eth = EthereumTx::from_envelope(tx, &msg).map_err(AdmissionError::unsupported_shape)?;
    Ok(Transaction::EthereumFormatted(eth))
}
