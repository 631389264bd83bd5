use evl_types::{
    proto::{
        mode_info::Sum, Any, MsgExec, MsgSend, MsgSubmitProposal, SignDoc, SignerInfo, MSG_EXEC_TYPE_URL,
        MSG_SEND_TYPE_URL, MSG_SUBMIT_PROPOSAL_TYPE_URL, SIGN_MODE_DIRECT,
    },
    AccAddress, DecodedTx, GasConfig, PublicKey, PublicKeyError, Transaction,
};
use prost::Message as _;
use tracing::trace;

use super::cosmos_tx;
use crate::{
    context::{SignerBinding, ValidationContext},
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::{StateReader as _, TxScope},
};

/// Bech32 signer named by a top-level message.
fn message_signer(msg: &Any) -> Result<String, AdmissionError> {
    let malformed =
        |e: prost::DecodeError| AdmissionError::unsupported_shape(format!("malformed {}: {e}", msg.type_url));
    match msg.type_url.as_str() {
        MSG_SEND_TYPE_URL => MsgSend::decode(msg.value.as_slice())
            .map(|send| send.from_address)
            .map_err(malformed),
        MSG_EXEC_TYPE_URL => MsgExec::decode(msg.value.as_slice())
            .map(|exec| exec.grantee)
            .map_err(malformed),
        MSG_SUBMIT_PROPOSAL_TYPE_URL => MsgSubmitProposal::decode(msg.value.as_slice())
            .map(|proposal| proposal.proposer)
            .map_err(malformed),
        other => Err(AdmissionError::invalid_signer(format!(
            "no signer rule for message type {other}"
        ))),
    }
}

/// Accounts that must sign a Cosmos transaction: the signer of each message
/// in order, then a declared fee payer, each listed once.
pub fn required_signers(tx: &DecodedTx, bech32_prefix: &str) -> Result<Vec<AccAddress>, AdmissionError> {
    let mut signers = Vec::new();
    let mut require = |raw: &str, source: &str| -> Result<(), AdmissionError> {
        let address = AccAddress::from_bech32(raw, bech32_prefix)
            .map_err(|e| AdmissionError::invalid_signer(format!("signer of {source}: {e}")))?;
        if !signers.contains(&address) {
            signers.push(address);
        }
        Ok(())
    };

    for msg in &tx.body.messages {
        require(&message_signer(msg)?, &msg.type_url)?;
    }
    if let Some(payer) = tx.fee().map(|fee| fee.payer.as_str()).filter(|payer| !payer.is_empty()) {
        require(payer, "fee payment")?;
    }
    Ok(signers)
}

/// Verifies every Cosmos signer against its declared public key, then checks
/// and advances its account sequence.
///
/// Signer infos pair up with the required signers by position.
#[derive(Debug, Clone)]
pub struct CosmosSigVerify {
    chain_id: String,
    bech32_prefix: String,
    gas: GasConfig,
    max_multisig_members: u32,
}

impl CosmosSigVerify {
    pub fn new(
        chain_id: impl Into<String>,
        bech32_prefix: impl Into<String>,
        gas: GasConfig,
        max_multisig_members: u32,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            bech32_prefix: bech32_prefix.into(),
            gas,
            max_multisig_members,
        }
    }

    fn decode_public_key(&self, index: usize, info: &SignerInfo) -> Result<PublicKey, AdmissionError> {
        let any = info
            .public_key
            .as_ref()
            .ok_or_else(|| AdmissionError::invalid_signer(format!("signer {index} declares no public key")))?;
        let public_key = PublicKey::from_any(any).map_err(|e| match e {
            PublicKeyError::NestedMultisig | PublicKeyError::InvalidThreshold { .. } => {
                AdmissionError::invalid_signature(e)
            }
            PublicKeyError::UnsupportedType(_) | PublicKeyError::Malformed { .. } => {
                AdmissionError::invalid_signer(e)
            }
        })?;
        if let PublicKey::Multisig { members, .. } = &public_key {
            if members.len() > self.max_multisig_members as usize {
                return Err(AdmissionError::invalid_signature(format!(
                    "multisig has {} members, limit is {}",
                    members.len(),
                    self.max_multisig_members
                )));
            }
        }
        Ok(public_key)
    }

    fn single_key_cost(&self, key: &PublicKey) -> u64 {
        match key {
            PublicKey::EthSecp256k1(_) => self.gas.sig_verify_cost_secp256k1,
            PublicKey::Ed25519(_) => self.gas.sig_verify_cost_ed25519,
            PublicKey::Multisig { .. } => 0,
        }
    }

    /// Charges verification gas and, outside simulation, checks the signature.
    fn verify_signature(
        &self,
        public_key: &PublicKey,
        info: &SignerInfo,
        sign_bytes: &[u8],
        signature: &[u8],
        ctx: &mut ValidationContext,
    ) -> Result<(), AdmissionError> {
        let mode = info
            .mode_info
            .as_ref()
            .and_then(|mode| mode.sum.as_ref())
            .ok_or_else(|| AdmissionError::invalid_signature("signer declares no sign mode"))?;

        match (public_key, mode) {
            (PublicKey::Multisig { members, .. }, Sum::Multi(multi)) => {
                let bitarray = multi
                    .bitarray
                    .as_ref()
                    .ok_or_else(|| AdmissionError::invalid_signature("multisig without bitarray"))?;
                let cost = members
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| bitarray.get(*i))
                    .try_fold(0_u64, |acc, (_, member)| acc.checked_add(self.single_key_cost(member)))
                    .ok_or_else(|| AdmissionError::Overflow("multisig verification gas".to_owned()))?;
                ctx.consume_gas(cost, "multisig verification")?;
                if !ctx.mode.is_simulate() {
                    public_key
                        .verify_multisig(sign_bytes, signature, bitarray)
                        .map_err(AdmissionError::invalid_signature)?;
                }
            }
            (PublicKey::EthSecp256k1(_) | PublicKey::Ed25519(_), Sum::Single(single)) => {
                if single.mode != SIGN_MODE_DIRECT {
                    return Err(AdmissionError::invalid_signature(format!(
                        "unsupported sign mode {}",
                        single.mode
                    )));
                }
                ctx.consume_gas(self.single_key_cost(public_key), "signature verification")?;
                if !ctx.mode.is_simulate() {
                    public_key
                        .verify(sign_bytes, signature)
                        .map_err(AdmissionError::invalid_signature)?;
                }
            }
            _ => {
                return Err(AdmissionError::invalid_signature(
                    evl_types::SignatureError::ModeMismatch,
                ))
            }
        }
        Ok(())
    }

    fn verify_signer(
        &self,
        tx: &DecodedTx,
        index: usize,
        expected: &AccAddress,
        info: &SignerInfo,
        signature: &[u8],
        ctx: &mut ValidationContext,
        scope: &mut TxScope<'_>,
    ) -> Result<SignerBinding, StageError> {
        let public_key = self.decode_public_key(index, info)?;
        let address = public_key.address();
        if address != *expected {
            return Err(AdmissionError::invalid_signer(format!(
                "signer {index} is {address}, messages require {expected}"
            ))
            .into());
        }

        ctx.consume_gas(self.gas.read_cost_flat, "account read")?;
        let mut account = scope
            .account(&address)?
            .ok_or_else(|| AdmissionError::invalid_signer(format!("account {address} does not exist")))?;
        if account
            .public_key
            .as_ref()
            .is_some_and(|stored| *stored != public_key)
        {
            return Err(AdmissionError::invalid_signer(format!(
                "public key does not match account {address}"
            ))
            .into());
        }

        let sign_bytes = SignDoc {
            body_bytes: tx.body_bytes.clone(),
            auth_info_bytes: tx.auth_info_bytes.clone(),
            chain_id: self.chain_id.clone(),
            account_number: account.account_number,
        }
        .encode_to_vec();
        self.verify_signature(&public_key, info, &sign_bytes, signature, ctx)?;

        if info.sequence != account.sequence {
            return Err(AdmissionError::SequenceMismatch {
                address,
                expected: account.sequence,
                got: info.sequence,
            }
            .into());
        }
        account.sequence = account
            .sequence
            .checked_add(1)
            .ok_or_else(|| AdmissionError::Overflow(format!("sequence of {address}")))?;
        account.public_key.get_or_insert_with(|| public_key.clone());

        ctx.consume_gas(self.gas.write_cost_flat, "account write")?;
        trace!(signer = %address, sequence = account.sequence, "signer verified");
        scope.set_account(account);

        Ok(SignerBinding {
            address,
            public_key,
        })
    }
}

impl AdmissionStage for CosmosSigVerify {
    fn name(&self) -> &'static str {
        "cosmos_sig_verify"
    }

    fn process(
        &self,
        tx: &Transaction,
        mut ctx: ValidationContext,
        scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let decoded = cosmos_tx(tx, self.name())?;
        let signer_infos = &decoded.auth_info.signer_infos;
        if signer_infos.is_empty() {
            return Err(AdmissionError::invalid_signer("transaction has no signers").into());
        }
        if decoded.signatures.len() != signer_infos.len() {
            return Err(AdmissionError::invalid_signature(format!(
                "{} signatures for {} signers",
                decoded.signatures.len(),
                signer_infos.len()
            ))
            .into());
        }

        let required = required_signers(decoded, &self.bech32_prefix)?;
        if required.len() != signer_infos.len() {
            return Err(AdmissionError::invalid_signer(format!(
                "{} signers for {} required signers",
                signer_infos.len(),
                required.len()
            ))
            .into());
        }

        for (index, ((info, signature), expected)) in
            signer_infos.iter().zip(&decoded.signatures).zip(&required).enumerate()
        {
            let binding = self.verify_signer(decoded, index, expected, info, signature, &mut ctx, scope)?;
            ctx.signers.push(binding);
        }
        Ok(ctx)
    }
}
