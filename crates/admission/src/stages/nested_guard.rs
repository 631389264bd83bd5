use evl_types::{
    proto::{Any, MsgExec, MsgSubmitProposal, MSG_EXEC_TYPE_URL, MSG_SUBMIT_PROPOSAL_TYPE_URL},
    AnteConfig, Transaction,
};
use prost::Message as _;

use super::cosmos_tx;
use crate::{
    context::ValidationContext,
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::TxScope,
};

/// Rejects extension options that are not allow-listed and bounds message
/// nesting to one wrapper level.
#[derive(Debug, Clone)]
pub struct NestedMessageGuard {
    ante: AnteConfig,
}

/// Messages known to carry other messages.
fn inner_messages(msg: &Any) -> Option<Result<Vec<Any>, prost::DecodeError>> {
    match msg.type_url.as_str() {
        MSG_EXEC_TYPE_URL => Some(MsgExec::decode(msg.value.as_slice()).map(|exec| exec.msgs)),
        MSG_SUBMIT_PROPOSAL_TYPE_URL => Some(
            MsgSubmitProposal::decode(msg.value.as_slice()).map(|proposal| proposal.messages),
        ),
        _ => None,
    }
}

fn disallowed(type_url: &str, reason: impl Into<String>) -> AdmissionError {
    AdmissionError::DisallowedNestedMessage {
        type_url: type_url.to_owned(),
        reason: reason.into(),
    }
}

impl NestedMessageGuard {
    pub fn new(ante: AnteConfig) -> Self {
        Self { ante }
    }

    fn is_wrapper(&self, msg: &Any) -> bool {
        self.ante.is_wrapper(&msg.type_url) || inner_messages(msg).is_some()
    }

    fn check_message(&self, msg: &Any) -> Result<(), AdmissionError> {
        let Some(inner) = inner_messages(msg) else {
            if self.ante.is_wrapper(&msg.type_url) {
                return Err(disallowed(&msg.type_url, "wrapper contents cannot be inspected"));
            }
            return Ok(());
        };
        if !self.ante.is_wrapper(&msg.type_url) {
            return Err(disallowed(&msg.type_url, "wrapper type is not allowed"));
        }
        let inner = inner.map_err(|e| disallowed(&msg.type_url, format!("undecodable wrapper: {e}")))?;
        for nested in &inner {
            if self.is_wrapper(nested) {
                return Err(disallowed(
                    &nested.type_url,
                    format!("wrapper nested inside {}", msg.type_url),
                ));
            }
            if self.ante.is_disabled_nested(&nested.type_url) {
                return Err(disallowed(&nested.type_url, "message may not be nested"));
            }
        }
        Ok(())
    }
}

impl AdmissionStage for NestedMessageGuard {
    fn name(&self) -> &'static str {
        "nested_message_guard"
    }

    fn process(
        &self,
        tx: &Transaction,
        ctx: ValidationContext,
        _scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let body = &cosmos_tx(tx, self.name())?.body;
        if let Some(option) = body
            .extension_options
            .iter()
            .find(|option| !self.ante.is_allowed_extension(&option.type_url))
        {
            return Err(AdmissionError::UnsupportedExtensionOption(option.type_url.clone()).into());
        }
        for msg in &body.messages {
            self.check_message(msg)?;
        }
        Ok(ctx)
    }
}
