use evl_types::Transaction;
use std::fmt::Debug;

use crate::{context::ValidationContext, error::StageError, state::TxScope};

/// One step of the admission pipeline.
///
/// A stage receives the context produced by the previous stage and returns
/// it, possibly extended. Any error aborts the transaction; stages after it
/// never run.
pub trait AdmissionStage: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Stages that move funds are skipped in simulate mode.
    fn writes_state(&self) -> bool {
        false
    }

    fn process(
        &self,
        tx: &Transaction,
        ctx: ValidationContext,
        scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError>;
}
