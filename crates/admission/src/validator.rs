//! Validator entry points.
//!
//! Mempool checks (`check`, `recheck`, `simulate`) share a read lock and
//! throw their writes away, so any number of them can run concurrently
//! against a consistent snapshot. Finalization takes the write lock and
//! commits the writes of every accepted transaction, one transaction at a
//! time in block order.

use evl_feemarket::{BaseFeeUpdate, FeeMarketError};
use evl_types::{Config, Transaction};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error};

use crate::{
    classifier::classify_bytes,
    context::ExecutionMode,
    error::StateCorruption,
    pipeline::{Pipeline, PipelineResult},
    state::{StateReader as _, StateWriter, TxScope},
};

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error(transparent)]
    FeeMarket(#[from] FeeMarketError),
    #[error(transparent)]
    StateCorruption(#[from] StateCorruption),
}

#[derive(Debug)]
pub struct Validator<S> {
    config: Config,
    pipeline: Pipeline,
    state: RwLock<S>,
}

impl<S: StateWriter> Validator<S> {
    pub fn new(config: Config, store: S) -> Self {
        let pipeline = Pipeline::new(&config);
        Self {
            config,
            pipeline,
            state: RwLock::new(store),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, S>, StateCorruption> {
        self.state
            .read()
            .map_err(|_| StateCorruption("state lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, S>, StateCorruption> {
        self.state
            .write()
            .map_err(|_| StateCorruption("state lock poisoned".to_owned()))
    }

    /// Read access to the committed state.
    pub fn with_state<T>(&self, f: impl FnOnce(&S) -> T) -> Result<T, StateCorruption> {
        Ok(f(&*self.read()?))
    }

    /// Opens the next block: recomputes the base fee from the gas the
    /// previous block used and advances the block height.
    ///
    /// Must be called before any transaction of the new block is finalized.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn advance_fee_market(&self, previous_block_gas_used: u64) -> Result<BaseFeeUpdate, ValidatorError> {
        let mut state = self.write()?;
        let height = state
            .block_height()
            .map_err(StateCorruption::from)?
            .checked_add(1)
            .ok_or_else(|| StateCorruption("block height exhausted".to_owned()))?;
        let mut fee_market = state.fee_market().map_err(StateCorruption::from)?;

        let update = evl_feemarket::advance(&mut fee_market, height, previous_block_gas_used)
            .inspect_err(|err| error!(height, error = %err, "base fee update failed"))?;

        state.set_fee_market(fee_market).map_err(StateCorruption::from)?;
        state.set_block_height(height).map_err(StateCorruption::from)?;
        Ok(update)
    }

    /// Runs the admission pipeline for one transaction.
    ///
    /// `Err` means state could not be trusted and processing must stop; a
    /// rejected transaction is an `Ok(PipelineResult::Rejected)`.
    pub fn admit(&self, tx: &Transaction, mode: ExecutionMode) -> Result<PipelineResult, StateCorruption> {
        if mode.commits() {
            let mut state = self.write()?;
            let height = state.block_height()?;
            let (result, changes) = {
                let mut scope = TxScope::new(&*state);
                let result = self.pipeline.run(tx, mode, height, &mut scope)?;
                (result, scope.into_changes())
            };
            if result.is_accepted() {
                state.apply(changes)?;
            }
            Ok(result)
        } else {
            let state = self.read()?;
            let height = state.block_height()?;
            let mut scope = TxScope::new(&*state);
            self.pipeline.run(tx, mode, height, &mut scope)
        }
    }

    /// Decodes, classifies and admits raw envelope bytes.
    pub fn admit_bytes(&self, bytes: &[u8], mode: ExecutionMode) -> Result<PipelineResult, StateCorruption> {
        match classify_bytes(bytes) {
            Ok(tx) => self.admit(&tx, mode),
            Err(err) => {
                debug!(%mode, error = %err, "transaction failed classification");
                Ok(PipelineResult::Rejected(err))
            }
        }
    }
}
