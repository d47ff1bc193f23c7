//! Contract number allocation.
//!
//! Numbers come from the store's per-period counter, incremented in a single
//! atomic operation. A number handed out for a creation that later fails is
//! abandoned: the sequence may have gaps but never repeats.

use crate::{
  Error, Result,
  number::{ContractNumber, YearMonth},
  store::ContractStore,
};

pub struct IdentifierSequencer<'a, S> {
  store:  &'a S,
  prefix: &'a str,
}

impl<'a, S: ContractStore> IdentifierSequencer<'a, S> {
  pub fn new(store: &'a S, prefix: &'a str) -> Self { Self { store, prefix } }

  /// Allocate the next number for `period`.
  ///
  /// Fails with [`Error::SequencerUnavailable`] if the counter cannot be
  /// incremented; no number is ever made up locally.
  pub async fn next(&self, period: YearMonth) -> Result<ContractNumber> {
    let sequence = self
      .store
      .next_sequence(period)
      .await
      .map_err(|e| Error::SequencerUnavailable(Box::new(e)))?;
    ContractNumber::new(self.prefix, period, sequence)
  }
}
