//! Capability shared by every table flavour built on [`ObservationTable`].
//!
//! Transforms go through [`Stratified::rebuild`], so a wrapper type (for
//! example a population-observation table carrying bookkeeping) comes back
//! out of `filter`/`merge` as the same wrapper type.

use cf_core::Result;

use crate::filter::Condition;
use crate::join::MissingTuples;
use crate::table::ObservationTable;

/// A value backed by an [`ObservationTable`].
pub trait Stratified: Sized {
    /// The underlying table.
    fn table(&self) -> &ObservationTable;

    /// Wrap a transformed table in the same concrete type as `self`.
    fn rebuild(&self, table: ObservationTable) -> Self;

    /// See [`ObservationTable::filter`].
    fn filter(&self, conditions: &[Condition], keep_only: Option<&[&str]>) -> Result<Self> {
        Ok(self.rebuild(self.table().filter(conditions, keep_only)?))
    }

    /// See [`ObservationTable::merge`].
    fn merge<O: Stratified>(&self, other: &O, index: &[&str], keep_only: &[&str]) -> Result<Self> {
        Ok(self.rebuild(self.table().merge(other.table(), index, keep_only)?))
    }

    /// See [`ObservationTable::find_missing_tuples`].
    fn find_missing_tuples<O: Stratified>(
        &self,
        target: &O,
        value_column_base: &str,
        value_column_target: Option<&str>,
    ) -> Result<Option<MissingTuples>> {
        self.table().find_missing_tuples(target.table(), value_column_base, value_column_target)
    }

    /// See [`ObservationTable::verify_required_items`].
    fn verify_required_items(&self, needed: &[&str], available: Option<&[&str]>) -> Result<()> {
        self.table().verify_required_items(needed, available)
    }
}

impl Stratified for ObservationTable {
    fn table(&self) -> &ObservationTable {
        self
    }

    fn rebuild(&self, table: ObservationTable) -> Self {
        table
    }
}
