//! Persistence for period records, the catalog and generated rows.
//!
//! Generation and reconciliation only talk to a [`Datastore`]. Every write
//! method is atomic for the rows it touches.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::schema::{CatalogRow, Movement, PeriodKey, PeriodRecord, RollupRow, SummaryRow};

/// Fixes produced by one reconciliation, committed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationWrite {
    pub periods: Vec<PeriodRecord>,
    /// New opening value per period, applied to its opening-balance rows and
    /// to the inventory snapshot column of all its rows.
    pub opening_costs: Vec<(PeriodKey, f64)>,
}

impl ReconciliationWrite {
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() && self.opening_costs.is_empty()
    }
}

pub trait Datastore {
    fn load_period(&self, key: PeriodKey) -> Result<Option<PeriodRecord>>;

    /// Records of `year` that exist, January first.
    fn load_periods_for_year(&self, year: i32) -> Result<Vec<PeriodRecord>>;

    /// Inserts or replaces every record in one write.
    fn save_periods(&mut self, records: &[PeriodRecord]) -> Result<()>;

    fn load_catalog(&self) -> Result<Vec<CatalogRow>>;

    /// Replaces the detail, summary and rollup rows of `period`.
    fn replace_period_movements(
        &mut self,
        period: PeriodKey,
        movements: &[Movement],
        summary: &[SummaryRow],
    ) -> Result<()>;

    fn load_movements(&self, period: PeriodKey) -> Result<Vec<Movement>>;

    fn load_summary(&self, period: PeriodKey) -> Result<Vec<SummaryRow>>;

    /// Replaces the summary and rollup rows of `period`, leaving details alone.
    fn save_summary_rows(&mut self, period: PeriodKey, rows: &[SummaryRow]) -> Result<()>;

    fn load_rollup(&self, period: PeriodKey) -> Result<Vec<RollupRow>>;

    fn commit_reconciliation(&mut self, write: &ReconciliationWrite) -> Result<()>;
}
