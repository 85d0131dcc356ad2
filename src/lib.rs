//! # Inventory Movement Builder
//!
//! A library for fabricating dated inventory movements whose cumulative value
//! reconciles precomputed monthly opening and closing inventory values.
//!
//! ## Core Concepts
//!
//! - **Period Records**: One opening/closing value pair per month, chained so that a
//!   month's closing is the next month's opening (December carries into January)
//! - **Resolver**: Spreads a year's value change over January to November with a
//!   monthly weight profile; December's closing is the reference value
//! - **Movement Engine**: Generates per-item entries and exits on business days,
//!   never letting stock go negative, then settles the residual gap so the
//!   realized closing lands on the target
//! - **Coherence Corrector**: Re-derives each month from its stored rows and
//!   repairs openings, sentinel rows and neighbouring months
//!
//! ## Example
//!
//! ```rust,ignore
//! use inventory_movement_builder::*;
//!
//! let mut store = MemoryStore::with_catalog(vec![CatalogRow {
//!     code: "P-100".to_string(),
//!     description: Some("STEEL BOLT".to_string()),
//!     purchase_cost: Some(12.5),
//!     stock: Some(40),
//!     ..CatalogRow::default()
//! }]);
//! store.insert_period(PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 1_120_797.03));
//!
//! let mut builder = InventoryMovementBuilder::new(store, GeneratorConfig::default())?;
//! let report = builder.generate_year(2024, None, Some(1_892_903.00))?;
//! assert!(report.all_succeeded());
//! ```

pub mod balancer;
pub mod coherence;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod planner;
pub mod pricing;
pub mod resolver;
pub mod schema;
pub mod seasonality;
pub mod store;
pub mod utils;

pub use balancer::{enforce_non_negative, settlement_slices, ClosingBalancer, Settlement, SweepCorrection};
pub use coherence::{ensure_non_negative, CoherenceCorrector, ReconcileReport};
pub use config::*;
pub use engine::{
    distribute_value, ending_stock, select_items, GenerationReport, MovementGenerator, PeriodBatch,
    PeriodInputs,
};
pub use error::{InventoryMovementError, Result};
pub use ingestion::items_from_catalog;
pub use planner::{clamp_exit, DayAction, StockLedger};
pub use resolver::{distribute_annual_delta, PeriodChain, PeriodResolver};
pub use schema::*;
pub use seasonality::{get_profile_weights, MonthlyProfile};
pub use store::{Datastore, MemoryStore, ReconciliationWrite, SqliteStore};
pub use utils::*;

use log::{error, info};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PeriodOutcome {
    Generated(GenerationReport),
    Failed { period: PeriodKey, error: String },
}

impl PeriodOutcome {
    pub fn period(&self) -> PeriodKey {
        match self {
            PeriodOutcome::Generated(report) => report.period,
            PeriodOutcome::Failed { period, .. } => *period,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PeriodOutcome::Generated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearReport {
    pub year: i32,
    pub chain: PeriodChain,
    pub outcomes: Vec<PeriodOutcome>,
    pub reconciliation: Vec<ReconcileReport>,
}

impl YearReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(PeriodOutcome::is_success)
    }

    pub fn failed_periods(&self) -> Vec<PeriodKey> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_success())
            .map(PeriodOutcome::period)
            .collect()
    }
}

/// Sequences resolution, generation and reconciliation against one store.
pub struct InventoryMovementBuilder<S: Datastore> {
    store: S,
    config: GeneratorConfig,
}

impl<S: Datastore> InventoryMovementBuilder<S> {
    pub fn new(store: S, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn resolve_year(
        &mut self,
        year: i32,
        opening: Option<f64>,
        closing: Option<f64>,
    ) -> Result<PeriodChain> {
        PeriodResolver::new(&self.config.resolver).resolve(&mut self.store, year, opening, closing)
    }

    /// Gathers the engine inputs for `key` from the store.
    pub fn prepare_period(&self, key: PeriodKey) -> Result<PeriodInputs> {
        let record = self
            .store
            .load_period(key)?
            .ok_or(InventoryMovementError::MissingPeriod(key))?;
        let items = items_from_catalog(&self.store.load_catalog()?, &self.config.pricing);
        let prior_stock = ending_stock(&self.store.load_summary(key.prev())?);

        Ok(PeriodInputs {
            period: key,
            opening_value: record.opening,
            target_closing: record.closing,
            business_days: business_days(
                key.year,
                key.month,
                self.config.calendar.rest_day.weekday(),
            ),
            items,
            prior_stock,
        })
    }

    pub fn generate_period(&mut self, key: PeriodKey) -> Result<GenerationReport> {
        self.generate_period_with_rng(key, &mut thread_rng())
    }

    /// Generates `key` and replaces its stored rows. Nothing is written when
    /// generation fails.
    pub fn generate_period_with_rng<R: Rng + ?Sized>(
        &mut self,
        key: PeriodKey,
        rng: &mut R,
    ) -> Result<GenerationReport> {
        let inputs = self.prepare_period(key)?;
        let batch = MovementGenerator::new(&self.config).generate(&inputs, rng)?;
        self.store
            .replace_period_movements(key, &batch.movements, &batch.summary)?;
        Ok(batch.report)
    }

    /// Generates one period, logging any failure.
    pub fn run_period(&mut self, key: PeriodKey) -> bool {
        match self.generate_period(key) {
            Ok(_) => true,
            Err(e) => {
                error!("Generation failed for {}: {}", key, e);
                false
            }
        }
    }

    pub fn reconcile_period(&mut self, key: PeriodKey) -> Result<ReconcileReport> {
        CoherenceCorrector::new(&self.config).reconcile_period(&mut self.store, key)
    }

    /// One reconciliation pass over `year`, logging any failure.
    pub fn reconcile_year(&mut self, year: i32) -> bool {
        match CoherenceCorrector::new(&self.config).reconcile_year(&mut self.store, year) {
            Ok(reports) => {
                let changed = reports.iter().filter(|r| r.changed()).count();
                info!("Reconciled {}: {} of {} periods changed", year, changed, reports.len());
                true
            }
            Err(e) => {
                error!("Reconciliation failed for {}: {}", year, e);
                false
            }
        }
    }

    pub fn generate_year(
        &mut self,
        year: i32,
        opening: Option<f64>,
        closing: Option<f64>,
    ) -> Result<YearReport> {
        self.generate_year_with_rng(year, opening, closing, &mut thread_rng())
    }

    /// Resolves the year, generates every month best effort, then runs one
    /// reconciliation pass over the months that were generated.
    pub fn generate_year_with_rng<R: Rng + ?Sized>(
        &mut self,
        year: i32,
        opening: Option<f64>,
        closing: Option<f64>,
        rng: &mut R,
    ) -> Result<YearReport> {
        let chain = self.resolve_year(year, opening, closing)?;

        let mut outcomes = Vec::with_capacity(12);
        for key in PeriodKey::months_of(year) {
            match self.generate_period_with_rng(key, rng) {
                Ok(report) => outcomes.push(PeriodOutcome::Generated(report)),
                Err(e) => {
                    error!("Generation failed for {}: {}", key, e);
                    outcomes.push(PeriodOutcome::Failed {
                        period: key,
                        error: e.to_string(),
                    });
                }
            }
        }

        let reconciliation =
            CoherenceCorrector::new(&self.config).reconcile_year(&mut self.store, year)?;

        let report = YearReport {
            year,
            chain,
            outcomes,
            reconciliation,
        };
        info!(
            "Generated {}: {} of 12 periods succeeded",
            year,
            12 - report.failed_periods().len()
        );
        Ok(report)
    }
}
