use crate::config::ResolverConfig;
use crate::error::{InventoryMovementError, Result};
use crate::schema::{PeriodKey, PeriodRecord};
use crate::seasonality::{get_profile_weights, profile_for_year, MonthlyProfile, WEIGHTED_MONTHS};
use crate::store::Datastore;
use crate::utils::round2;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Twelve resolved records of one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodChain {
    pub year: i32,
    pub profile: MonthlyProfile,
    pub records: Vec<PeriodRecord>,
}

impl PeriodChain {
    pub fn opening(&self) -> f64 {
        self.records.first().map(|r| r.opening).unwrap_or(0.0)
    }

    pub fn closing(&self) -> f64 {
        self.records.last().map(|r| r.closing).unwrap_or(0.0)
    }

    pub fn record(&self, month: u32) -> Option<&PeriodRecord> {
        self.records.iter().find(|r| r.key.month == month)
    }
}

pub struct PeriodResolver<'a> {
    config: &'a ResolverConfig,
}

impl<'a> PeriodResolver<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    /// Computes and stores the opening and closing of every month of `year`.
    ///
    /// January's opening is `opening`, else the previous December's closing
    /// when January does not exist yet, else the stored January opening.
    /// December's closing is `closing`, else the stored December closing.
    pub fn resolve<S: Datastore + ?Sized>(
        &self,
        store: &mut S,
        year: i32,
        opening: Option<f64>,
        closing: Option<f64>,
    ) -> Result<PeriodChain> {
        let existing: BTreeMap<PeriodKey, PeriodRecord> = store
            .load_periods_for_year(year)?
            .into_iter()
            .map(|record| (record.key, record))
            .collect();

        let january = PeriodKey::new(1, year)?;
        let december = PeriodKey::new(12, year)?;

        let opening = match opening {
            Some(value) => value,
            None => match existing.get(&january) {
                Some(record) => record.opening,
                None => {
                    let previous = january.prev();
                    store
                        .load_period(previous)?
                        .map(|record| record.closing)
                        .ok_or(InventoryMovementError::MissingPeriod(previous))?
                }
            },
        };
        let closing = match closing {
            Some(value) => value,
            None => existing
                .get(&december)
                .map(|record| record.closing)
                .ok_or(InventoryMovementError::MissingPeriod(december))?,
        };

        let opening = round2(opening.max(0.0));
        let closing = round2(closing.max(0.0));
        let profile = profile_for_year(self.config, year, closing - opening);
        let weights = get_profile_weights(&profile)?;
        let values = distribute_annual_delta(opening, closing, &weights, self.config.year_end_share);

        let mut records: Vec<PeriodRecord> = PeriodKey::months_of(year)
            .zip(values)
            .map(|(key, (month_opening, month_closing))| {
                let mut record = existing
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| PeriodRecord::new(key, 0.0, 0.0));
                if record.description.trim().is_empty() {
                    record.description = key.description();
                }
                record.opening = month_opening;
                record.closing = month_closing;
                record
            })
            .collect();

        let chain = PeriodChain {
            year,
            profile,
            records: records.clone(),
        };

        let next_january = december.next();
        if let Some(mut next) = store.load_period(next_january)? {
            debug!("Carrying {:.2} into {}", closing, next_january);
            next.opening = closing;
            records.push(next);
        }

        store.save_periods(&records)?;

        info!(
            "Resolved {}: opening {:.2}, closing {:.2}, profile {:?}",
            year, opening, closing, chain.profile
        );

        Ok(chain)
    }
}

/// Opening and closing per month, January to December.
///
/// January to November absorb `1 - year_end_share` of the annual delta by
/// weight, each month opening at the previous closing. December opens at
/// November's closing and closes at `closing`.
pub fn distribute_annual_delta(
    opening: f64,
    closing: f64,
    weights: &[f64],
    year_end_share: f64,
) -> Vec<(f64, f64)> {
    let distributed = (closing - opening) * (1.0 - year_end_share);
    let mut values = Vec::with_capacity(12);
    let mut running = opening;
    let mut month_opening = opening;

    for month in 0..WEIGHTED_MONTHS {
        running += distributed * weights.get(month).copied().unwrap_or(0.0);
        let month_closing = round2(running);
        values.push((month_opening, month_closing));
        month_opening = month_closing;
    }
    values.push((month_opening, closing));

    values
}
