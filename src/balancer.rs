use crate::config::SettlementConfig;
use crate::error::{InventoryMovementError, Result};
use crate::schema::{
    opening_balance_value, realized_closing, Movement, MovementKind, PeriodKey, SummaryRow,
    ADJUSTMENT_CODE, ADJUSTMENT_DESCRIPTION,
};
use crate::utils::round2;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// One summary row raised or capped by the non-negativity sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCorrection {
    pub period: PeriodKey,
    pub code: String,
    pub entries_before: i64,
    pub entries_after: i64,
    pub exits_before: i64,
    pub exits_after: i64,
    pub closing_before: i64,
    pub closing_after: i64,
}

/// Gap closed by the settlement movements of a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub gap: f64,
    pub movements: Vec<Movement>,
}

pub struct ClosingBalancer<'a> {
    config: &'a SettlementConfig,
}

impl<'a> ClosingBalancer<'a> {
    pub fn new(config: &'a SettlementConfig) -> Self {
        Self { config }
    }

    /// Appends settlement movements and their aggregated adjustment row when
    /// the realized closing of `rows` is off target by more than the tolerance.
    pub fn settle(
        &self,
        period: PeriodKey,
        target: f64,
        day: NaiveDate,
        rows: &mut Vec<SummaryRow>,
    ) -> Option<Settlement> {
        let realized = realized_closing(rows);
        let gap = round2(target - realized);
        if gap.abs() <= self.config.tolerance {
            return None;
        }

        let inventory_value = opening_balance_value(rows).unwrap_or(0.0);
        let magnitude = gap.abs();
        let incoming = gap > 0.0;

        let slices: Vec<f64> = settlement_slices(magnitude, self.config.slices)
            .into_iter()
            .filter(|slice| *slice > 0.0)
            .collect();
        let count = slices.len() as i64;
        if count == 0 {
            return None;
        }

        // Quantities run 0..n for entries and n..0 for exits.
        let movements: Vec<Movement> = slices
            .iter()
            .zip(0i64..)
            .map(|(&slice, step)| {
                let (opening_qty, entries, exits, closing_qty) = if incoming {
                    (step, 1, 0, step + 1)
                } else {
                    (count - step, 0, 1, count - step - 1)
                };
                Movement {
                    period,
                    code: ADJUSTMENT_CODE.to_string(),
                    description: ADJUSTMENT_DESCRIPTION.to_string(),
                    date: day,
                    kind: MovementKind::Settlement,
                    opening_qty,
                    entries,
                    exits,
                    consumption: 0,
                    withdrawals: 0,
                    closing_qty,
                    unit_cost: slice,
                    inventory_value,
                }
            })
            .collect();

        let (opening, entries, exits, closing) = if incoming {
            (0, count, 0, count)
        } else {
            (count, 0, count, 0)
        };
        rows.push(SummaryRow {
            period,
            code: ADJUSTMENT_CODE.to_string(),
            description: ADJUSTMENT_DESCRIPTION.to_string(),
            unit_cost: magnitude / count as f64,
            opening,
            entries,
            exits,
            consumption: 0,
            withdrawals: 0,
            closing,
            date: day,
            inventory_value,
        });

        debug!(
            "Settled {} with {} movements (gap {:.2}, realized {:.2})",
            period,
            movements.len(),
            gap,
            realized
        );

        Some(Settlement { gap, movements })
    }

    /// Checks `realized == target` within tolerance and returns the realized value.
    pub fn verify_closing_identity(
        &self,
        period: PeriodKey,
        rows: &[SummaryRow],
        target: f64,
    ) -> Result<f64> {
        let realized = realized_closing(rows);
        if (realized - target).abs() > self.config.tolerance {
            return Err(InventoryMovementError::ClosingMismatch {
                period,
                target,
                realized,
            });
        }
        Ok(realized)
    }
}

/// Splits `total` into `slices` cent-rounded parts; the last part absorbs the
/// rounding remainder so the parts add up to `round2(total)`.
pub fn settlement_slices(total: f64, slices: usize) -> Vec<f64> {
    if slices == 0 {
        return Vec::new();
    }
    let total = round2(total);
    let slice = round2(total / slices as f64);
    let mut parts = vec![slice; slices - 1];
    parts.push(round2(total - slice * (slices - 1) as f64));
    parts
}

/// Raises entries, then caps exits, on rows whose outflow exceeds what was
/// available, and floors closing at zero.
pub fn enforce_non_negative(rows: &mut [SummaryRow], margin: i64) -> Vec<SweepCorrection> {
    let mut corrections = Vec::new();

    for row in rows.iter_mut() {
        let outflow = row.outflow();
        if row.closing >= 0 && row.opening + row.entries >= outflow {
            continue;
        }

        let entries_before = row.entries;
        let exits_before = row.exits;
        let closing_before = row.closing;

        if row.opening + row.entries < outflow {
            row.entries = outflow - row.opening + margin;
        }
        row.closing = row.expected_closing();

        if row.closing < 0 {
            row.exits = (row.opening + row.entries - row.consumption - row.withdrawals).max(0);
            row.closing = row.expected_closing();
        }
        row.closing = row.closing.max(0);

        warn!(
            "Non-negative sweep on {} {}: entries {} -> {}, exits {} -> {}, closing {} -> {}",
            row.period,
            row.code,
            entries_before,
            row.entries,
            exits_before,
            row.exits,
            closing_before,
            row.closing
        );

        corrections.push(SweepCorrection {
            period: row.period,
            code: row.code.clone(),
            entries_before,
            entries_after: row.entries,
            exits_before,
            exits_after: row.exits,
            closing_before,
            closing_after: row.closing,
        });
    }

    corrections
}
