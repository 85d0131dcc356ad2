use crate::error::{InventoryMovementError, Result};
use crate::utils::{first_day_of_month, last_day_of_month, month_label};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved code carrying the period's opening monetary value.
pub const OPENING_BALANCE_CODE: &str = "0000000001";

/// Reserved code carrying generic value adjustments.
pub const ADJUSTMENT_CODE: &str = "0000000002";

pub const OPENING_BALANCE_DESCRIPTION: &str = "OPENING BALANCE CARRIED FROM PREVIOUS PERIOD";
pub const ADJUSTMENT_DESCRIPTION: &str = "CLOSING VALUE ADJUSTMENT";

pub fn is_reserved_code(code: &str) -> bool {
    code == OPENING_BALANCE_CODE || code == ADJUSTMENT_CODE
}

/// A calendar month of a given year. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(InventoryMovementError::InvalidPeriod { month, year });
        }
        Ok(Self { year, month })
    }

    /// Parses the `MM/YYYY` form used as the period column value.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || InventoryMovementError::InvalidPeriodFormat(value.to_string());
        let (month, year) = value.trim().split_once('/').ok_or_else(invalid)?;
        let month: u32 = month.trim().parse().map_err(|_| invalid())?;
        let year: i32 = year.trim().parse().map_err(|_| invalid())?;
        Self::new(month, year)
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn is_year_end(self) -> bool {
        self.month == 12
    }

    pub fn first_day(self) -> NaiveDate {
        first_day_of_month(self.year, self.month)
    }

    pub fn last_day(self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }

    /// Human readable label such as `MARCH 2024`.
    pub fn description(self) -> String {
        format!("{} {}", month_label(self.month), self.year)
    }

    /// All twelve periods of a year, January first.
    pub fn months_of(year: i32) -> impl Iterator<Item = PeriodKey> {
        (1..=12).map(move |month| PeriodKey { year, month })
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Period-level valuation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub key: PeriodKey,
    pub description: String,
    pub opening: f64,
    pub closing: f64,
    pub purchase_adjustment: f64,
    pub sales_adjustment: f64,
}

impl PeriodRecord {
    pub fn new(key: PeriodKey, opening: f64, closing: f64) -> Self {
        Self {
            key,
            description: key.description(),
            opening,
            closing,
            purchase_adjustment: 0.0,
            sales_adjustment: 0.0,
        }
    }
}

/// Raw catalog record as supplied by the inventory collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub code: String,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub purchase_cost: Option<f64>,
    pub sale_cost: Option<f64>,
    pub stock: Option<i64>,
}

/// A sanitized catalog item, read-only input to generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub code: String,
    pub description: String,
    pub purchase_cost: f64,
    pub sale_cost: f64,
    pub stock: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    OpeningBalance,
    /// Large entry forcing stock into items that start the month nearly empty.
    InitialStock,
    Entry,
    Exit,
    Combined,
    /// Small fallback entry when no other action applies.
    Replenish,
    Settlement,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::OpeningBalance => "opening_balance",
            MovementKind::InitialStock => "initial_stock",
            MovementKind::Entry => "entry",
            MovementKind::Exit => "exit",
            MovementKind::Combined => "combined",
            MovementKind::Replenish => "replenish",
            MovementKind::Settlement => "settlement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "opening_balance" => MovementKind::OpeningBalance,
            "initial_stock" => MovementKind::InitialStock,
            "entry" => MovementKind::Entry,
            "exit" => MovementKind::Exit,
            "combined" => MovementKind::Combined,
            "replenish" => MovementKind::Replenish,
            "settlement" => MovementKind::Settlement,
            _ => return None,
        })
    }
}

/// One dated detail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub period: PeriodKey,
    pub code: String,
    pub description: String,
    pub date: NaiveDate,
    pub kind: MovementKind,
    /// Stock before the movement.
    pub opening_qty: i64,
    pub entries: i64,
    pub exits: i64,
    pub consumption: i64,
    pub withdrawals: i64,
    /// Stock after the movement.
    pub closing_qty: i64,
    pub unit_cost: f64,
    /// Opening value of the period this movement belongs to.
    pub inventory_value: f64,
}

impl Movement {
    pub fn outflow(&self) -> i64 {
        self.exits + self.consumption + self.withdrawals
    }

    pub fn net_value(&self) -> f64 {
        self.unit_cost * (self.entries - self.outflow()) as f64
    }
}

/// Monthly summary row, one per (period, code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub period: PeriodKey,
    pub code: String,
    pub description: String,
    pub unit_cost: f64,
    pub opening: i64,
    pub entries: i64,
    pub exits: i64,
    pub consumption: i64,
    pub withdrawals: i64,
    pub closing: i64,
    pub date: NaiveDate,
    pub inventory_value: f64,
}

impl SummaryRow {
    pub fn outflow(&self) -> i64 {
        self.exits + self.consumption + self.withdrawals
    }

    /// `opening + entries - outflow`, before any clamping.
    pub fn expected_closing(&self) -> i64 {
        self.opening + self.entries - self.outflow()
    }

    pub fn net_value(&self) -> f64 {
        self.unit_cost * (self.entries - self.outflow()) as f64
    }

    pub fn is_opening_balance(&self) -> bool {
        self.code == OPENING_BALANCE_CODE
    }
}

/// Period rollup row: the summary row without the inventory snapshot column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupRow {
    pub period: PeriodKey,
    pub code: String,
    pub description: String,
    pub unit_cost: f64,
    pub opening: i64,
    pub entries: i64,
    pub exits: i64,
    pub consumption: i64,
    pub withdrawals: i64,
    pub date: NaiveDate,
}

impl From<&SummaryRow> for RollupRow {
    fn from(row: &SummaryRow) -> Self {
        Self {
            period: row.period,
            code: row.code.clone(),
            description: row.description.clone(),
            unit_cost: row.unit_cost,
            opening: row.opening,
            entries: row.entries,
            exits: row.exits,
            consumption: row.consumption,
            withdrawals: row.withdrawals,
            date: row.date,
        }
    }
}

/// Opening value of a period as carried by its sentinel row, if present.
pub fn opening_balance_value(rows: &[SummaryRow]) -> Option<f64> {
    rows.iter()
        .find(|row| row.is_opening_balance())
        .map(|row| row.unit_cost)
}

/// Closing value implied by a set of summary rows: the sentinel opening plus
/// the net value of every other row.
pub fn realized_closing(rows: &[SummaryRow]) -> f64 {
    let opening = opening_balance_value(rows).unwrap_or(0.0);
    let net: f64 = rows
        .iter()
        .filter(|row| !row.is_opening_balance())
        .map(|row| row.net_value())
        .sum();
    opening + net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_key_parse_and_display() {
        let key = PeriodKey::parse("03/2024").unwrap();
        assert_eq!(key, PeriodKey { year: 2024, month: 3 });
        assert_eq!(key.to_string(), "03/2024");
        assert_eq!(key.description(), "MARCH 2024");

        assert!(PeriodKey::parse("13/2024").is_err());
        assert!(PeriodKey::parse("2024-03").is_err());
    }

    #[test]
    fn test_period_key_crosses_year_boundary() {
        let dec = PeriodKey::new(12, 2023).unwrap();
        assert_eq!(dec.next(), PeriodKey::new(1, 2024).unwrap());
        assert_eq!(dec.next().prev(), dec);
        assert!(dec < dec.next());
    }

    #[test]
    fn test_realized_closing_ignores_sentinel_net() {
        let key = PeriodKey::new(5, 2024).unwrap();
        let date = key.first_day();
        let row = |code: &str, cost: f64, opening: i64, entries: i64, exits: i64| SummaryRow {
            period: key,
            code: code.to_string(),
            description: String::new(),
            unit_cost: cost,
            opening,
            entries,
            exits,
            consumption: 0,
            withdrawals: 0,
            closing: opening + entries - exits,
            date,
            inventory_value: 1000.0,
        };

        let rows = vec![
            row(OPENING_BALANCE_CODE, 1000.0, 1, 0, 0),
            row("A1", 10.0, 0, 30, 5),
            row(ADJUSTMENT_CODE, 12.5, 1, 0, 1),
        ];

        assert_eq!(opening_balance_value(&rows), Some(1000.0));
        assert!((realized_closing(&rows) - (1000.0 + 250.0 - 12.5)).abs() < 1e-9);
    }
}
