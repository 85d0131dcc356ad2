use super::{Datastore, ReconciliationWrite};
use crate::error::Result;
use crate::schema::{
    CatalogRow, Movement, MovementKind, PeriodKey, PeriodRecord, RollupRow, SummaryRow,
    OPENING_BALANCE_CODE,
};
use std::collections::BTreeMap;

/// In-process store for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    periods: BTreeMap<PeriodKey, PeriodRecord>,
    catalog: Vec<CatalogRow>,
    movements: BTreeMap<PeriodKey, Vec<Movement>>,
    summary: BTreeMap<PeriodKey, Vec<SummaryRow>>,
    rollup: BTreeMap<PeriodKey, Vec<RollupRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Vec<CatalogRow>) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn set_catalog(&mut self, catalog: Vec<CatalogRow>) {
        self.catalog = catalog;
    }

    pub fn insert_period(&mut self, record: PeriodRecord) {
        self.periods.insert(record.key, record);
    }
}

impl Datastore for MemoryStore {
    fn load_period(&self, key: PeriodKey) -> Result<Option<PeriodRecord>> {
        Ok(self.periods.get(&key).cloned())
    }

    fn load_periods_for_year(&self, year: i32) -> Result<Vec<PeriodRecord>> {
        Ok(self
            .periods
            .values()
            .filter(|record| record.key.year == year)
            .cloned()
            .collect())
    }

    fn save_periods(&mut self, records: &[PeriodRecord]) -> Result<()> {
        for record in records {
            self.periods.insert(record.key, record.clone());
        }
        Ok(())
    }

    fn load_catalog(&self) -> Result<Vec<CatalogRow>> {
        Ok(self.catalog.clone())
    }

    fn replace_period_movements(
        &mut self,
        period: PeriodKey,
        movements: &[Movement],
        summary: &[SummaryRow],
    ) -> Result<()> {
        self.movements.insert(period, movements.to_vec());
        self.save_summary_rows(period, summary)
    }

    fn load_movements(&self, period: PeriodKey) -> Result<Vec<Movement>> {
        Ok(self.movements.get(&period).cloned().unwrap_or_default())
    }

    fn load_summary(&self, period: PeriodKey) -> Result<Vec<SummaryRow>> {
        Ok(self.summary.get(&period).cloned().unwrap_or_default())
    }

    fn save_summary_rows(&mut self, period: PeriodKey, rows: &[SummaryRow]) -> Result<()> {
        self.summary.insert(period, rows.to_vec());
        self.rollup
            .insert(period, rows.iter().map(RollupRow::from).collect());
        Ok(())
    }

    fn load_rollup(&self, period: PeriodKey) -> Result<Vec<RollupRow>> {
        Ok(self.rollup.get(&period).cloned().unwrap_or_default())
    }

    fn commit_reconciliation(&mut self, write: &ReconciliationWrite) -> Result<()> {
        self.save_periods(&write.periods)?;

        for &(period, cost) in &write.opening_costs {
            if let Some(rows) = self.summary.get_mut(&period) {
                for row in rows.iter_mut() {
                    if row.is_opening_balance() {
                        row.unit_cost = cost;
                    }
                    row.inventory_value = cost;
                }
            }
            if let Some(rows) = self.rollup.get_mut(&period) {
                for row in rows.iter_mut().filter(|row| row.code == OPENING_BALANCE_CODE) {
                    row.unit_cost = cost;
                }
            }
            if let Some(movements) = self.movements.get_mut(&period) {
                for movement in movements.iter_mut() {
                    if movement.kind == MovementKind::OpeningBalance {
                        movement.unit_cost = cost;
                    }
                    movement.inventory_value = cost;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periods_for_year_in_order() {
        let mut store = MemoryStore::new();
        for month in [3, 1, 2] {
            let key = PeriodKey::new(month, 2024).unwrap();
            store.insert_period(PeriodRecord::new(key, 0.0, 0.0));
        }
        store.insert_period(PeriodRecord::new(PeriodKey::new(1, 2025).unwrap(), 0.0, 0.0));

        let months: Vec<u32> = store
            .load_periods_for_year(2024)
            .unwrap()
            .iter()
            .map(|r| r.key.month)
            .collect();
        assert_eq!(months, vec![1, 2, 3]);
    }

    #[test]
    fn test_summary_rows_replace_rollup() {
        let mut store = MemoryStore::new();
        let key = PeriodKey::new(2, 2024).unwrap();
        let row = SummaryRow {
            period: key,
            code: "A1".to_string(),
            description: "A1".to_string(),
            unit_cost: 10.0,
            opening: 0,
            entries: 4,
            exits: 1,
            consumption: 0,
            withdrawals: 0,
            closing: 3,
            date: key.first_day(),
            inventory_value: 0.0,
        };
        store.save_summary_rows(key, &[row.clone(), row]).unwrap();
        store.save_summary_rows(key, &[]).unwrap();
        assert!(store.load_summary(key).unwrap().is_empty());
        assert!(store.load_rollup(key).unwrap().is_empty());
    }
}
