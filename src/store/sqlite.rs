use super::{Datastore, ReconciliationWrite};
use crate::error::Result;
use crate::schema::{
    CatalogRow, Movement, MovementKind, PeriodKey, PeriodRecord, RollupRow, SummaryRow,
    OPENING_BALANCE_CODE,
};
use log::debug;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Store backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL only applies to real files.
        if let Err(e) = conn.execute_batch("PRAGMA journal_mode=WAL;") {
            debug!("WAL journal mode unavailable: {}", e);
        }
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_inventory.sql"))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert_catalog(&mut self, rows: &[CatalogRow]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO inventory_catalog
                    (code, category, kind, description, brand, purchase_cost, sale_cost, stock)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.code,
                    row.category,
                    row.kind,
                    row.description,
                    row.brand,
                    row.purchase_cost,
                    row.sale_cost,
                    row.stock,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl ToSql for MovementKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MovementKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        MovementKind::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown movement kind '{}'", text).into()))
    }
}

fn upsert_period(conn: &Connection, record: &PeriodRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO inventory_periods
            (year, month, description, opening, closing, purchase_adjustment, sales_adjustment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (year, month) DO UPDATE SET
            description = excluded.description,
            opening = excluded.opening,
            closing = excluded.closing,
            purchase_adjustment = excluded.purchase_adjustment,
            sales_adjustment = excluded.sales_adjustment",
        params![
            record.key.year,
            record.key.month,
            record.description,
            record.opening,
            record.closing,
            record.purchase_adjustment,
            record.sales_adjustment,
        ],
    )?;
    Ok(())
}

fn write_summary(conn: &Connection, period: PeriodKey, rows: &[SummaryRow]) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM monthly_summary WHERE year = ?1 AND month = ?2",
        params![period.year, period.month],
    )?;
    conn.execute(
        "DELETE FROM period_rollup WHERE year = ?1 AND month = ?2",
        params![period.year, period.month],
    )?;

    let mut summary = conn.prepare(
        "INSERT INTO monthly_summary
            (year, month, code, description, unit_cost, opening, entries, exits,
             consumption, withdrawals, closing, last_date, inventory_value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    let mut rollup = conn.prepare(
        "INSERT INTO period_rollup
            (year, month, code, description, unit_cost, opening, entries, exits,
             consumption, withdrawals, last_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for row in rows {
        summary.execute(params![
            period.year,
            period.month,
            row.code,
            row.description,
            row.unit_cost,
            row.opening,
            row.entries,
            row.exits,
            row.consumption,
            row.withdrawals,
            row.closing,
            row.date,
            row.inventory_value,
        ])?;
        rollup.execute(params![
            period.year,
            period.month,
            row.code,
            row.description,
            row.unit_cost,
            row.opening,
            row.entries,
            row.exits,
            row.consumption,
            row.withdrawals,
            row.date,
        ])?;
    }
    Ok(())
}

fn period_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeriodRecord> {
    Ok(PeriodRecord {
        key: PeriodKey {
            year: row.get(0)?,
            month: row.get(1)?,
        },
        description: row.get(2)?,
        opening: row.get(3)?,
        closing: row.get(4)?,
        purchase_adjustment: row.get(5)?,
        sales_adjustment: row.get(6)?,
    })
}

impl Datastore for SqliteStore {
    fn load_period(&self, key: PeriodKey) -> Result<Option<PeriodRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT year, month, description, opening, closing, purchase_adjustment, sales_adjustment
                 FROM inventory_periods WHERE year = ?1 AND month = ?2",
                params![key.year, key.month],
                period_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn load_periods_for_year(&self, year: i32) -> Result<Vec<PeriodRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT year, month, description, opening, closing, purchase_adjustment, sales_adjustment
             FROM inventory_periods WHERE year = ?1 ORDER BY month ASC",
        )?;
        let records = stmt
            .query_map(params![year], period_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn save_periods(&mut self, records: &[PeriodRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            upsert_period(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_catalog(&self) -> Result<Vec<CatalogRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, category, kind, description, brand, purchase_cost, sale_cost, stock
             FROM inventory_catalog ORDER BY code ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CatalogRow {
                    code: row.get(0)?,
                    category: row.get(1)?,
                    kind: row.get(2)?,
                    description: row.get(3)?,
                    brand: row.get(4)?,
                    purchase_cost: row.get(5)?,
                    sale_cost: row.get(6)?,
                    stock: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn replace_period_movements(
        &mut self,
        period: PeriodKey,
        movements: &[Movement],
        summary: &[SummaryRow],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM inventory_movements WHERE year = ?1 AND month = ?2",
            params![period.year, period.month],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO inventory_movements
                    (year, month, code, description, movement_date, kind, opening_qty, entries,
                     exits, consumption, withdrawals, closing_qty, unit_cost, inventory_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for movement in movements {
                insert.execute(params![
                    period.year,
                    period.month,
                    movement.code,
                    movement.description,
                    movement.date,
                    movement.kind,
                    movement.opening_qty,
                    movement.entries,
                    movement.exits,
                    movement.consumption,
                    movement.withdrawals,
                    movement.closing_qty,
                    movement.unit_cost,
                    movement.inventory_value,
                ])?;
            }
        }
        write_summary(&tx, period, summary)?;
        tx.commit()?;

        debug!(
            "Stored {} movements and {} summary rows for {}",
            movements.len(),
            summary.len(),
            period
        );
        Ok(())
    }

    fn load_movements(&self, period: PeriodKey) -> Result<Vec<Movement>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, description, movement_date, kind, opening_qty, entries, exits,
                    consumption, withdrawals, closing_qty, unit_cost, inventory_value
             FROM inventory_movements WHERE year = ?1 AND month = ?2
             ORDER BY id ASC",
        )?;
        let movements = stmt
            .query_map(params![period.year, period.month], |row| {
                Ok(Movement {
                    period,
                    code: row.get(0)?,
                    description: row.get(1)?,
                    date: row.get(2)?,
                    kind: row.get(3)?,
                    opening_qty: row.get(4)?,
                    entries: row.get(5)?,
                    exits: row.get(6)?,
                    consumption: row.get(7)?,
                    withdrawals: row.get(8)?,
                    closing_qty: row.get(9)?,
                    unit_cost: row.get(10)?,
                    inventory_value: row.get(11)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(movements)
    }

    fn load_summary(&self, period: PeriodKey) -> Result<Vec<SummaryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, description, unit_cost, opening, entries, exits, consumption,
                    withdrawals, closing, last_date, inventory_value
             FROM monthly_summary WHERE year = ?1 AND month = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![period.year, period.month], |row| {
                Ok(SummaryRow {
                    period,
                    code: row.get(0)?,
                    description: row.get(1)?,
                    unit_cost: row.get(2)?,
                    opening: row.get(3)?,
                    entries: row.get(4)?,
                    exits: row.get(5)?,
                    consumption: row.get(6)?,
                    withdrawals: row.get(7)?,
                    closing: row.get(8)?,
                    date: row.get(9)?,
                    inventory_value: row.get(10)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn save_summary_rows(&mut self, period: PeriodKey, rows: &[SummaryRow]) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_summary(&tx, period, rows)?;
        tx.commit()?;
        Ok(())
    }

    fn load_rollup(&self, period: PeriodKey) -> Result<Vec<RollupRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, description, unit_cost, opening, entries, exits, consumption,
                    withdrawals, last_date
             FROM period_rollup WHERE year = ?1 AND month = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![period.year, period.month], |row| {
                Ok(RollupRow {
                    period,
                    code: row.get(0)?,
                    description: row.get(1)?,
                    unit_cost: row.get(2)?,
                    opening: row.get(3)?,
                    entries: row.get(4)?,
                    exits: row.get(5)?,
                    consumption: row.get(6)?,
                    withdrawals: row.get(7)?,
                    date: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn commit_reconciliation(&mut self, write: &ReconciliationWrite) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in &write.periods {
            upsert_period(&tx, record)?;
        }

        for &(period, cost) in &write.opening_costs {
            tx.execute(
                "UPDATE monthly_summary SET unit_cost = ?1
                 WHERE year = ?2 AND month = ?3 AND code = ?4",
                params![cost, period.year, period.month, OPENING_BALANCE_CODE],
            )?;
            tx.execute(
                "UPDATE period_rollup SET unit_cost = ?1
                 WHERE year = ?2 AND month = ?3 AND code = ?4",
                params![cost, period.year, period.month, OPENING_BALANCE_CODE],
            )?;
            tx.execute(
                "UPDATE inventory_movements SET unit_cost = ?1
                 WHERE year = ?2 AND month = ?3 AND kind = ?4",
                params![cost, period.year, period.month, MovementKind::OpeningBalance],
            )?;
            tx.execute(
                "UPDATE monthly_summary SET inventory_value = ?1 WHERE year = ?2 AND month = ?3",
                params![cost, period.year, period.month],
            )?;
            tx.execute(
                "UPDATE inventory_movements SET inventory_value = ?1 WHERE year = ?2 AND month = ?3",
                params![cost, period.year, period.month],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn test_migrate_is_repeatable() {
        let store = store();
        assert!(store.migrate().is_ok());
    }

    #[test]
    fn test_open_file_database_uses_wal() {
        let path = std::env::temp_dir().join(format!("inventory-store-{}.db", std::process::id()));
        let mut store = SqliteStore::open(&path).unwrap();
        store.migrate().unwrap();
        let mode: String = store
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let key = PeriodKey::new(9, 2024).unwrap();
        store.save_periods(&[PeriodRecord::new(key, 1.0, 2.0)]).unwrap();
        assert!(store.load_period(key).unwrap().is_some());

        drop(store);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[test]
    fn test_period_upsert_keeps_single_row() {
        let mut store = store();
        let key = PeriodKey::new(7, 2024).unwrap();
        store
            .save_periods(&[PeriodRecord::new(key, 100.0, 200.0)])
            .unwrap();

        let mut record = store.load_period(key).unwrap().unwrap();
        record.closing = 250.0;
        record.purchase_adjustment = 12.5;
        store.save_periods(&[record]).unwrap();

        let records = store.load_periods_for_year(2024).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].closing, 250.0);
        assert_eq!(records[0].purchase_adjustment, 12.5);
        assert_eq!(records[0].description, "JULY 2024");
        assert!(store.load_period(key.next()).unwrap().is_none());
    }

    #[test]
    fn test_catalog_round_trip_keeps_missing_fields() {
        let mut store = store();
        store
            .insert_catalog(&[CatalogRow {
                code: "P-100".to_string(),
                description: Some("BOLT".to_string()),
                purchase_cost: Some(3.5),
                stock: Some(8),
                ..CatalogRow::default()
            }])
            .unwrap();

        let catalog = store.load_catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].category, None);
        assert_eq!(catalog[0].stock, Some(8));
    }

    #[test]
    fn test_movement_kind_stored_as_text() {
        let mut store = store();
        let key = PeriodKey::new(1, 2024).unwrap();
        let movement = Movement {
            period: key,
            code: "P-100".to_string(),
            description: "BOLT".to_string(),
            date: key.first_day(),
            kind: MovementKind::InitialStock,
            opening_qty: 0,
            entries: 25,
            exits: 0,
            consumption: 0,
            withdrawals: 0,
            closing_qty: 25,
            unit_cost: 4.0,
            inventory_value: 0.0,
        };
        store
            .replace_period_movements(key, &[movement.clone()], &[])
            .unwrap();

        let kind: String = store
            .connection()
            .query_row("SELECT kind FROM inventory_movements", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kind, "initial_stock");
        assert_eq!(store.load_movements(key).unwrap(), vec![movement]);
    }
}
