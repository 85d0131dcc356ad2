use chrono::{Datelike, Weekday};
use inventory_movement_builder::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;

fn hardware_catalog(count: i64) -> Vec<CatalogRow> {
    (0..count)
        .map(|i| CatalogRow {
            code: format!("HW-{:04}", i),
            category: Some("HARDWARE".to_string()),
            kind: Some(if i % 2 == 0 { "FASTENER" } else { "TOOL" }.to_string()),
            description: Some(format!("ARTICLE {}", i)),
            brand: Some("ACME".to_string()),
            purchase_cost: Some(3.0 + 17.5 * i as f64),
            sale_cost: Some(5.0 + 21.0 * i as f64),
            stock: Some(10 + i),
        })
        .collect()
}

fn assert_chain_continuity<S: Datastore>(store: &S, year: i32) {
    let records = store.load_periods_for_year(year).unwrap();
    assert_eq!(records.len(), 12);
    for pair in records.windows(2) {
        assert!(
            (pair[0].closing - pair[1].opening).abs() <= 0.01,
            "{} closes at {:.2} but {} opens at {:.2}",
            pair[0].key,
            pair[0].closing,
            pair[1].key,
            pair[1].opening
        );
    }
}

fn assert_period_rows_coherent<S: Datastore>(store: &S, key: PeriodKey) {
    let record = store.load_period(key).unwrap().unwrap();
    let summary = store.load_summary(key).unwrap();

    let sentinel = summary
        .iter()
        .find(|row| row.code == OPENING_BALANCE_CODE)
        .expect("opening balance row");
    assert_eq!(sentinel.entries, 0);
    assert_eq!(sentinel.exits, 0);
    assert!((sentinel.unit_cost - record.opening).abs() <= 0.01);

    assert!(
        (realized_closing(&summary) - record.closing).abs() <= 0.01,
        "{} realized {:.2}, recorded {:.2}",
        key,
        realized_closing(&summary),
        record.closing
    );

    for row in &summary {
        assert!(row.closing >= 0, "{} {} closes negative", key, row.code);
        assert_eq!(row.closing, row.expected_closing());
    }
    for movement in store.load_movements(key).unwrap() {
        assert!(movement.opening_qty >= 0);
        assert!(movement.closing_qty >= 0);
    }
}

fn assert_summary_matches_movements(batch: &PeriodBatch) {
    let adjusted: BTreeSet<&str> = batch
        .report
        .sweep_corrections
        .iter()
        .map(|c| c.code.as_str())
        .collect();

    for row in batch.summary.iter().filter(|row| !adjusted.contains(row.code.as_str())) {
        let detail: Vec<&Movement> = batch.movements.iter().filter(|m| m.code == row.code).collect();
        let entries: i64 = detail.iter().map(|m| m.entries).sum();
        let exits: i64 = detail.iter().map(|m| m.exits).sum();
        assert_eq!((row.entries, row.exits), (entries, exits), "{} totals", row.code);

        let value: f64 = detail
            .iter()
            .map(|m| m.unit_cost * (m.entries - m.outflow()) as f64)
            .sum();
        if !row.is_opening_balance() {
            assert!((row.net_value() - value).abs() < 1e-6, "{} value", row.code);
        }

        assert_eq!(detail.first().map(|m| m.opening_qty), Some(row.opening), "{}", row.code);
        assert_eq!(detail.last().map(|m| m.closing_qty), Some(row.closing), "{}", row.code);
        for pair in detail.windows(2) {
            assert_eq!(pair[0].closing_qty, pair[1].opening_qty, "{} chain", row.code);
        }
    }
}

#[test]
fn test_growth_period_with_empty_stock() {
    let period = PeriodKey::new(3, 2024).unwrap();
    let business_days: Vec<_> = business_days(2024, 3, Weekday::Sun)
        .into_iter()
        .take(20)
        .collect();
    let items = items_from_catalog(&hardware_catalog(15), &PricingConfig::default());
    assert_eq!(items.len(), 15);

    let inputs = PeriodInputs {
        period,
        opening_value: 1_120_797.03,
        target_closing: 1_892_903.00,
        business_days: business_days.clone(),
        items,
        prior_stock: Default::default(),
    };

    let config = GeneratorConfig::default();
    let mut rng = StdRng::seed_from_u64(2024);
    let batch = MovementGenerator::new(&config)
        .generate(&inputs, &mut rng)
        .unwrap();

    assert!((realized_closing(&batch.summary) - 1_892_903.00).abs() <= 0.01);
    assert_eq!(batch.report.items_selected, 15);

    let opening = batch
        .movements
        .iter()
        .find(|m| m.kind == MovementKind::OpeningBalance)
        .unwrap();
    assert!((opening.unit_cost - 1_120_797.03).abs() < 1e-6);
    assert_eq!(opening.date, business_days[0]);

    // Every item starts empty, so each gets an initial stock entry on day two.
    let initial: Vec<_> = batch
        .movements
        .iter()
        .filter(|m| m.kind == MovementKind::InitialStock)
        .collect();
    assert_eq!(initial.len(), 15);
    assert!(initial.iter().all(|m| m.date == business_days[1] && m.opening_qty == 0));

    let mut stock = std::collections::BTreeMap::new();
    for movement in batch.movements.iter().filter(|m| !is_reserved_code(&m.code)) {
        let level = stock.entry(movement.code.clone()).or_insert(0i64);
        assert_eq!(*level, movement.opening_qty);
        *level = *level + movement.entries - movement.outflow();
        assert!(*level >= 0);
        assert_eq!(*level, movement.closing_qty);
    }
    assert!(batch.movements.iter().all(|m| business_days.contains(&m.date)));
    assert_summary_matches_movements(&batch);
}

#[test]
fn test_contraction_settlement_rows_follow_their_movements() {
    let period = PeriodKey::new(3, 2024).unwrap();
    let inputs = PeriodInputs {
        period,
        opening_value: 500_000.0,
        target_closing: 100_000.0,
        business_days: business_days(2024, 3, Weekday::Sun),
        items: items_from_catalog(&hardware_catalog(15), &PricingConfig::default()),
        prior_stock: Default::default(),
    };

    let config = GeneratorConfig::default();
    for seed in [3, 41] {
        let mut rng = StdRng::seed_from_u64(seed);
        let batch = MovementGenerator::new(&config)
            .generate(&inputs, &mut rng)
            .unwrap();
        assert!((realized_closing(&batch.summary) - 100_000.0).abs() <= 0.01);
        assert_summary_matches_movements(&batch);
    }
}

#[test]
fn test_full_year_in_memory() -> anyhow::Result<()> {
    let mut store = MemoryStore::with_catalog(hardware_catalog(40));
    store.insert_period(PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 1_120_797.03));

    let mut builder = InventoryMovementBuilder::new(store, GeneratorConfig::default())?;
    let mut rng = StdRng::seed_from_u64(7);
    let report = builder.generate_year_with_rng(2024, None, Some(1_892_903.00), &mut rng)?;

    assert!(report.all_succeeded(), "failed: {:?}", report.failed_periods());
    assert_eq!(report.reconciliation.len(), 12);
    assert!((report.chain.opening() - 1_120_797.03).abs() < 1e-6);

    let store = builder.store();
    assert_chain_continuity(store, 2024);
    for key in PeriodKey::months_of(2024) {
        assert_period_rows_coherent(store, key);
    }

    let december = store.load_period(PeriodKey::new(12, 2024)?)?.unwrap();
    assert_eq!(december.closing, 1_892_903.00);
    Ok(())
}

#[test]
fn test_prior_stock_carries_between_months() -> anyhow::Result<()> {
    let mut store = MemoryStore::with_catalog(hardware_catalog(25));
    store.insert_period(PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 300_000.0));

    let mut builder = InventoryMovementBuilder::new(store, GeneratorConfig::default())?;
    let mut rng = StdRng::seed_from_u64(99);
    builder.generate_year_with_rng(2024, None, Some(280_000.0), &mut rng)?;

    for key in PeriodKey::months_of(2024).skip(1) {
        let previous = ending_stock(&builder.store().load_summary(key.prev())?);
        for row in builder.store().load_summary(key)? {
            if is_reserved_code(&row.code) {
                continue;
            }
            let expected = previous.get(&row.code).copied().unwrap_or(0);
            assert_eq!(row.opening, expected, "{} {}", key, row.code);
        }
    }
    Ok(())
}

#[test]
fn test_regeneration_replaces_period() -> anyhow::Result<()> {
    let mut store = MemoryStore::with_catalog(hardware_catalog(30));
    store.insert_period(PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 500_000.0));

    let mut builder = InventoryMovementBuilder::new(store, GeneratorConfig::default())?;
    builder.resolve_year(2024, None, Some(620_000.0))?;
    let key = PeriodKey::new(5, 2024)?;
    let target = builder.store().load_period(key)?.unwrap().closing;

    let mut rng = StdRng::seed_from_u64(1);
    let first = builder.generate_period_with_rng(key, &mut rng)?;
    let first_movements = builder.store().load_movements(key)?;
    assert!((first.realized_closing - target).abs() <= 0.01);

    let second = builder.generate_period_with_rng(key, &mut rng)?;
    assert!((second.realized_closing - target).abs() <= 0.01);

    let movements = builder.store().load_movements(key)?;
    assert_eq!(movements.len(), second.movements);
    assert_ne!(movements, first_movements);

    let summary = builder.store().load_summary(key)?;
    let codes: BTreeSet<&str> = summary.iter().map(|row| row.code.as_str()).collect();
    assert_eq!(codes.len(), summary.len());
    assert_period_rows_coherent(builder.store(), key);
    Ok(())
}

#[test]
fn test_reconciliation_repairs_broken_chain() -> anyhow::Result<()> {
    let mut store = MemoryStore::with_catalog(hardware_catalog(20));
    store.insert_period(PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 90_000.0));

    let mut builder = InventoryMovementBuilder::new(store, GeneratorConfig::default())?;
    let mut rng = StdRng::seed_from_u64(5);
    builder.generate_year_with_rng(2024, None, Some(120_000.0), &mut rng)?;

    // Break June's opening and its sentinel.
    let june = PeriodKey::new(6, 2024)?;
    let mut record = builder.store().load_period(june)?.unwrap();
    record.opening += 750.0;
    builder.store_mut().commit_reconciliation(&ReconciliationWrite {
        periods: vec![record.clone()],
        opening_costs: vec![(june, record.opening)],
    })?;

    let report = builder.reconcile_period(june)?;
    assert!(report.changed());
    assert!((report.opening_after - builder.store().load_period(june.prev())?.unwrap().closing).abs() <= 0.01);

    assert!(builder.reconcile_year(2024));
    assert_chain_continuity(builder.store(), 2024);
    for key in PeriodKey::months_of(2024) {
        assert_period_rows_coherent(builder.store(), key);
    }
    Ok(())
}

#[test]
fn test_full_year_sqlite() -> anyhow::Result<()> {
    let mut store = SqliteStore::in_memory()?;
    store.migrate()?;
    store.insert_catalog(&hardware_catalog(30))?;
    store.save_periods(&[PeriodRecord::new(PeriodKey::new(12, 2024)?, 0.0, 640_000.0)])?;

    let mut config = GeneratorConfig::default();
    config.calendar.rest_day = RestDay::Saturday;
    let mut builder = InventoryMovementBuilder::new(store, config)?;
    let mut rng = StdRng::seed_from_u64(31);
    let report = builder.generate_year_with_rng(2025, None, Some(410_000.0), &mut rng)?;
    assert!(report.all_succeeded());
    assert_eq!(report.chain.profile, MonthlyProfile::StandardContraction);

    let store = builder.store();
    assert_chain_continuity(store, 2025);
    for key in PeriodKey::months_of(2025) {
        assert_period_rows_coherent(store, key);
        let rollup = store.load_rollup(key)?;
        assert_eq!(rollup.len(), store.load_summary(key)?.len());
        assert!(store
            .load_movements(key)?
            .iter()
            .all(|m| m.date.weekday() != Weekday::Sat));
    }
    Ok(())
}

#[test]
fn test_config_from_json_drives_generation() -> anyhow::Result<()> {
    let config = GeneratorConfig::from_json_str(
        r#"{
            "selection": { "base_items": 6, "min_items": 4, "max_items": 8 },
            "settlement": { "slices": 3 }
        }"#,
    )?;

    let mut store = MemoryStore::with_catalog(hardware_catalog(30));
    store.insert_period(PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 40_000.0));
    let mut builder = InventoryMovementBuilder::new(store, config)?;
    builder.resolve_year(2024, None, Some(52_000.0))?;

    let mut rng = StdRng::seed_from_u64(12);
    let report = builder.generate_period_with_rng(PeriodKey::new(2, 2024)?, &mut rng)?;
    assert!(report.items_selected <= 8);
    assert!(report.items_selected >= 4);

    let settlements = builder
        .store()
        .load_movements(PeriodKey::new(2, 2024)?)?
        .into_iter()
        .filter(|m| m.kind == MovementKind::Settlement)
        .count();
    assert!(settlements <= 3);
    Ok(())
}
