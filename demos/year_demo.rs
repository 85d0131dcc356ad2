use inventory_movement_builder::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn demo_catalog() -> Vec<CatalogRow> {
    let families = [
        ("HARDWARE", "FASTENER", 0.8),
        ("HARDWARE", "HAND TOOL", 18.0),
        ("ELECTRICAL", "CABLE", 42.0),
        ("PLUMBING", "VALVE", 95.0),
        ("ELECTRICAL", "BREAKER", 210.0),
        ("MACHINERY", "PUMP", 780.0),
    ];

    (0..36)
        .map(|i| {
            let (category, kind, cost) = families[i % families.len()];
            CatalogRow {
                code: format!("{:04}-{:03}", 1000 + i, i * 7),
                category: Some(category.to_string()),
                kind: Some(kind.to_string()),
                description: Some(format!("MODEL {}", i)),
                brand: Some(if i % 3 == 0 { "NORTHLINE" } else { "VERTEX" }.to_string()),
                purchase_cost: Some(cost * (1.0 + i as f64 / 50.0)),
                sale_cost: Some(cost * 1.35),
                stock: Some(3 + (i as i64 * 5) % 40),
            }
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    println!("Inventory Movement Builder - year demo");
    println!("======================================\n");

    let mut store = SqliteStore::in_memory()?;
    store.migrate()?;
    store.insert_catalog(&demo_catalog())?;
    store.save_periods(&[PeriodRecord::new(PeriodKey::new(12, 2023)?, 0.0, 1_120_797.03)])?;

    let mut config = GeneratorConfig::default();
    config.resolver.growth_overrides.insert(
        2024,
        vec![0.04, 0.05, 0.08, 0.09, 0.1, 0.1, 0.09, 0.11, 0.13, 0.12, 0.09],
    );

    let mut builder = InventoryMovementBuilder::new(store, config)?;
    let mut rng = StdRng::seed_from_u64(2024);
    let report = builder.generate_year_with_rng(2024, None, Some(1_892_903.00), &mut rng)?;

    println!("Profile: {:?}\n", report.chain.profile);
    println!(
        "{:<16} {:>16} {:>16} {:>10} {:>14}",
        "Period", "Opening", "Closing", "Movements", "Settlement"
    );

    for outcome in &report.outcomes {
        let key = outcome.period();
        let record = builder
            .store()
            .load_period(key)?
            .ok_or(InventoryMovementError::MissingPeriod(key))?;
        match outcome {
            PeriodOutcome::Generated(generated) => println!(
                "{:<16} {:>16.2} {:>16.2} {:>10} {:>14.2}",
                record.description,
                record.opening,
                record.closing,
                generated.movements,
                generated.settlement_gap.unwrap_or(0.0)
            ),
            PeriodOutcome::Failed { error, .. } => {
                println!("{:<16} failed: {}", record.description, error)
            }
        }
    }

    let drift: Vec<_> = report
        .reconciliation
        .iter()
        .filter_map(|r| r.pinned_drift.map(|d| (r.period, d)))
        .collect();
    println!("\nReconciled periods: {}", report.reconciliation.len());
    for (period, d) in drift {
        println!("  {} keeps its reference closing (drift {:.2})", period, d);
    }

    let january = PeriodKey::new(1, 2024)?;
    let summary = builder.store().load_summary(january)?;
    println!("\nJanuary summary ({} rows):", summary.len());
    for row in summary.iter().take(8) {
        println!(
            "  {:<12} {:>10.2} open {:>6} in {:>6} out {:>6} close {:>6}",
            row.code, row.unit_cost, row.opening, row.entries, row.outflow(), row.closing
        );
    }

    if let Ok(json) = serde_json::to_string_pretty(&report.chain.records[0]) {
        println!("\nFirst period record:\n{}", json);
    }

    Ok(())
}
