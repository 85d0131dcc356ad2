use crate::balancer::{enforce_non_negative, ClosingBalancer, SweepCorrection};
use crate::config::{GeneratorConfig, SelectionConfig};
use crate::error::{InventoryMovementError, Result};
use crate::planner::{base_quantity, decide_action, plan_quantities, DayDraws, StockLedger};
use crate::pricing::consistent_price;
use crate::schema::*;
use crate::utils::round2;
use chrono::NaiveDate;
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Exp1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the engine needs to generate one period.
#[derive(Debug, Clone)]
pub struct PeriodInputs {
    pub period: PeriodKey,
    pub opening_value: f64,
    pub target_closing: f64,
    /// Business days of the period in calendar order.
    pub business_days: Vec<NaiveDate>,
    pub items: Vec<Item>,
    /// Ending stock of the previous period per item code.
    pub prior_stock: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub period: PeriodKey,
    pub items_selected: usize,
    pub movements: usize,
    pub budget: f64,
    pub realized_before_settlement: f64,
    pub settlement_gap: Option<f64>,
    pub sweep_corrections: Vec<SweepCorrection>,
    pub realized_closing: f64,
}

/// Movements and summary rows generated for one period, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBatch {
    pub period: PeriodKey,
    pub movements: Vec<Movement>,
    pub summary: Vec<SummaryRow>,
    pub report: GenerationReport,
}

impl PeriodBatch {
    pub fn rollup(&self) -> Vec<RollupRow> {
        self.summary.iter().map(RollupRow::from).collect()
    }

    /// Ending stock per physical item, the next period's prior stock.
    pub fn ending_stock(&self) -> BTreeMap<String, i64> {
        ending_stock(&self.summary)
    }
}

/// Ending stock per code from summary rows, sentinels excluded and negative
/// levels floored at zero.
pub fn ending_stock(rows: &[SummaryRow]) -> BTreeMap<String, i64> {
    rows.iter()
        .filter(|row| !is_reserved_code(&row.code))
        .map(|row| (row.code.clone(), row.closing.max(0)))
        .collect()
}

pub struct MovementGenerator<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> MovementGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn generate<R: Rng + ?Sized>(&self, inputs: &PeriodInputs, rng: &mut R) -> Result<PeriodBatch> {
        let period = inputs.period;
        if inputs.items.is_empty() {
            return Err(InventoryMovementError::NoItems(period));
        }
        let (Some(&first_day), Some(&last_day)) =
            (inputs.business_days.first(), inputs.business_days.last())
        else {
            return Err(InventoryMovementError::NoBusinessDays(period));
        };

        let opening = round2(inputs.opening_value.max(0.0));
        let target = round2(inputs.target_closing.max(0.0));
        let delta = target - opening;

        let selected = select_items(&inputs.items, &inputs.prior_stock, delta, &self.config.selection, rng);
        let budget = movement_budget(delta, opening, &self.config.selection);
        let shares = distribute_value(budget, selected.len(), rng);

        info!(
            "Generating {}: opening {:.2}, target {:.2}, {} items, budget {:.2}",
            period,
            opening,
            target,
            selected.len(),
            budget
        );

        let mut movements = vec![Movement {
            period,
            code: OPENING_BALANCE_CODE.to_string(),
            description: OPENING_BALANCE_DESCRIPTION.to_string(),
            date: first_day,
            kind: MovementKind::OpeningBalance,
            opening_qty: 1,
            entries: 0,
            exits: 0,
            consumption: 0,
            withdrawals: 0,
            closing_qty: 1,
            unit_cost: opening,
            inventory_value: opening,
        }];

        let mut ledger = StockLedger::from_prior(
            selected
                .iter()
                .filter_map(|item| inputs.prior_stock.get_key_value(&item.code)),
        );
        let entry_share = if delta > 0.0 {
            self.config.movement.growth_entry_share
        } else {
            self.config.movement.contraction_entry_share
        };

        let mut summary = vec![SummaryRow {
            period,
            code: OPENING_BALANCE_CODE.to_string(),
            description: OPENING_BALANCE_DESCRIPTION.to_string(),
            unit_cost: opening,
            opening: 1,
            entries: 0,
            exits: 0,
            consumption: 0,
            withdrawals: 0,
            closing: 1,
            date: first_day,
            inventory_value: opening,
        }];

        for (position, (item, item_budget)) in selected.iter().zip(shares).enumerate() {
            let unit_cost = consistent_price(item.purchase_cost, position, &self.config.pricing, rng);
            let opening_qty = ledger.on_hand(&item.code);
            let item_movements = self.plan_item(
                period,
                item,
                unit_cost,
                item_budget,
                opening,
                entry_share,
                &inputs.business_days,
                &mut ledger,
                rng,
            );

            if let Some(row) = summarize_item(period, item, unit_cost, opening_qty, opening, &item_movements) {
                summary.push(row);
            }
            movements.extend(item_movements);
        }

        let sweep_corrections =
            enforce_non_negative(&mut summary, self.config.settlement.non_negative_margin);

        let balancer = ClosingBalancer::new(&self.config.settlement);
        let realized_before_settlement = realized_closing(&summary);
        let settlement = balancer.settle(period, target, last_day, &mut summary);
        let settlement_gap = settlement.as_ref().map(|s| s.gap);
        if let Some(settlement) = settlement {
            movements.extend(settlement.movements);
        }

        let realized = balancer.verify_closing_identity(period, &summary, target)?;
        movements.sort_by_key(|m| m.date);

        info!(
            "Generated {}: {} movements, realized closing {:.2} (target {:.2})",
            period,
            movements.len(),
            realized,
            target
        );

        Ok(PeriodBatch {
            period,
            report: GenerationReport {
                period,
                items_selected: selected.len(),
                movements: movements.len(),
                budget,
                realized_before_settlement,
                settlement_gap,
                sweep_corrections,
                realized_closing: realized,
            },
            movements,
            summary,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_item<R: Rng + ?Sized>(
        &self,
        period: PeriodKey,
        item: &Item,
        unit_cost: f64,
        budget: f64,
        inventory_value: f64,
        entry_share: f64,
        days: &[NaiveDate],
        ledger: &mut StockLedger,
        rng: &mut R,
    ) -> Vec<Movement> {
        let config = &self.config.movement;
        let mut movements = Vec::new();
        let mut initial_day = None;

        let record = |kind: MovementKind,
                      date: NaiveDate,
                      opening_qty: i64,
                      entries: i64,
                      exits: i64,
                      closing_qty: i64| Movement {
            period,
            code: item.code.clone(),
            description: item.description.clone(),
            date,
            kind,
            opening_qty,
            entries,
            exits,
            consumption: 0,
            withdrawals: 0,
            closing_qty,
            unit_cost,
            inventory_value,
        };

        let starting_stock = ledger.on_hand(&item.code);
        let initial_stock = starting_stock < config.low_stock_threshold;
        if initial_stock {
            let day = days.get(1).or(days.first()).copied().unwrap_or(period.first_day());
            let floor = if unit_cost > 0.0 {
                (budget / (unit_cost * 0.5)).round() as i64
            } else {
                0
            };
            let minimum = config.initial_entry_min.max(floor);
            let quantity = rng.gen_range(minimum..=minimum + config.initial_entry_spread);
            let closing_qty = ledger.receive(&item.code, quantity);
            movements.push(record(
                MovementKind::InitialStock,
                day,
                starting_stock,
                quantity,
                0,
                closing_qty,
            ));
            initial_day = Some(day);
        }

        let slot = config.movements_per_slot;
        let count = if initial_stock {
            rng.gen_range(slot..=3 * slot)
        } else {
            rng.gen_range(2 * slot..=4 * slot)
        };

        // Later movements follow the initial entry.
        let mut schedule: Vec<NaiveDate> = days
            .iter()
            .copied()
            .filter(|day| initial_day.map_or(true, |first| *day > first))
            .collect();
        schedule.shuffle(rng);
        schedule.truncate(count);
        schedule.sort();

        let base = base_quantity(budget, unit_cost, schedule.len(), config);
        debug!(
            "{} {}: cost {:.2}, budget {:.2}, stock {}, {} days, base {}",
            period,
            item.code,
            unit_cost,
            budget,
            starting_stock,
            schedule.len(),
            base
        );

        for (index, day) in schedule.iter().enumerate() {
            let stock = ledger.on_hand(&item.code);
            let draws = DayDraws::sample(rng);
            let is_last = index + 1 == schedule.len();
            let action = decide_action(stock, index, is_last, entry_share, &draws, config);
            let planned = plan_quantities(action, stock, base, &draws, config);
            if planned.is_empty() {
                debug!("{} {} on {}: exit clamped to zero", period, item.code, day);
                continue;
            }

            ledger.receive(&item.code, planned.entries);
            let exits = ledger.withdraw(&item.code, planned.exits);
            if exits < planned.exits {
                debug!(
                    "{} {} on {}: exit {} clamped to {}",
                    period, item.code, day, planned.exits, exits
                );
            }
            let closing_qty = ledger.on_hand(&item.code);
            if planned.entries == 0 && exits == 0 {
                continue;
            }

            movements.push(record(
                action.kind(),
                *day,
                stock,
                planned.entries,
                exits,
                closing_qty,
            ));
        }

        movements
    }
}

fn summarize_item(
    period: PeriodKey,
    item: &Item,
    unit_cost: f64,
    opening_qty: i64,
    inventory_value: f64,
    movements: &[Movement],
) -> Option<SummaryRow> {
    let last = movements.iter().map(|m| m.date).max()?;
    let entries: i64 = movements.iter().map(|m| m.entries).sum();
    let exits: i64 = movements.iter().map(|m| m.exits).sum();
    let consumption: i64 = movements.iter().map(|m| m.consumption).sum();
    let withdrawals: i64 = movements.iter().map(|m| m.withdrawals).sum();

    Some(SummaryRow {
        period,
        code: item.code.clone(),
        description: item.description.clone(),
        unit_cost,
        opening: opening_qty,
        entries,
        exits,
        consumption,
        withdrawals,
        closing: (opening_qty + entries - exits - consumption - withdrawals).max(0),
        date: last,
        inventory_value,
    })
}

/// Number of items recruited for a period moving by `delta`.
pub fn selection_size(delta: f64, available: usize, config: &SelectionConfig) -> usize {
    let extra = (delta.abs() / config.delta_per_item) as usize;
    (config.base_items + extra)
        .clamp(config.min_items, config.max_items)
        .min(available)
}

/// Picks the items to move, favouring those carrying prior stock.
pub fn select_items<R: Rng + ?Sized>(
    items: &[Item],
    prior_stock: &BTreeMap<String, i64>,
    delta: f64,
    config: &SelectionConfig,
    rng: &mut R,
) -> Vec<Item> {
    let count = selection_size(delta, items.len(), config);
    let (stocked, empty): (Vec<&Item>, Vec<&Item>) = items
        .iter()
        .partition(|item| prior_stock.get(&item.code).copied().unwrap_or(0) > 0);

    let mut selected: Vec<Item> = if stocked.len() * 3 < count {
        stocked.iter().map(|item| (*item).clone()).collect()
    } else {
        stocked
            .choose_multiple(rng, count.min(stocked.len()))
            .map(|item| (*item).clone())
            .collect()
    };

    let missing = count.saturating_sub(selected.len());
    selected.extend(
        empty
            .choose_multiple(rng, missing.min(empty.len()))
            .map(|item| (*item).clone()),
    );
    selected
}

/// Monetary budget spread across the selected items.
pub fn movement_budget(delta: f64, opening: f64, config: &SelectionConfig) -> f64 {
    let from_delta = delta.abs() * config.budget_delta_share;
    if delta > 0.0 {
        from_delta + opening * config.growth_opening_share
    } else {
        from_delta.max(opening * config.contraction_opening_share)
    }
}

/// Splits `total` into `parts` shares drawn from a flat Dirichlet, rounded to
/// cents.
pub fn distribute_value<R: Rng + ?Sized>(total: f64, parts: usize, rng: &mut R) -> Vec<f64> {
    if parts == 0 {
        return Vec::new();
    }
    let draws: Vec<f64> = (0..parts).map(|_| -> f64 { Exp1.sample(rng) }).collect();
    let sum: f64 = draws.iter().sum();
    if sum <= 0.0 {
        return vec![round2(total / parts as f64); parts];
    }
    draws.into_iter().map(|d| round2(total * d / sum)).collect()
}
