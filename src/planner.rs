//! Per-day movement planning.
//!
//! Planning is split in two: random draws are taken up front into
//! [`DayDraws`], then [`decide_action`] and [`plan_quantities`] turn them into
//! quantities without touching an RNG. The clamps can be exercised directly.

use crate::config::MovementConfig;
use crate::schema::MovementKind;
use rand::Rng;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayAction {
    EntryOnly,
    ExitOnly,
    Combined,
    Replenish,
}

impl DayAction {
    pub fn kind(self) -> MovementKind {
        match self {
            DayAction::EntryOnly => MovementKind::Entry,
            DayAction::ExitOnly => MovementKind::Exit,
            DayAction::Combined => MovementKind::Combined,
            DayAction::Replenish => MovementKind::Replenish,
        }
    }
}

/// Uniform draws in `[0, 1)` consumed by one planned day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayDraws {
    pub entry_roll: f64,
    pub exit_roll: f64,
    pub entry_factor: f64,
    pub exit_factor: f64,
}

impl DayDraws {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            entry_roll: rng.gen(),
            exit_roll: rng.gen(),
            entry_factor: rng.gen(),
            exit_factor: rng.gen(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayQuantities {
    pub entries: i64,
    pub exits: i64,
}

impl DayQuantities {
    pub fn is_empty(&self) -> bool {
        self.entries == 0 && self.exits == 0
    }
}

pub fn decide_action(
    stock: i64,
    index: usize,
    is_last: bool,
    entry_share: f64,
    draws: &DayDraws,
    config: &MovementConfig,
) -> DayAction {
    let mut must_enter =
        index == 0 || stock < config.restock_threshold || draws.entry_roll < entry_share;
    let mut may_exit = stock >= config.restock_threshold && draws.exit_roll < config.exit_probability;

    if is_last && stock < config.last_day_floor {
        must_enter = true;
        may_exit = false;
    }

    match (must_enter, may_exit) {
        (true, false) => DayAction::EntryOnly,
        (false, true) if stock > config.exit_only_floor => DayAction::ExitOnly,
        (true, true) => DayAction::Combined,
        _ => DayAction::Replenish,
    }
}

/// Reference quantity for an item: its budget spread over `movements + 1`
/// slots at `unit_cost`, never below `min_entry`.
pub fn base_quantity(budget: f64, unit_cost: f64, movements: usize, config: &MovementConfig) -> i64 {
    if unit_cost <= 0.0 || !budget.is_finite() {
        return config.min_entry;
    }
    let raw = (budget / (unit_cost * (movements as f64 + 1.0))).round() as i64;
    raw.max(config.min_entry)
}

/// Desired exit limited to `available - reserve`, but at least one unit.
pub fn reserve_limited(desired: i64, available: i64, reserve: i64) -> i64 {
    desired.min(available - reserve).max(1)
}

/// An exit never takes more than what is on hand.
pub fn clamp_exit(requested: i64, on_hand: i64) -> i64 {
    requested.min(on_hand).max(0)
}

fn scaled(base: i64, low: f64, high: f64, draw: f64) -> i64 {
    let factor = low + (high - low) * draw.clamp(0.0, 1.0);
    (base as f64 * factor).round() as i64
}

pub fn plan_quantities(
    action: DayAction,
    stock: i64,
    base: i64,
    draws: &DayDraws,
    config: &MovementConfig,
) -> DayQuantities {
    let stock = stock.max(0);
    match action {
        DayAction::EntryOnly => DayQuantities {
            entries: scaled(base, 0.8, 1.5, draws.entry_factor).max(config.min_entry),
            exits: 0,
        },
        DayAction::ExitOnly => {
            let desired = scaled(base, 0.3, 0.9, draws.exit_factor);
            let limited = reserve_limited(desired, stock, config.exit_reserve);
            DayQuantities {
                entries: 0,
                exits: clamp_exit(limited, stock),
            }
        }
        DayAction::Combined => {
            let entries = scaled(base, 1.0, 1.8, draws.entry_factor).max(config.min_entry);
            let desired = scaled(base, 0.3, 0.7, draws.exit_factor);
            let limited = reserve_limited(desired, stock + entries, config.exit_reserve);
            DayQuantities {
                entries,
                exits: clamp_exit(limited, stock + entries),
            }
        }
        DayAction::Replenish => DayQuantities {
            entries: ((base as f64 * 0.5).round() as i64).max(config.min_replenish),
            exits: 0,
        },
    }
}

/// Working stock per item code for one generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockLedger {
    levels: BTreeMap<String, i64>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger from prior ending stock; negative levels become zero.
    pub fn from_prior<'a, I>(prior: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a i64)>,
    {
        Self {
            levels: prior
                .into_iter()
                .map(|(code, qty)| (code.clone(), (*qty).max(0)))
                .collect(),
        }
    }

    pub fn on_hand(&self, code: &str) -> i64 {
        self.levels.get(code).copied().unwrap_or(0)
    }

    pub fn receive(&mut self, code: &str, quantity: i64) -> i64 {
        let level = self.levels.entry(code.to_string()).or_insert(0);
        *level += quantity.max(0);
        *level
    }

    /// Removes up to `quantity` units and returns how many were removed.
    pub fn withdraw(&mut self, code: &str, quantity: i64) -> i64 {
        let level = self.levels.entry(code.to_string()).or_insert(0);
        let taken = clamp_exit(quantity, *level);
        *level -= taken;
        taken
    }
}
