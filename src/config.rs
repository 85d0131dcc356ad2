use crate::error::{InventoryMovementError, Result};
use crate::seasonality::{get_profile_weights, MonthlyProfile};
use chrono::Weekday;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum RestDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl RestDay {
    pub fn weekday(self) -> Weekday {
        match self {
            RestDay::Monday => Weekday::Mon,
            RestDay::Tuesday => Weekday::Tue,
            RestDay::Wednesday => Weekday::Wed,
            RestDay::Thursday => Weekday::Thu,
            RestDay::Friday => Weekday::Fri,
            RestDay::Saturday => Weekday::Sat,
            RestDay::Sunday => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CalendarConfig {
    #[schemars(description = "Weekly day without movements. Every other calendar day is a business day.")]
    pub rest_day: RestDay,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            rest_day: RestDay::Sunday,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SelectionConfig {
    #[schemars(description = "Items recruited for a period with no value change.")]
    pub base_items: usize,

    #[schemars(description = "Lower bound on recruited items (before capping at the catalog size).")]
    pub min_items: usize,

    #[schemars(description = "Upper bound on recruited items.")]
    pub max_items: usize,

    #[schemars(description = "Monetary delta that recruits one additional item.")]
    pub delta_per_item: f64,

    #[schemars(description = "Share of the absolute period delta spread across recruited items as their movement budget.")]
    pub budget_delta_share: f64,

    #[schemars(description = "Share of the opening value added to the budget when the period grows.")]
    pub growth_opening_share: f64,

    #[schemars(description = "Minimum budget, as a share of the opening value, when the period contracts.")]
    pub contraction_opening_share: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            base_items: 20,
            min_items: 10,
            max_items: 50,
            delta_per_item: 10_000.0,
            budget_delta_share: 0.5,
            growth_opening_share: 0.1,
            contraction_opening_share: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PricingConfig {
    #[schemars(description = "Catalog costs below this are raised to it.")]
    pub price_floor: f64,

    #[schemars(description = "Catalog costs above this are lowered to it.")]
    pub price_ceiling: f64,

    #[schemars(description = "Relative jitter applied to a cost already inside its price band (0.1 = +/-10%).")]
    pub in_band_jitter: f64,

    #[schemars(description = "Fraction of the band width, measured from the nearest edge, where out-of-band costs land.")]
    pub out_of_band_reach: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_floor: 5.0,
            price_ceiling: 500.0,
            in_band_jitter: 0.1,
            out_of_band_reach: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MovementConfig {
    #[schemars(description = "Items starting the period below this stock receive a large initial entry.")]
    pub low_stock_threshold: i64,

    #[schemars(description = "Minimum quantity of the initial entry.")]
    pub initial_entry_min: i64,

    #[schemars(description = "Random spread added on top of the initial entry minimum.")]
    pub initial_entry_spread: i64,

    #[schemars(description = "Multiplier on the per-item movement count ranges (1-3 after an initial entry, 2-4 otherwise).")]
    pub movements_per_slot: usize,

    #[schemars(description = "Below this stock an entry is forced and exits are not allowed.")]
    pub restock_threshold: i64,

    #[schemars(description = "On the last scheduled day, stock below this forces an entry and bars exits.")]
    pub last_day_floor: i64,

    #[schemars(description = "Exit-only days require stock strictly above this.")]
    pub exit_only_floor: i64,

    #[schemars(description = "Units kept back when sizing an exit.")]
    pub exit_reserve: i64,

    #[schemars(description = "Probability of an entry on a day when the period grows.")]
    pub growth_entry_share: f64,

    #[schemars(description = "Probability of an entry on a day when the period contracts.")]
    pub contraction_entry_share: f64,

    #[schemars(description = "Probability of an exit on a day with enough stock.")]
    pub exit_probability: f64,

    #[schemars(description = "Smallest regular entry and base quantity.")]
    pub min_entry: i64,

    #[schemars(description = "Smallest fallback replenishment entry.")]
    pub min_replenish: i64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 5,
            initial_entry_min: 20,
            initial_entry_spread: 20,
            movements_per_slot: 4,
            restock_threshold: 15,
            last_day_floor: 20,
            exit_only_floor: 20,
            exit_reserve: 10,
            growth_entry_share: 0.7,
            contraction_entry_share: 0.5,
            exit_probability: 0.6,
            min_entry: 5,
            min_replenish: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SettlementConfig {
    #[schemars(description = "Number of corrective movements the residual gap is split into.")]
    pub slices: usize,

    #[schemars(description = "Largest accepted difference between realized and target values.")]
    pub tolerance: f64,

    #[schemars(description = "Extra units added when the non-negativity sweep raises entries.")]
    pub non_negative_margin: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            slices: 5,
            tolerance: 0.01,
            non_negative_margin: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ResolverConfig {
    #[schemars(description = "January-November weights used when the year grows.")]
    pub growth_profile: MonthlyProfile,

    #[schemars(description = "January-November weights used when the year contracts.")]
    pub contraction_profile: MonthlyProfile,

    #[schemars(description = "Hand-tuned growth weights for specific years, keyed by year.")]
    pub growth_overrides: BTreeMap<i32, Vec<f64>>,

    #[schemars(description = "Share of the annual delta left for December (default 1/12).")]
    pub year_end_share: f64,

    #[schemars(description = "Keep December closings as authoritative reference values during reconciliation.")]
    pub pin_year_end_closing: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            growth_profile: MonthlyProfile::StandardGrowth,
            contraction_profile: MonthlyProfile::StandardContraction,
            growth_overrides: BTreeMap::new(),
            year_end_share: 1.0 / 12.0,
            pin_year_end_closing: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GeneratorConfig {
    pub calendar: CalendarConfig,
    pub selection: SelectionConfig,
    pub pricing: PricingConfig,
    pub movement: MovementConfig,
    pub settlement: SettlementConfig,
    pub resolver: ResolverConfig,
}

impl GeneratorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GeneratorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(GeneratorConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn validate(&self) -> Result<()> {
        let selection = &self.selection;
        if selection.min_items == 0 || selection.min_items > selection.max_items {
            return Err(invalid(format!(
                "selection.min_items ({}) must be between 1 and max_items ({})",
                selection.min_items, selection.max_items
            )));
        }
        if selection.delta_per_item <= 0.0 {
            return Err(invalid("selection.delta_per_item must be positive"));
        }
        for (name, value) in [
            ("selection.budget_delta_share", selection.budget_delta_share),
            ("selection.growth_opening_share", selection.growth_opening_share),
            (
                "selection.contraction_opening_share",
                selection.contraction_opening_share,
            ),
            ("pricing.in_band_jitter", self.pricing.in_band_jitter),
            ("pricing.out_of_band_reach", self.pricing.out_of_band_reach),
            ("movement.growth_entry_share", self.movement.growth_entry_share),
            (
                "movement.contraction_entry_share",
                self.movement.contraction_entry_share,
            ),
            ("movement.exit_probability", self.movement.exit_probability),
            ("resolver.year_end_share", self.resolver.year_end_share),
        ] {
            check_unit_interval(name, value)?;
        }

        if self.pricing.price_floor <= 0.0 || self.pricing.price_floor > self.pricing.price_ceiling {
            return Err(invalid(format!(
                "pricing.price_floor ({}) must be positive and not above price_ceiling ({})",
                self.pricing.price_floor, self.pricing.price_ceiling
            )));
        }

        let movement = &self.movement;
        if movement.movements_per_slot == 0 {
            return Err(invalid("movement.movements_per_slot must be at least 1"));
        }
        if movement.initial_entry_spread < 0 || movement.exit_reserve < 0 {
            return Err(invalid(
                "movement.initial_entry_spread and movement.exit_reserve must not be negative",
            ));
        }

        if self.settlement.slices == 0 {
            return Err(invalid("settlement.slices must be at least 1"));
        }
        if self.settlement.tolerance <= 0.0 {
            return Err(invalid("settlement.tolerance must be positive"));
        }

        get_profile_weights(&self.resolver.growth_profile)?;
        get_profile_weights(&self.resolver.contraction_profile)?;
        for weights in self.resolver.growth_overrides.values() {
            get_profile_weights(&MonthlyProfile::Custom(weights.clone()))?;
        }

        Ok(())
    }
}

fn invalid(details: impl Into<String>) -> InventoryMovementError {
    InventoryMovementError::InvalidConfig(details.into())
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!(
            "{} must be between 0.0 and 1.0 (got {})",
            name, value
        )));
    }
    Ok(())
}
