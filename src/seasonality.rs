use crate::config::ResolverConfig;
use crate::error::{InventoryMovementError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Months whose closing is derived from the weights. December's closing is a
/// reference value, so profiles cover January through November.
pub const WEIGHTED_MONTHS: usize = 11;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum MonthlyProfile {
    #[schemars(
        description = "Growth pattern: slow first quarter, strongest growth from August to October."
    )]
    StandardGrowth,

    #[schemars(
        description = "Contraction pattern: close to uniform with slightly heavier reductions in Q2 and Q4."
    )]
    StandardContraction,

    #[schemars(description = "Evenly distributed across January to November.")]
    Flat,

    #[schemars(
        description = "Custom 11-value array of non-negative weights for January to November. Normalized before use."
    )]
    Custom(Vec<f64>),
}

pub fn get_profile_weights(profile: &MonthlyProfile) -> Result<Vec<f64>> {
    let weights = match profile {
        MonthlyProfile::StandardGrowth => {
            vec![0.05, 0.06, 0.08, 0.09, 0.1, 0.1, 0.09, 0.1, 0.11, 0.12, 0.1]
        }

        MonthlyProfile::StandardContraction => {
            vec![0.07, 0.07, 0.09, 0.1, 0.1, 0.09, 0.08, 0.1, 0.09, 0.11, 0.1]
        }

        MonthlyProfile::Flat => vec![1.0; WEIGHTED_MONTHS],

        MonthlyProfile::Custom(ref custom_weights) => {
            validate_custom_weights(custom_weights)?;
            custom_weights.clone()
        }
    };

    Ok(normalize_weights(&weights))
}

/// Picks the profile for a year: growth or contraction by the sign of the
/// annual delta, with per-year growth overrides taking precedence.
pub fn profile_for_year(config: &ResolverConfig, year: i32, annual_delta: f64) -> MonthlyProfile {
    if annual_delta > 0.0 {
        match config.growth_overrides.get(&year) {
            Some(weights) => MonthlyProfile::Custom(weights.clone()),
            None => config.growth_profile.clone(),
        }
    } else {
        config.contraction_profile.clone()
    }
}

fn validate_custom_weights(weights: &[f64]) -> Result<()> {
    if weights.len() != WEIGHTED_MONTHS {
        return Err(InventoryMovementError::InvalidWeights(format!(
            "Expected {} weights, got {}",
            WEIGHTED_MONTHS,
            weights.len()
        )));
    }

    if weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
        return Err(InventoryMovementError::InvalidWeights(
            "All weights must be finite and non-negative".to_string(),
        ));
    }

    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(InventoryMovementError::InvalidWeights(
            "Weights must not all be zero".to_string(),
        ));
    }

    Ok(())
}

pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 {
        return weights.to_vec();
    }
    weights.iter().map(|w| w / sum).collect()
}
