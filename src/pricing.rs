//! Price bands used to make generated unit costs look categorized.

use crate::config::PricingConfig;
use crate::utils::round2;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
}

impl PriceBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, price: f64) -> bool {
        (self.min..=self.max).contains(&price)
    }
}

/// Very cheap, cheap, mid-range, high and premium. Adjacent bands overlap.
pub const PRICE_BANDS: [PriceBand; 5] = [
    PriceBand::new(5.0, 25.0),
    PriceBand::new(20.0, 80.0),
    PriceBand::new(75.0, 150.0),
    PriceBand::new(140.0, 250.0),
    PriceBand::new(240.0, 500.0),
];

pub fn band_for_position(position: usize) -> PriceBand {
    PRICE_BANDS[position % PRICE_BANDS.len()]
}

/// Snaps `base` into `band` given a uniform draw in `[0, 1)`.
///
/// A base already inside the band is jittered by up to `in_band_jitter` either
/// way. Otherwise the price lands within `out_of_band_reach` of the band width,
/// measured from the edge closest to the base.
pub fn snap_to_band(base: f64, band: PriceBand, draw: f64, config: &PricingConfig) -> f64 {
    let draw = draw.clamp(0.0, 1.0);
    let price = if band.contains(base) {
        let factor = 1.0 - config.in_band_jitter + 2.0 * config.in_band_jitter * draw;
        base * factor
    } else {
        let reach = band.width() * config.out_of_band_reach * draw;
        if (base - band.min).abs() < (base - band.max).abs() {
            band.min + reach
        } else {
            band.max - reach
        }
    };

    round2(price)
}

/// Unit cost for the item at `position` in the selection order.
pub fn consistent_price<R: Rng + ?Sized>(
    base: f64,
    position: usize,
    config: &PricingConfig,
    rng: &mut R,
) -> f64 {
    snap_to_band(base, band_for_position(position), rng.gen::<f64>(), config)
}

/// Clamps a raw catalog cost into the configured range. Missing, negative
/// and zero costs become the floor.
pub fn sanitize_cost(raw: Option<f64>, config: &PricingConfig) -> f64 {
    match raw {
        Some(cost) if cost.is_finite() => cost.clamp(config.price_floor, config.price_ceiling),
        _ => config.price_floor,
    }
}
