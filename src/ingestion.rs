use crate::config::PricingConfig;
use crate::pricing::sanitize_cost;
use crate::schema::{is_reserved_code, CatalogRow, Item};
use log::debug;
use std::collections::BTreeSet;

/// Turns raw catalog rows into generation items.
///
/// Reserved codes, blank codes, duplicates and rows without positive stock are
/// skipped. The description joins category, type, description and brand; costs
/// are clamped into the configured range, and a missing sale cost falls back to
/// the purchase cost.
pub fn items_from_catalog(rows: &[CatalogRow], pricing: &PricingConfig) -> Vec<Item> {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for row in rows {
        let code = row.code.trim();
        if code.is_empty() || is_reserved_code(code) {
            continue;
        }
        let stock = row.stock.unwrap_or(0);
        if stock <= 0 {
            continue;
        }
        if !seen.insert(code.to_string()) {
            debug!("Skipping duplicate catalog code {}", code);
            continue;
        }

        let description = [&row.category, &row.kind, &row.description, &row.brand]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let purchase_cost = sanitize_cost(row.purchase_cost, pricing);
        let sale_cost = match row.sale_cost {
            Some(cost) if cost.is_finite() && cost > 0.0 => sanitize_cost(Some(cost), pricing),
            _ => purchase_cost,
        };

        items.push(Item {
            code: code.to_string(),
            description: if description.is_empty() {
                code.to_string()
            } else {
                description
            },
            purchase_cost,
            sale_cost,
            stock,
        });
    }

    items
}
