use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weights closer to zero than this are treated as an empty stock.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// A tracked inventory category. `price_per_kg` is the running weighted
/// average of every quantity blended into `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub weight: f64,       // Cumulative kilograms held
    pub price_per_kg: f64, // Weighted-average unit cost
}

impl Material {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Material {
            id,
            name: name.into(),
            weight: 0.0,
            price_per_kg: 0.0,
        }
    }

    /// Weight * average price. This is what the stock cost to acquire.
    pub fn total_value(&self) -> f64 {
        self.weight * self.price_per_kg
    }

    /// Blends `delta_weight` kilograms bought at `delta_price` into the
    /// running average. Both new values are computed from the pre-update
    /// state before either field is written.
    pub fn blend(&mut self, delta_weight: f64, delta_price: f64) {
        let mut new_weight = self.weight + delta_weight;
        let new_price = if new_weight.abs() > WEIGHT_EPSILON {
            (self.total_value() + delta_weight * delta_price) / new_weight
        } else {
            new_weight = 0.0;
            0.0
        };
        self.weight = new_weight;
        self.price_per_kg = new_price;
    }

    /// Inverse of [`Material::blend`] for a removed quantity.
    pub fn unblend(&mut self, removed_weight: f64, removed_price: f64) {
        let mut new_weight = self.weight - removed_weight;
        if new_weight.abs() <= WEIGHT_EPSILON {
            new_weight = 0.0;
        }
        let new_price = if new_weight > 0.0 {
            (self.total_value() - removed_weight * removed_price) / new_weight
        } else {
            0.0
        };
        self.weight = new_weight;
        self.price_per_kg = new_price;
    }
}

/// An immutable purchase record. `total` is stored redundantly for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: i64,
    pub material_id: i64,
    pub date: DateTime<Utc>,
    pub weight: f64,
    pub price_per_kg: f64,
    pub total: f64,
}

impl Purchase {
    pub fn new(id: i64, material_id: i64, date: DateTime<Utc>, weight: f64, price_per_kg: f64) -> Self {
        Purchase {
            id,
            material_id,
            date,
            weight,
            price_per_kg,
            total: weight * price_per_kg,
        }
    }
}

/// Dashboard figures for one material with stock on hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub material_id: i64,
    pub name: String,
    pub total_weight: f64,
    pub total_value: f64,
    pub average_price: f64,
}
