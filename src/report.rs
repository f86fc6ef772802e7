//! Read-only views derived from the ledger: the stock dashboard, the filtered
//! purchase history and the name-sorted material list.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use crate::model::{Material, Purchase, StockSummary};

/// Date format used by the history table.
pub const DATE_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Stock figures for every material holding a non-zero weight.
pub fn dashboard(materials: &[Material]) -> Vec<StockSummary> {
    materials
        .iter()
        .filter(|m| m.weight != 0.0)
        .map(|m| StockSummary {
            material_id: m.id,
            name: m.name.clone(),
            total_weight: m.weight,
            total_value: m.total_value(),
            // The stored running average, not recomputed from history.
            average_price: m.price_per_kg,
        })
        .collect()
}

/// Optional constraints on the purchase history. Unset bounds are open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub material_id: Option<i64>,
}

impl PurchaseFilter {
    /// Inclusive on both ends.
    pub fn matches(&self, purchase: &Purchase) -> bool {
        self.start.map_or(true, |start| purchase.date >= start)
            && self.end.map_or(true, |end| purchase.date <= end)
            && self.material_id.map_or(true, |id| purchase.material_id == id)
    }
}

/// A purchase with its material name resolved. `material_name` is `None`
/// when the material no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow<'a> {
    pub purchase: &'a Purchase,
    pub material_name: Option<&'a str>,
}

/// Purchases matching `filter`, newest first. Purchases sharing a date keep
/// their insertion order.
pub fn history<'a>(
    purchases: &'a [Purchase],
    materials: &'a [Material],
    filter: &PurchaseFilter,
) -> Vec<HistoryRow<'a>> {
    let mut rows: Vec<HistoryRow<'a>> = purchases
        .iter()
        .filter(|p| filter.matches(p))
        .map(|p| HistoryRow {
            purchase: p,
            material_name: materials
                .iter()
                .find(|m| m.id == p.material_id)
                .map(|m| m.name.as_str()),
        })
        .collect();
    // sort_by is stable
    rows.sort_by(|a, b| b.purchase.date.cmp(&a.purchase.date));
    rows
}

/// Base letters only: decomposed, accents dropped, lowercased.
fn primary_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lowercased but keeping accents, so "Aluminio" sorts before "Alumínio".
fn secondary_key(name: &str) -> String {
    name.nfd().flat_map(char::to_lowercase).collect()
}

/// Collation order for display names: base letters first, then accents,
/// then case, then the exact string.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| secondary_key(a).cmp(&secondary_key(b)))
        .then_with(|| a.cmp(b))
}

/// Materials ordered by name for listing.
pub fn sorted_materials(materials: &[Material]) -> Vec<&Material> {
    let mut sorted: Vec<&Material> = materials.iter().collect();
    sorted.sort_by(|a, b| compare_names(&a.name, &b.name));
    sorted
}

pub fn format_money(value: f64) -> String {
    format!("${value:.2}")
}

pub fn format_weight(value: f64) -> String {
    format!("{value:.2} kg")
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
    }

    fn material(id: i64, name: &str, weight: f64, price: f64) -> Material {
        Material { id, name: name.to_string(), weight, price_per_kg: price }
    }

    fn purchases() -> Vec<Purchase> {
        vec![
            Purchase::new(1, 1, at(1, 9), 1.0, 1.0),
            Purchase::new(2, 2, at(3, 9), 1.0, 1.0),
            Purchase::new(3, 1, at(2, 9), 1.0, 1.0),
            Purchase::new(4, 1, at(3, 9), 1.0, 1.0),
            Purchase::new(5, 7, at(5, 9), 1.0, 1.0),
        ]
    }

    fn ids(rows: &[HistoryRow<'_>]) -> Vec<i64> {
        rows.iter().map(|r| r.purchase.id).collect()
    }

    #[test]
    fn dashboard_skips_zero_weight() {
        let materials = vec![
            material(1, "Copper", 15.0, 6.0),
            material(2, "Tin", 0.0, 0.0),
            material(3, "Zinc", 2.0, 1.5),
        ];
        let cards = dashboard(&materials);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].name, "Copper");
        assert_eq!(cards[0].total_weight, 15.0);
        assert_eq!(cards[0].total_value, 90.0);
        assert_eq!(cards[0].average_price, 6.0);
        assert_eq!(cards[1].material_id, 3);
    }

    #[test]
    fn history_sorts_newest_first_and_keeps_ties_stable() {
        let materials = vec![material(1, "Copper", 0.0, 0.0), material(2, "Tin", 0.0, 0.0)];
        let all = purchases();
        let rows = history(&all, &materials, &PurchaseFilter::default());
        assert_eq!(ids(&rows), vec![5, 2, 4, 3, 1]);
    }

    #[test]
    fn history_date_range_is_inclusive() {
        let all = purchases();
        let filter = PurchaseFilter { start: Some(at(2, 9)), end: Some(at(3, 9)), material_id: None };
        let rows = history(&all, &[], &filter);
        assert_eq!(ids(&rows), vec![2, 4, 3]);
        for row in &rows {
            assert!(row.purchase.date >= at(2, 9) && row.purchase.date <= at(3, 9));
        }
    }

    #[test]
    fn history_open_bounds() {
        let all = purchases();
        let only_start = PurchaseFilter { start: Some(at(3, 9)), ..Default::default() };
        assert_eq!(ids(&history(&all, &[], &only_start)), vec![5, 2, 4]);

        let only_end = PurchaseFilter { end: Some(at(2, 9)), ..Default::default() };
        assert_eq!(ids(&history(&all, &[], &only_end)), vec![3, 1]);
    }

    #[test]
    fn history_filters_by_material() {
        let all = purchases();
        let filter = PurchaseFilter { material_id: Some(1), ..Default::default() };
        assert_eq!(ids(&history(&all, &[], &filter)), vec![4, 3, 1]);
    }

    #[test]
    fn history_leaves_orphan_names_empty() {
        let materials = vec![material(1, "Copper", 0.0, 0.0)];
        let all = purchases();
        let rows = history(&all, &materials, &PurchaseFilter::default());
        assert_eq!(rows[0].purchase.id, 5);
        assert_eq!(rows[0].material_name, None);
        assert_eq!(rows[2].material_name, Some("Copper"));
    }

    #[test]
    fn materials_sort_case_insensitively() {
        let materials = vec![
            material(1, "zinc", 0.0, 0.0),
            material(2, "Brass", 0.0, 0.0),
            material(3, "aluminium", 0.0, 0.0),
            material(4, "brass", 0.0, 0.0),
        ];
        let names: Vec<&str> = sorted_materials(&materials).into_iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["aluminium", "Brass", "brass", "zinc"]);
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let materials = vec![
            material(1, "Zinco", 0.0, 0.0),
            material(2, "Água", 0.0, 0.0),
            material(3, "Bronze", 0.0, 0.0),
            material(4, "Alumínio", 0.0, 0.0),
            material(5, "Aluminio", 0.0, 0.0),
        ];
        let names: Vec<&str> = sorted_materials(&materials).into_iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Água", "Aluminio", "Alumínio", "Bronze", "Zinco"]);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_money(90.0), "$90.00");
        assert_eq!(format_weight(2.346), "2.35 kg");
        assert_eq!(format_date(&at(3, 9)), "03/06/2024, 09:00:00");
    }
}
