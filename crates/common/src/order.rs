//! Member orders and the supplier purchase orders built from them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ingredient::{Ingredient, UnitSize};

/// A member's finalized purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrder {
    pub id: u64,

    /// Member who placed the order
    pub member_id: String,

    /// Where the confirmation was sent, if anywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Line items in cart order
    pub item_ids: Vec<u64>,
}

impl UserOrder {
    pub fn new(id: u64, member_id: String, email: Option<String>) -> Self {
        Self {
            id,
            member_id,
            email,
            created_at: Utc::now(),
            item_ids: Vec::new(),
        }
    }
}

/// One ingredient line of a member order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: u64,
    pub order_id: u64,
    pub ingredient_id: u64,
    pub ingredient_name: String,
    pub quantity: u32,

    /// Supplier order that claimed this item; `None` while awaiting aggregation
    pub supplier_order_id: Option<u64>,
}

impl OrderItem {
    pub fn is_unassigned(&self) -> bool {
        self.supplier_order_id.is_none()
    }
}

/// Supplier order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierOrderStatus {
    /// Still collecting member items
    Pending,
    /// Sent to the supplier
    Ordered,
    /// Delivered to the club
    Received,
    Cancelled,
}

impl SupplierOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierOrderStatus::Pending => "pending",
            SupplierOrderStatus::Ordered => "ordered",
            SupplierOrderStatus::Received => "received",
            SupplierOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether moving to `next` is allowed. Orders only move forward.
    pub fn can_transition_to(&self, next: SupplierOrderStatus) -> bool {
        use SupplierOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Ordered) | (Pending, Cancelled) | (Ordered, Received) | (Ordered, Cancelled)
        )
    }
}

impl fmt::Display for SupplierOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupplierOrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SupplierOrderStatus::Pending),
            "ordered" => Ok(SupplierOrderStatus::Ordered),
            "received" => Ok(SupplierOrderStatus::Received),
            "cancelled" => Ok(SupplierOrderStatus::Cancelled),
            other => Err(Error::Conflict(format!("unknown status: {}", other))),
        }
    }
}

/// A supplier-scoped purchase order aggregated from member order items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierOrder {
    pub id: u64,
    pub supplier: String,
    pub status: SupplierOrderStatus,
    pub created_at: DateTime<Utc>,
}

impl SupplierOrder {
    pub fn new(id: u64, supplier: String) -> Self {
        Self {
            id,
            supplier,
            status: SupplierOrderStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Per-ingredient totals of a supplier order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub ingredient_name: String,
    pub unit_size: UnitSize,
    /// Summed across members, so wider than a single item's quantity
    pub quantity: u64,
    pub total_cost: Decimal,
}

impl SummaryLine {
    /// Quantity in the ingredient's unit, e.g. "5 sacks"
    pub fn humanized_quantity(&self) -> String {
        self.unit_size.humanize(self.quantity)
    }
}

/// Group claimed items by ingredient name, summing quantity and cost.
/// Lines come back sorted by ingredient name.
pub fn summarize<'a, I>(items: I) -> Vec<SummaryLine>
where
    I: IntoIterator<Item = (&'a OrderItem, &'a Ingredient)>,
{
    let mut lines: BTreeMap<&str, SummaryLine> = BTreeMap::new();

    for (item, ingredient) in items {
        let line = lines
            .entry(ingredient.name.as_str())
            .or_insert_with(|| SummaryLine {
                ingredient_name: ingredient.name.clone(),
                unit_size: ingredient.unit_size,
                quantity: 0,
                total_cost: Decimal::ZERO,
            });
        line.quantity += u64::from(item.quantity);
        line.total_cost += Decimal::from(item.quantity) * ingredient.unit_cost;
    }

    lines.into_values().collect()
}

/// Sum of an order's line costs, excluding GST
pub fn order_total<'a, I>(items: I) -> Decimal
where
    I: IntoIterator<Item = (&'a OrderItem, &'a Ingredient)>,
{
    items
        .into_iter()
        .map(|(item, ingredient)| Decimal::from(item.quantity) * ingredient.unit_cost)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredient::IngredientKind;

    fn munich() -> Ingredient {
        Ingredient {
            id: 1,
            name: "Munich".to_string(),
            kind: IngredientKind::Grain,
            unit_cost: Decimal::new(125, 1),
            unit_size: UnitSize::Sack,
            supplier: "Gladfields".to_string(),
        }
    }

    fn pilsner() -> Ingredient {
        Ingredient {
            id: 2,
            name: "Pilsner".to_string(),
            kind: IngredientKind::Grain,
            unit_cost: Decimal::new(60, 0),
            unit_size: UnitSize::Sack,
            supplier: "Gladfields".to_string(),
        }
    }

    fn item(id: u64, ingredient: &Ingredient, quantity: u32) -> OrderItem {
        OrderItem {
            id,
            order_id: id,
            ingredient_id: ingredient.id,
            ingredient_name: ingredient.name.clone(),
            quantity,
            supplier_order_id: Some(1),
        }
    }

    #[test]
    fn test_summarize_groups_by_ingredient() {
        let munich = munich();
        let pilsner = pilsner();
        let items = vec![
            item(1, &pilsner, 1),
            item(2, &munich, 3),
            item(3, &munich, 2),
        ];

        let summary = summarize(items.iter().map(|i| {
            let ingredient = if i.ingredient_id == munich.id { &munich } else { &pilsner };
            (i, ingredient)
        }));

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].ingredient_name, "Munich");
        assert_eq!(summary[0].quantity, 5);
        assert_eq!(summary[0].total_cost, Decimal::new(625, 1));
        assert_eq!(summary[0].humanized_quantity(), "5 sacks");
        assert_eq!(summary[1].ingredient_name, "Pilsner");
        assert_eq!(summary[1].humanized_quantity(), "1 sack");
    }

    #[test]
    fn test_summarize_quantities_beyond_one_item() {
        let munich = munich();
        let items = vec![item(1, &munich, u32::MAX), item(2, &munich, u32::MAX)];

        let summary = summarize(items.iter().map(|i| (i, &munich)));

        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].quantity, 2 * u64::from(u32::MAX));
        assert_eq!(summary[0].humanized_quantity(), "8589934590 sacks");
        assert_eq!(
            summary[0].total_cost,
            Decimal::from(2 * u64::from(u32::MAX)) * Decimal::new(125, 1)
        );
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(std::iter::empty::<(&OrderItem, &Ingredient)>());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_order_total() {
        let munich = munich();
        let pilsner = pilsner();
        let a = item(1, &munich, 2);
        let b = item(2, &pilsner, 1);
        let total = order_total(vec![(&a, &munich), (&b, &pilsner)]);
        assert_eq!(total, Decimal::new(85, 0));
    }

    #[test]
    fn test_status_transitions() {
        use SupplierOrderStatus::*;
        assert!(Pending.can_transition_to(Ordered));
        assert!(Ordered.can_transition_to(Received));
        assert!(!Received.can_transition_to(Pending));
        assert!(!Ordered.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert_eq!("ordered".parse::<SupplierOrderStatus>().unwrap(), Ordered);
    }
}
