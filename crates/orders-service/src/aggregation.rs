//! Supplier order aggregation
//!
//! Every member order item starts unassigned. An aggregation pass routes each
//! unassigned item to its supplier's single pending supplier order. Items are
//! claimed at most once, so repeated passes are no-ops until new orders land.

use brewclub_common::{
    summarize, Error, Ingredient, OrderItem, Result, SummaryLine, SupplierOrder,
    SupplierOrderStatus,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::storage::Storage;

/// What an aggregation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    /// Supplier orders created by this pass
    pub created_orders: Vec<u64>,

    /// Number of items claimed by this pass
    pub claimed_items: usize,
}

/// A supplier order with its derived summary
#[derive(Debug, Clone, Serialize)]
pub struct SupplierOrderDetail {
    pub order: SupplierOrder,
    pub summary: Vec<SummaryLine>,
    pub total: Decimal,
}

/// Assign every unassigned item to its supplier's pending order
pub async fn aggregate(storage: &mut Storage) -> Result<AggregationReport> {
    let mut report = AggregationReport::default();
    let mut targets: HashMap<String, u64> = HashMap::new();

    for supplier in storage.list_suppliers().await? {
        let (order, created) = storage
            .get_or_create_pending_supplier_order(&supplier.name)
            .await?;
        if created {
            report.created_orders.push(order.id);
        }
        targets.insert(supplier.name, order.id);
    }

    for item_id in storage.unassigned_item_ids().await? {
        let Some(mut item) = storage.get_order_item(item_id).await? else {
            warn!("Unassigned index references missing item {}", item_id);
            continue;
        };
        if !item.is_unassigned() {
            continue;
        }

        let Some(ingredient) = storage.get_ingredient(item.ingredient_id).await? else {
            warn!(
                "Item {} references missing ingredient {}",
                item.id, item.ingredient_id
            );
            continue;
        };

        match targets.get(&ingredient.supplier) {
            Some(&order_id) => {
                storage.claim_item(order_id, &mut item).await?;
                report.claimed_items += 1;
                debug!("Supplier order {} claimed item {}", order_id, item.id);
            }
            None => debug!(
                "Item {} left unassigned: unknown supplier {}",
                item.id, ingredient.supplier
            ),
        }
    }

    info!(
        "Aggregation pass: {} supplier order(s) created, {} item(s) claimed",
        report.created_orders.len(),
        report.claimed_items
    );
    Ok(report)
}

/// Items of a supplier order joined with their ingredients
async fn claimed_lines(
    storage: &mut Storage,
    order_id: u64,
) -> Result<Vec<(OrderItem, Ingredient)>> {
    let mut lines = Vec::new();
    for item in storage.supplier_order_items(order_id).await? {
        match storage.get_ingredient(item.ingredient_id).await? {
            Some(ingredient) => lines.push((item, ingredient)),
            None => warn!(
                "Supplier order {} item {} references missing ingredient {}",
                order_id, item.id, item.ingredient_id
            ),
        }
    }
    Ok(lines)
}

pub async fn supplier_order_detail(storage: &mut Storage, id: u64) -> Result<SupplierOrderDetail> {
    let order = storage
        .get_supplier_order(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Supplier order {}", id)))?;
    detail_for(storage, order).await
}

async fn detail_for(storage: &mut Storage, order: SupplierOrder) -> Result<SupplierOrderDetail> {
    let lines = claimed_lines(storage, order.id).await?;
    let summary = summarize(lines.iter().map(|(item, ingredient)| (item, ingredient)));
    let total = summary.iter().map(|line| line.total_cost).sum();

    Ok(SupplierOrderDetail {
        order,
        summary,
        total,
    })
}

/// Pending supplier orders with their summaries
pub async fn pending_orders(storage: &mut Storage) -> Result<Vec<SupplierOrderDetail>> {
    let orders = storage
        .list_supplier_orders(Some(SupplierOrderStatus::Pending))
        .await?;

    let mut details = Vec::with_capacity(orders.len());
    for order in orders {
        details.push(detail_for(storage, order).await?);
    }
    Ok(details)
}

/// Create a supplier order by hand from chosen items.
///
/// Every item must exist, be unclaimed and be sold by `supplier`; nothing is
/// written unless all of them qualify.
pub async fn create_supplier_order(
    storage: &mut Storage,
    supplier: &str,
    item_ids: &[u64],
) -> Result<SupplierOrderDetail> {
    if storage.get_supplier(supplier).await?.is_none() {
        return Err(Error::NotFound(format!("Supplier {}", supplier)));
    }

    let mut items = Vec::with_capacity(item_ids.len());
    for &item_id in item_ids {
        let item = storage
            .get_order_item(item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Order item {}", item_id)))?;

        if let Some(claimed_by) = item.supplier_order_id {
            return Err(Error::Conflict(format!(
                "Order item {} already belongs to supplier order {}",
                item_id, claimed_by
            )));
        }

        let sold_by_supplier = storage
            .get_ingredient(item.ingredient_id)
            .await?
            .is_some_and(|i| i.supplier == supplier);
        if !sold_by_supplier {
            return Err(Error::InvalidIngredient(format!(
                "{} is not sold by {}",
                item.ingredient_name, supplier
            )));
        }
        items.push(item);
    }

    let order = storage.create_supplier_order(supplier).await?;
    for item in &mut items {
        storage.claim_item(order.id, item).await?;
    }

    info!(
        "Supplier order {} created for {} with {} item(s)",
        order.id,
        supplier,
        items.len()
    );
    detail_for(storage, order).await
}

/// Move a supplier order along its lifecycle
pub async fn update_status(
    storage: &mut Storage,
    id: u64,
    status: SupplierOrderStatus,
) -> Result<SupplierOrder> {
    let mut order = storage
        .get_supplier_order(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Supplier order {}", id)))?;

    if !order.status.can_transition_to(status) {
        return Err(Error::Conflict(format!(
            "Supplier order {} cannot go from {} to {}",
            id, order.status, status
        )));
    }

    if order.status == SupplierOrderStatus::Pending {
        storage.retire_pending_target(&order).await?;
    }
    order.status = status;
    storage.put_supplier_order(&order).await?;

    info!("Supplier order {} is now {}", id, status);
    Ok(order)
}
