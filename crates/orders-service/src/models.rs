//! Request and response bodies for the orders API

use brewclub_common::{Ingredient, IngredientKind, Supplier, SupplierOrder, UnitSize};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregationReport, SupplierOrderDetail};
use crate::cart::CartView;

/// One line of an ordering page submission.
///
/// The quantity is kept raw so blank, numeric and malformed input can be
/// told apart during validation.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItemInput {
    pub ingredient_name: String,
    #[serde(default)]
    pub quantity: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    #[serde(default)]
    pub items: Vec<CartItemInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartDeleteRequest {
    pub ingredient_id: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SuppliersListResponse {
    pub suppliers: Vec<Supplier>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub kind: IngredientKind,
    pub unit_cost: Decimal,
    pub unit_size: UnitSize,
    pub supplier: String,
}

#[derive(Debug, Serialize)]
pub struct IngredientResponse {
    pub ingredient: Ingredient,
}

/// A catalog ingredient offered on an ordering page
#[derive(Debug, Serialize)]
pub struct IngredientLine {
    pub ingredient_id: u64,
    pub ingredient_name: String,
    pub quantity: u32,
    pub unit_cost: Decimal,
    pub unit_size: UnitSize,
}

impl From<Ingredient> for IngredientLine {
    fn from(ingredient: Ingredient) -> Self {
        Self {
            ingredient_id: ingredient.id,
            ingredient_name: ingredient.name,
            quantity: 0,
            unit_cost: ingredient.unit_cost,
            unit_size: ingredient.unit_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPageResponse {
    pub kind: IngredientKind,
    pub title: &'static str,
    pub lines: Vec<IngredientLine>,
    pub cart: CartView,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: u64,
}

#[derive(Debug, Serialize)]
pub struct SupplierOrdersListResponse {
    pub aggregation: AggregationReport,
    pub orders: Vec<SupplierOrderDetail>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierOrderRequest {
    pub supplier: String,
    #[serde(default)]
    pub order_item_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SupplierOrderResponse {
    pub order: SupplierOrder,
}

/// Expected upload layout for a catalog model
#[derive(Debug, Serialize)]
pub struct ImportFormatResponse {
    pub model: String,
    pub columns: Vec<&'static str>,
    pub has_header: bool,
}
