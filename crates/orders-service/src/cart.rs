//! Session cart: ingredient name -> requested quantity, scoped to a session id

use anyhow::Result;
use brewclub_common::{add_gst, Error, Ingredient, IngredientKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::models::CartItemInput;
use crate::storage::Storage;

/// Cart contents as persisted in the session store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    entries: BTreeMap<String, u32>,
}

impl Cart {
    /// Accumulate `quantity` onto whatever is already in the cart.
    /// A total that does not fit leaves the cart unchanged.
    pub fn add(&mut self, ingredient_name: &str, quantity: u32) -> brewclub_common::Result<()> {
        let current = self.quantity(ingredient_name).unwrap_or(0);
        let total = current.checked_add(quantity).ok_or_else(|| {
            Error::InvalidQuantity(format!(
                "{} more {} on top of {} is too many",
                quantity, ingredient_name, current
            ))
        })?;
        self.entries.insert(ingredient_name.to_string(), total);
        Ok(())
    }

    pub fn remove(&mut self, ingredient_name: &str) -> bool {
        self.entries.remove(ingredient_name).is_some()
    }

    pub fn quantity(&self, ingredient_name: &str) -> Option<u32> {
        self.entries.get(ingredient_name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, q)| (name.as_str(), *q))
    }
}

/// A validation failure on one submitted line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub index: usize,
    pub field: &'static str,
    pub message: String,
}

/// One cart entry joined with its catalog ingredient
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub ingredient_name: String,
    pub quantity: u32,

    /// `None` when the name no longer resolves to a catalog ingredient
    pub ingredient: Option<Ingredient>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total: Option<Decimal>,
}

/// The cart materialized for review and checkout
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub total_incl_gst: Decimal,
}

/// Parse a submitted quantity. Blank means zero; anything else must be a
/// non-negative whole number.
pub fn parse_quantity(raw: &serde_json::Value) -> std::result::Result<u32, String> {
    const MESSAGE: &str = "Enter a whole number of zero or more.";

    match raw {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|q| u32::try_from(q).ok())
            .ok_or_else(|| MESSAGE.to_string()),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(0),
        serde_json::Value::String(s) => s.trim().parse::<u32>().map_err(|_| MESSAGE.to_string()),
        _ => Err(MESSAGE.to_string()),
    }
}

/// Validate an ordering page submission against that page's catalog.
/// Returns the (name, quantity) pairs with a positive quantity.
pub fn validate_submission(
    kind: IngredientKind,
    catalog: &[Ingredient],
    items: &[CartItemInput],
) -> std::result::Result<Vec<(String, u32)>, Vec<FieldError>> {
    let mut accepted = Vec::new();
    let mut errors = Vec::new();

    for (index, item) in items.iter().enumerate() {
        if !catalog.iter().any(|i| i.name == item.ingredient_name) {
            errors.push(FieldError {
                index,
                field: "ingredient_name",
                message: format!("Unknown {}: {}", kind, item.ingredient_name),
            });
        }

        match parse_quantity(&item.quantity) {
            Ok(0) => {}
            Ok(quantity) => accepted.push((item.ingredient_name.clone(), quantity)),
            Err(message) => errors.push(FieldError {
                index,
                field: "quantity",
                message,
            }),
        }
    }

    if errors.is_empty() {
        Ok(accepted)
    } else {
        Err(errors)
    }
}

/// Add validated lines to the session's cart
pub async fn add_items(
    storage: &mut Storage,
    session_id: &str,
    lines: &[(String, u32)],
    ttl_secs: u64,
) -> brewclub_common::Result<Cart> {
    let mut cart = storage.load_cart(session_id).await?;
    if lines.is_empty() {
        return Ok(cart);
    }

    for (name, quantity) in lines {
        cart.add(name, *quantity)?;
        debug!("Cart {}: +{} {}", session_id, quantity, name);
    }
    storage.save_cart(session_id, &cart, ttl_secs).await?;

    info!("Added {} line(s) to cart {}", lines.len(), session_id);
    Ok(cart)
}

/// Remove an ingredient from the cart by catalog id. Missing, malformed or
/// unknown ids are logged and otherwise ignored.
pub async fn remove_item(
    storage: &mut Storage,
    session_id: &str,
    raw_id: Option<&serde_json::Value>,
    ttl_secs: u64,
) -> Result<Cart> {
    let mut cart = storage.load_cart(session_id).await?;

    let Some(raw_id) = raw_id else {
        error!("cart delete: no ingredient_id in request for session {}", session_id);
        return Ok(cart);
    };

    let id = match raw_id {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    let Some(id) = id else {
        warn!("cart delete: malformed ingredient_id {}", raw_id);
        return Ok(cart);
    };

    let Some(ingredient) = storage.get_ingredient(id).await? else {
        warn!("cart delete: no ingredient with id {}", id);
        return Ok(cart);
    };

    if cart.remove(&ingredient.name) {
        storage.save_cart(session_id, &cart, ttl_secs).await?;
        info!("Removed {} from cart {}", ingredient.name, session_id);
    } else {
        debug!("cart delete: {} not in cart {}", ingredient.name, session_id);
    }

    Ok(cart)
}

/// Join cart entries with their ingredients
pub async fn view(storage: &mut Storage, cart: &Cart) -> Result<CartView> {
    let mut lines = Vec::with_capacity(cart.len());
    let mut total = Decimal::ZERO;

    for (name, quantity) in cart.iter() {
        let ingredient = storage.get_ingredient_by_name(name).await?;
        let line_total = ingredient
            .as_ref()
            .map(|i| Decimal::from(quantity) * i.unit_cost);
        total += line_total.unwrap_or_default();

        lines.push(CartLine {
            ingredient_name: name.to_string(),
            quantity,
            ingredient,
            line_total,
        });
    }

    Ok(CartView {
        lines,
        total,
        total_incl_gst: add_gst(total),
    })
}
