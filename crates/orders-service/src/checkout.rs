//! Order submission: turn a session cart into a persisted member order

use brewclub_common::{
    add_gst, order_total, Error, Ingredient, InvalidLine, OrderItem, Result, UserOrder,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cart::Cart;
use crate::notifier::{ConfirmationTemplate, Notifier};
use crate::session::Member;
use crate::storage::Storage;

/// A member order with its lines resolved
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: UserOrder,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub total_incl_gst: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub item: OrderItem,
    pub ingredient: Option<Ingredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total: Option<Decimal>,
}

/// Check out the session's cart for `member`.
///
/// Either the order and all of its items are persisted and the cart is
/// cleared, or nothing is persisted and the cart is left as it was.
pub async fn checkout(
    storage: &mut Storage,
    notifier: &dyn Notifier,
    template: &ConfirmationTemplate,
    session_id: &str,
    member: &Member,
) -> Result<UserOrder> {
    let cart = storage.load_cart(session_id).await?;

    let order_id = storage.next_user_order_id().await?;
    let mut order = UserOrder::new(order_id, member.id.clone(), member.email.clone());
    storage.put_user_order(&order).await?;

    let lines = match resolve_lines(storage, &cart).await {
        Ok(lines) => lines,
        Err(e) => {
            roll_back(storage, &order).await;
            return Err(e);
        }
    };

    if let Err(e) = persist_items(storage, &mut order, &lines).await {
        roll_back(storage, &order).await;
        return Err(e.into());
    }

    // The order is committed at this point
    if let Err(e) = storage.clear_cart(session_id).await {
        error!("Order {} placed but cart {} not cleared: {:#}", order.id, session_id, e);
    }
    info!(
        "Order {} placed by {} with {} item(s)",
        order.id,
        member.id,
        order.item_ids.len()
    );

    let total = order_total(lines.iter().map(|(item, ingredient)| (item, ingredient)));
    notify(notifier, template, &order, total).await;

    Ok(order)
}

/// Resolve every cart line against the catalog, collecting all offending lines
async fn resolve_lines(storage: &mut Storage, cart: &Cart) -> Result<Vec<(OrderItem, Ingredient)>> {
    let mut lines = Vec::with_capacity(cart.len());
    let mut invalid = Vec::new();

    for (name, quantity) in cart.iter() {
        let ingredient = storage.get_ingredient_by_name(name).await?;
        match ingredient {
            None => invalid.push(InvalidLine {
                ingredient_name: name.to_string(),
                reason: "No such ingredient".to_string(),
            }),
            Some(_) if quantity == 0 => invalid.push(InvalidLine {
                ingredient_name: name.to_string(),
                reason: "Quantity must be at least 1".to_string(),
            }),
            Some(ingredient) => {
                let item = OrderItem {
                    id: 0,
                    order_id: 0,
                    ingredient_id: ingredient.id,
                    ingredient_name: ingredient.name.clone(),
                    quantity,
                    supplier_order_id: None,
                };
                lines.push((item, ingredient));
            }
        }
    }

    if invalid.is_empty() {
        Ok(lines)
    } else {
        Err(Error::InvalidOrder(invalid))
    }
}

async fn persist_items(
    storage: &mut Storage,
    order: &mut UserOrder,
    lines: &[(OrderItem, Ingredient)],
) -> anyhow::Result<()> {
    for (item, _) in lines {
        let item = OrderItem {
            id: storage.next_order_item_id().await?,
            order_id: order.id,
            ..item.clone()
        };
        order.item_ids.push(item.id);
        storage.put_order_item(&item).await?;
    }
    storage.put_user_order(order).await
}

/// Remove a partially created order and whatever items it got
async fn roll_back(storage: &mut Storage, order: &UserOrder) {
    for item_id in &order.item_ids {
        if let Err(e) = storage.delete_order_item(*item_id).await {
            error!("Failed to roll back item {} of order {}: {}", item_id, order.id, e);
        }
    }
    match storage.delete_user_order(order.id).await {
        Ok(_) => warn!("Rolled back order {}", order.id),
        Err(e) => error!("Failed to roll back order {}: {}", order.id, e),
    }
}

async fn notify(
    notifier: &dyn Notifier,
    template: &ConfirmationTemplate,
    order: &UserOrder,
    total: Decimal,
) {
    let Some(email) = &order.email else {
        return;
    };

    let confirmation = template.render(email, order.id, add_gst(total));
    if let Err(e) = notifier.send(&confirmation).await {
        warn!("Failed to send confirmation for order {}: {}", order.id, e);
    }
}

/// Load a member's own order. Other members' orders are reported as missing.
pub async fn order_detail(storage: &mut Storage, order_id: u64, member: &Member) -> Result<OrderDetail> {
    let order = storage
        .get_user_order(order_id)
        .await?
        .filter(|o| o.member_id == member.id)
        .ok_or_else(|| Error::NotFound(format!("Order {}", order_id)))?;

    let mut lines = Vec::with_capacity(order.item_ids.len());
    let mut total = Decimal::ZERO;
    for item_id in &order.item_ids {
        let Some(item) = storage.get_order_item(*item_id).await? else {
            warn!("Order {} references missing item {}", order.id, item_id);
            continue;
        };
        let ingredient = storage.get_ingredient(item.ingredient_id).await?;
        let line_total = ingredient
            .as_ref()
            .map(|i| Decimal::from(item.quantity) * i.unit_cost);
        total += line_total.unwrap_or_default();
        lines.push(OrderLine {
            item,
            ingredient,
            line_total,
        });
    }

    Ok(OrderDetail {
        order,
        lines,
        total,
        total_incl_gst: add_gst(total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use brewclub_common::{IngredientKind, NewIngredient, UnitSize};
    use std::sync::Mutex;

    use crate::backend::faulty::FaultyBackend;
    use crate::cart::add_items;
    use crate::notifier::OrderConfirmation;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<OrderConfirmation>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, confirmation: &OrderConfirmation) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(confirmation.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _confirmation: &OrderConfirmation) -> anyhow::Result<()> {
            Err(anyhow!("SMTP is down"))
        }
    }

    fn member() -> Member {
        Member {
            id: "temporary".to_string(),
            email: Some("temporary@gmail.com".to_string()),
        }
    }

    async fn seeded_storage() -> Storage {
        let mut storage = Storage::in_memory();
        for (name, kind, cost, size, supplier) in [
            ("Munich", IngredientKind::Grain, Decimal::new(125, 1), UnitSize::Sack, "Gladfields"),
            ("Nelson Sauvin", IngredientKind::Hop, Decimal::new(4, 0), UnitSize::HundredGrams, "NZ Hops"),
        ] {
            storage
                .create_ingredient(NewIngredient {
                    name: name.to_string(),
                    kind,
                    unit_cost: cost,
                    unit_size: size,
                    supplier: supplier.to_string(),
                })
                .await
                .unwrap()
                .unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_checkout_persists_order_and_clears_cart() {
        let mut storage = seeded_storage().await;
        let notifier = RecordingNotifier::default();
        add_items(
            &mut storage,
            "s1",
            &[("Munich".to_string(), 5), ("Nelson Sauvin".to_string(), 2)],
            60,
        )
        .await
        .unwrap();

        let order = checkout(&mut storage, &notifier, &ConfirmationTemplate::default(), "s1", &member())
            .await
            .unwrap();

        assert_eq!(order.item_ids.len(), 2);
        assert_eq!(storage.count_user_orders().await.unwrap(), 1);
        assert!(storage.load_cart("s1").await.unwrap().is_empty());
        assert_eq!(storage.unassigned_item_ids().await.unwrap().len(), 2);

        let detail = order_detail(&mut storage, order.id, &member()).await.unwrap();
        // 5 x 12.5 + 2 x 4 = 70.5; incl. GST 81.075
        assert_eq!(detail.total, Decimal::new(705, 1));
        assert_eq!(detail.total_incl_gst, Decimal::new(8108, 2));

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, format!("Your UCBC Order #{}", order.id));
        assert!(sent[0].body.contains("$81.08"));
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_creates_empty_order() {
        let mut storage = seeded_storage().await;

        let order = checkout(&mut storage, &FailingNotifier, &ConfirmationTemplate::default(), "s1", &member())
            .await
            .unwrap();

        assert!(order.item_ids.is_empty());
        assert_eq!(storage.count_user_orders().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_checkout_with_invalid_line_persists_nothing() {
        let mut storage = seeded_storage().await;
        let mut cart = Cart::default();
        cart.add("Munich", 5).unwrap();
        cart.add("Gone Malt", 1).unwrap();
        storage.save_cart("s1", &cart, 60).await.unwrap();

        let result = checkout(
            &mut storage,
            &RecordingNotifier::default(),
            &ConfirmationTemplate::default(),
            "s1",
            &member(),
        )
        .await;

        match result {
            Err(Error::InvalidOrder(lines)) => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].ingredient_name, "Gone Malt");
            }
            other => panic!("expected invalid order, got {:?}", other),
        }
        assert_eq!(storage.count_user_orders().await.unwrap(), 0);
        assert!(storage.unassigned_item_ids().await.unwrap().is_empty());
        assert_eq!(storage.load_cart("s1").await.unwrap(), cart);
    }

    #[tokio::test]
    async fn test_checkout_rejects_zero_quantity_line() {
        let mut storage = seeded_storage().await;
        let mut cart = Cart::default();
        cart.add("Munich", 0).unwrap();
        storage.save_cart("s1", &cart, 60).await.unwrap();

        let result = checkout(
            &mut storage,
            &RecordingNotifier::default(),
            &ConfirmationTemplate::default(),
            "s1",
            &member(),
        )
        .await;

        match result {
            Err(Error::InvalidOrder(lines)) => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].ingredient_name, "Munich");
                assert!(lines[0].reason.contains("Quantity"));
            }
            other => panic!("expected invalid order, got {:?}", other),
        }
        assert_eq!(storage.count_user_orders().await.unwrap(), 0);
        assert!(storage.unassigned_item_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_succeeds_when_cart_clear_fails() {
        let mut storage = Storage::with_backend(Box::new(FaultyBackend::new("del", "cart:", 1)));
        storage
            .create_ingredient(NewIngredient {
                name: "Munich".to_string(),
                kind: IngredientKind::Grain,
                unit_cost: Decimal::new(125, 1),
                unit_size: UnitSize::Sack,
                supplier: "Gladfields".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        add_items(&mut storage, "s1", &[("Munich".to_string(), 2)], 60)
            .await
            .unwrap();

        let order = checkout(&mut storage, &FailingNotifier, &ConfirmationTemplate::default(), "s1", &member())
            .await
            .unwrap();

        assert_eq!(order.item_ids.len(), 1);
        assert_eq!(storage.count_user_orders().await.unwrap(), 1);
        assert_eq!(storage.load_cart("s1").await.unwrap().quantity("Munich"), Some(2));
    }

    #[tokio::test]
    async fn test_checkout_survives_notification_failure() {
        let mut storage = seeded_storage().await;
        add_items(&mut storage, "s1", &[("Munich".to_string(), 1)], 60)
            .await
            .unwrap();

        let order = checkout(&mut storage, &FailingNotifier, &ConfirmationTemplate::default(), "s1", &member())
            .await
            .unwrap();
        assert_eq!(order.item_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_order_detail_is_private() {
        let mut storage = seeded_storage().await;
        let order = checkout(&mut storage, &FailingNotifier, &ConfirmationTemplate::default(), "s1", &member())
            .await
            .unwrap();

        let stranger = Member {
            id: "someone-else".to_string(),
            email: None,
        };
        assert!(matches!(
            order_detail(&mut storage, order.id, &stranger).await,
            Err(Error::NotFound(_))
        ));
    }
}
