//! Typed persistence for the catalog, carts, member orders and supplier orders

use anyhow::{Context, Result};
use brewclub_common::{
    Ingredient, IngredientKind, NewIngredient, OrderItem, Supplier, SupplierOrder,
    SupplierOrderStatus, UserOrder,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{Backend, MemoryBackend, RedisBackend};
use crate::cart::Cart;

const SUPPLIERS: &str = "suppliers:all";
const INGREDIENT_IDS: &str = "ingredients:next_id";
const USER_ORDER_IDS: &str = "user_orders:next_id";
const USER_ORDERS: &str = "user_orders:all";
const ORDER_ITEM_IDS: &str = "order_items:next_id";
const UNASSIGNED_ITEMS: &str = "order_items:unassigned";
const SUPPLIER_ORDER_IDS: &str = "supplier_orders:next_id";
const SUPPLIER_ORDERS: &str = "supplier_orders:all";

/// Storage for everything the ordering workflow persists
pub struct Storage {
    backend: Box<dyn Backend>,
}

impl Storage {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let backend = RedisBackend::connect(redis_url).await?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    /// Process-local storage, lost on restart
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryBackend::new()))
    }

    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    async fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(data) => {
                let value = serde_json::from_str(&data)
                    .with_context(|| format!("Failed to deserialize {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize {}", key))?;
        self.backend.set(key, &json).await
    }

    async fn members_as_ids(&mut self, set: &str) -> Result<Vec<u64>> {
        let mut ids = self
            .backend
            .smembers(set)
            .await?
            .iter()
            .map(|m| m.parse::<u64>().with_context(|| format!("Bad id in {}: {}", set, m)))
            .collect::<Result<Vec<_>>>()?;
        ids.sort_unstable();
        Ok(ids)
    }

    // Suppliers

    /// Returns false if a supplier with that name already exists
    pub async fn create_supplier(&mut self, supplier: &Supplier) -> Result<bool> {
        let key = format!("supplier:{}", supplier.name);
        let json = serde_json::to_string(supplier).context("Failed to serialize supplier")?;

        if !self.backend.set_nx(&key, &json).await? {
            debug!("Supplier already exists: {}", supplier.name);
            return Ok(false);
        }
        self.backend.sadd(SUPPLIERS, &supplier.name).await?;

        info!("Created supplier: {}", supplier.name);
        Ok(true)
    }

    pub async fn get_supplier(&mut self, name: &str) -> Result<Option<Supplier>> {
        self.get_json(&format!("supplier:{}", name)).await
    }

    /// All suppliers, by name
    pub async fn list_suppliers(&mut self) -> Result<Vec<Supplier>> {
        let mut names = self.backend.smembers(SUPPLIERS).await?;
        names.sort();

        let mut suppliers = Vec::with_capacity(names.len());
        for name in names {
            if let Some(supplier) = self.get_supplier(&name).await? {
                suppliers.push(supplier);
            }
        }
        Ok(suppliers)
    }

    // Ingredients

    /// Persist a validated ingredient. Returns None if the name is taken.
    pub async fn create_ingredient(&mut self, new: NewIngredient) -> Result<Option<Ingredient>> {
        let id = self.backend.incr(INGREDIENT_IDS).await?;
        let name_key = format!("ingredient:name:{}", new.name);

        if !self.backend.set_nx(&name_key, &id.to_string()).await? {
            debug!("Ingredient name already taken: {}", new.name);
            return Ok(None);
        }

        let ingredient = new.into_ingredient(id);
        if let Err(e) = self
            .put_json(&format!("ingredient:{}", id), &ingredient)
            .await
        {
            self.backend.del(&name_key).await?;
            return Err(e);
        }
        if let Err(e) = self
            .backend
            .sadd(&format!("ingredients:{}", ingredient.kind), &id.to_string())
            .await
        {
            self.backend.del(&format!("ingredient:{}", id)).await?;
            self.backend.del(&name_key).await?;
            return Err(e);
        }

        info!(
            "Created {} {} (id {}) from {}",
            ingredient.kind, ingredient.name, ingredient.id, ingredient.supplier
        );
        Ok(Some(ingredient))
    }

    pub async fn get_ingredient(&mut self, id: u64) -> Result<Option<Ingredient>> {
        self.get_json(&format!("ingredient:{}", id)).await
    }

    pub async fn get_ingredient_by_name(&mut self, name: &str) -> Result<Option<Ingredient>> {
        let id = self.backend.get(&format!("ingredient:name:{}", name)).await?;
        match id {
            Some(id) => {
                let id = id
                    .parse::<u64>()
                    .with_context(|| format!("Bad ingredient id for {}: {}", name, id))?;
                self.get_ingredient(id).await
            }
            None => Ok(None),
        }
    }

    /// Ingredients of one catalog model, by name
    pub async fn list_ingredients(&mut self, kind: IngredientKind) -> Result<Vec<Ingredient>> {
        let ids = self.members_as_ids(&format!("ingredients:{}", kind)).await?;

        let mut ingredients = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(ingredient) = self.get_ingredient(id).await? {
                ingredients.push(ingredient);
            }
        }
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ingredients)
    }

    // Session carts

    pub async fn load_cart(&mut self, session_id: &str) -> Result<Cart> {
        Ok(self
            .get_json(&format!("cart:{}", session_id))
            .await?
            .unwrap_or_default())
    }

    /// Save a cart, restarting its expiry clock
    pub async fn save_cart(&mut self, session_id: &str, cart: &Cart, ttl_secs: u64) -> Result<()> {
        let json = serde_json::to_string(cart).context("Failed to serialize cart")?;
        self.backend
            .set_with_ttl(&format!("cart:{}", session_id), &json, ttl_secs)
            .await
    }

    pub async fn clear_cart(&mut self, session_id: &str) -> Result<()> {
        self.backend.del(&format!("cart:{}", session_id)).await?;
        Ok(())
    }

    // Member orders

    pub async fn next_user_order_id(&mut self) -> Result<u64> {
        self.backend.incr(USER_ORDER_IDS).await
    }

    pub async fn put_user_order(&mut self, order: &UserOrder) -> Result<()> {
        self.put_json(&format!("user_order:{}", order.id), order)
            .await?;
        self.backend.sadd(USER_ORDERS, &order.id.to_string()).await
    }

    pub async fn get_user_order(&mut self, id: u64) -> Result<Option<UserOrder>> {
        self.get_json(&format!("user_order:{}", id)).await
    }

    pub async fn delete_user_order(&mut self, id: u64) -> Result<bool> {
        let deleted = self.backend.del(&format!("user_order:{}", id)).await?;
        self.backend.srem(USER_ORDERS, &id.to_string()).await?;
        Ok(deleted)
    }

    pub async fn count_user_orders(&mut self) -> Result<usize> {
        Ok(self.backend.smembers(USER_ORDERS).await?.len())
    }

    pub async fn next_order_item_id(&mut self) -> Result<u64> {
        self.backend.incr(ORDER_ITEM_IDS).await
    }

    /// Store an order item, keeping the unassigned index in step with it
    pub async fn put_order_item(&mut self, item: &OrderItem) -> Result<()> {
        self.put_json(&format!("order_item:{}", item.id), item)
            .await?;

        let id = item.id.to_string();
        if item.is_unassigned() {
            self.backend.sadd(UNASSIGNED_ITEMS, &id).await
        } else {
            self.backend.srem(UNASSIGNED_ITEMS, &id).await
        }
    }

    pub async fn get_order_item(&mut self, id: u64) -> Result<Option<OrderItem>> {
        self.get_json(&format!("order_item:{}", id)).await
    }

    pub async fn delete_order_item(&mut self, id: u64) -> Result<bool> {
        let deleted = self.backend.del(&format!("order_item:{}", id)).await?;
        self.backend.srem(UNASSIGNED_ITEMS, &id.to_string()).await?;
        Ok(deleted)
    }

    /// Ids of items no supplier order has claimed yet
    pub async fn unassigned_item_ids(&mut self) -> Result<Vec<u64>> {
        self.members_as_ids(UNASSIGNED_ITEMS).await
    }

    // Supplier orders

    /// Find the supplier's pending aggregation target, creating it if needed.
    /// Returns the order and whether it was created.
    pub async fn get_or_create_pending_supplier_order(
        &mut self,
        supplier: &str,
    ) -> Result<(SupplierOrder, bool)> {
        let pointer = format!("supplier_order:pending:{}", supplier);

        if let Some(order) = self.pending_supplier_order(&pointer).await? {
            return Ok((order, false));
        }

        // Record first, pointer second: a pointer never names a missing order
        let id = self.backend.incr(SUPPLIER_ORDER_IDS).await?;
        let order = SupplierOrder::new(id, supplier.to_string());
        self.put_supplier_order(&order).await?;

        match self.backend.set_nx(&pointer, &id.to_string()).await {
            Ok(true) => {}
            Ok(false) => {
                // Lost the race to another pass; use the winner's order
                self.discard_supplier_order(id).await?;
                let order = self
                    .pending_supplier_order(&pointer)
                    .await?
                    .with_context(|| format!("Pending order for {} vanished", supplier))?;
                return Ok((order, false));
            }
            Err(e) => {
                if let Err(cleanup) = self.discard_supplier_order(id).await {
                    warn!("Failed to discard supplier order {}: {:#}", id, cleanup);
                }
                return Err(e);
            }
        }

        info!("Created pending supplier order {} for {}", id, supplier);
        Ok((order, true))
    }

    /// The order a pending pointer names. A pointer to a missing record is
    /// stale and gets dropped.
    async fn pending_supplier_order(&mut self, pointer: &str) -> Result<Option<SupplierOrder>> {
        let Some(id) = self.backend.get(pointer).await? else {
            return Ok(None);
        };
        let id = id
            .parse::<u64>()
            .with_context(|| format!("Bad supplier order id at {}: {}", pointer, id))?;

        match self.get_supplier_order(id).await? {
            Some(order) => Ok(Some(order)),
            None => {
                warn!("Dropping stale {} -> missing supplier order {}", pointer, id);
                self.backend.del(pointer).await?;
                Ok(None)
            }
        }
    }

    async fn discard_supplier_order(&mut self, id: u64) -> Result<()> {
        self.backend.del(&format!("supplier_order:{}", id)).await?;
        self.backend
            .srem(SUPPLIER_ORDERS, &id.to_string())
            .await
    }

    /// Create a supplier order that is not the supplier's aggregation target
    pub async fn create_supplier_order(&mut self, supplier: &str) -> Result<SupplierOrder> {
        let id = self.backend.incr(SUPPLIER_ORDER_IDS).await?;
        let order = SupplierOrder::new(id, supplier.to_string());
        self.put_supplier_order(&order).await?;

        info!("Created supplier order {} for {}", id, supplier);
        Ok(order)
    }

    pub async fn put_supplier_order(&mut self, order: &SupplierOrder) -> Result<()> {
        self.put_json(&format!("supplier_order:{}", order.id), order)
            .await?;
        self.backend
            .sadd(SUPPLIER_ORDERS, &order.id.to_string())
            .await
    }

    pub async fn get_supplier_order(&mut self, id: u64) -> Result<Option<SupplierOrder>> {
        self.get_json(&format!("supplier_order:{}", id)).await
    }

    /// Supplier orders, oldest first, optionally filtered by status
    pub async fn list_supplier_orders(
        &mut self,
        status: Option<SupplierOrderStatus>,
    ) -> Result<Vec<SupplierOrder>> {
        let ids = self.members_as_ids(SUPPLIER_ORDERS).await?;

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.get_supplier_order(id).await? {
                if status.map_or(true, |s| s == order.status) {
                    orders.push(order);
                }
            }
        }
        Ok(orders)
    }

    /// Stop routing new items to this order if it is the supplier's pending target
    pub async fn retire_pending_target(&mut self, order: &SupplierOrder) -> Result<()> {
        let pointer = format!("supplier_order:pending:{}", order.supplier);
        if self.backend.get(&pointer).await?.as_deref() == Some(order.id.to_string().as_str()) {
            self.backend.del(&pointer).await?;
            debug!("Retired supplier order {} as pending target", order.id);
        }
        Ok(())
    }

    /// Attach an unassigned item to a supplier order
    pub async fn claim_item(&mut self, order_id: u64, item: &mut OrderItem) -> Result<()> {
        item.supplier_order_id = Some(order_id);
        self.put_order_item(item).await?;
        self.backend
            .sadd(
                &format!("supplier_order:{}:items", order_id),
                &item.id.to_string(),
            )
            .await
    }

    /// Items claimed by a supplier order
    pub async fn supplier_order_items(&mut self, order_id: u64) -> Result<Vec<OrderItem>> {
        let ids = self
            .members_as_ids(&format!("supplier_order:{}:items", order_id))
            .await?;

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.get_order_item(id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::faulty::FaultyBackend;
    use brewclub_common::UnitSize;
    use rust_decimal::Decimal;

    fn munich() -> NewIngredient {
        NewIngredient {
            name: "Munich".to_string(),
            kind: IngredientKind::Grain,
            unit_cost: Decimal::new(125, 1),
            unit_size: UnitSize::Sack,
            supplier: "Gladfields".to_string(),
        }
    }

    #[tokio::test]
    async fn test_supplier_names_are_unique() {
        let mut storage = Storage::in_memory();

        assert!(storage
            .create_supplier(&Supplier::new("Gladfields".to_string()))
            .await
            .unwrap());
        assert!(!storage
            .create_supplier(&Supplier::new("Gladfields".to_string()))
            .await
            .unwrap());

        let suppliers = storage.list_suppliers().await.unwrap();
        assert_eq!(suppliers.len(), 1);
    }

    #[tokio::test]
    async fn test_ingredient_lookup_by_name_and_kind() {
        let mut storage = Storage::in_memory();

        let created = storage.create_ingredient(munich()).await.unwrap().unwrap();
        assert!(storage.create_ingredient(munich()).await.unwrap().is_none());

        let by_name = storage
            .get_ingredient_by_name("Munich")
            .await
            .unwrap()
            .expect("Ingredient not found");
        assert_eq!(by_name, created);

        assert_eq!(storage.list_ingredients(IngredientKind::Grain).await.unwrap().len(), 1);
        assert!(storage.list_ingredients(IngredientKind::Hop).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_supplier_order_get_or_create() {
        let mut storage = Storage::in_memory();

        let (first, created) = storage
            .get_or_create_pending_supplier_order("Gladfields")
            .await
            .unwrap();
        assert!(created);

        let (second, created) = storage
            .get_or_create_pending_supplier_order("Gladfields")
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        storage.retire_pending_target(&first).await.unwrap();
        let (third, created) = storage
            .get_or_create_pending_supplier_order("Gladfields")
            .await
            .unwrap();
        assert!(created);
        assert_ne!(first.id, third.id);
    }

    #[tokio::test]
    async fn test_stale_pending_pointer_is_replaced() {
        let mut backend = MemoryBackend::new();
        backend
            .set("supplier_order:pending:Gladfields", "99")
            .await
            .unwrap();
        let mut storage = Storage::with_backend(Box::new(backend));

        let (order, created) = storage
            .get_or_create_pending_supplier_order("Gladfields")
            .await
            .unwrap();
        assert!(created);
        assert_ne!(order.id, 99);

        let (again, created) = storage
            .get_or_create_pending_supplier_order("Gladfields")
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, order.id);
    }

    #[tokio::test]
    async fn test_failed_ingredient_index_releases_the_name() {
        let mut storage = Storage::with_backend(Box::new(FaultyBackend::new(
            "sadd",
            "ingredients:",
            1,
        )));

        assert!(storage.create_ingredient(munich()).await.is_err());
        assert!(storage.get_ingredient_by_name("Munich").await.unwrap().is_none());

        let created = storage
            .create_ingredient(munich())
            .await
            .unwrap()
            .expect("Name still reserved");
        assert_eq!(
            storage.list_ingredients(IngredientKind::Grain).await.unwrap(),
            vec![created]
        );
    }

    #[tokio::test]
    async fn test_unassigned_index_follows_claims() {
        let mut storage = Storage::in_memory();

        let mut item = OrderItem {
            id: storage.next_order_item_id().await.unwrap(),
            order_id: 1,
            ingredient_id: 1,
            ingredient_name: "Munich".to_string(),
            quantity: 5,
            supplier_order_id: None,
        };
        storage.put_order_item(&item).await.unwrap();
        assert_eq!(storage.unassigned_item_ids().await.unwrap(), vec![item.id]);

        storage.claim_item(7, &mut item).await.unwrap();
        assert!(storage.unassigned_item_ids().await.unwrap().is_empty());
        assert_eq!(storage.supplier_order_items(7).await.unwrap(), vec![item]);
    }
}
