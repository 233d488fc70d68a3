pub mod currency;
pub mod error;
pub mod ingredient;
pub mod order;

pub use currency::{add_gst, format_currency, GST_RATE};
pub use error::{Error, InvalidLine, Result};
pub use ingredient::{Ingredient, IngredientKind, NewIngredient, Supplier, UnitSize};
pub use order::{
    order_total, summarize, OrderItem, SummaryLine, SupplierOrder, SupplierOrderStatus, UserOrder,
};
