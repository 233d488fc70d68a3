use thiserror::Error;

/// A cart line that could not be turned into an order item
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InvalidLine {
    pub ingredient_name: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid unit cost: {0}")]
    InvalidUnitCost(String),

    #[error("Unknown unit size: {0}")]
    UnknownUnitSize(String),

    #[error("Unknown catalog model: {0}")]
    UnknownModel(String),

    #[error("Invalid ingredient: {0}")]
    InvalidIngredient(String),

    #[error("Ingredient already exists: {0}")]
    DuplicateIngredient(String),

    #[error("Order has {} invalid line(s)", .0.len())]
    InvalidOrder(Vec<InvalidLine>),

    #[error("Sorry, we're not currently taking orders, keep an eye on our facebook page.")]
    OrdersDisabled,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the error was caused by bad client input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidQuantity(_)
                | Error::InvalidUnitCost(_)
                | Error::UnknownUnitSize(_)
                | Error::InvalidIngredient(_)
                | Error::InvalidOrder(_)
                | Error::OrdersDisabled
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
