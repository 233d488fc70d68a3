//! Catalog types: suppliers and the ingredients they sell

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A supplier the club buys ingredients from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    /// Unique supplier name
    pub name: String,

    /// When the supplier was added
    pub created_at: DateTime<Utc>,
}

impl Supplier {
    pub fn new(name: String) -> Self {
        Self {
            name,
            created_at: Utc::now(),
        }
    }
}

/// Catalog model an ingredient belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientKind {
    Grain,
    Hop,
}

impl IngredientKind {
    pub const ALL: [IngredientKind; 2] = [IngredientKind::Grain, IngredientKind::Hop];

    /// Model name used by the import endpoint
    pub fn model_name(&self) -> &'static str {
        match self {
            IngredientKind::Grain => "grain",
            IngredientKind::Hop => "hop",
        }
    }

    /// Path segment of the ordering page
    pub fn slug(&self) -> &'static str {
        match self {
            IngredientKind::Grain => "grains",
            IngredientKind::Hop => "hops",
        }
    }

    /// Page title
    pub fn title(&self) -> &'static str {
        match self {
            IngredientKind::Grain => "Grains",
            IngredientKind::Hop => "Hops",
        }
    }

    /// Resolve an ordering page slug (`grains`, `hops`)
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slug() == slug)
    }
}

impl fmt::Display for IngredientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

impl FromStr for IngredientKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.model_name() == s)
            .ok_or_else(|| Error::UnknownModel(s.to_string()))
    }
}

/// Unit an ingredient is sold in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSize {
    /// A 25kg sack of grain
    #[serde(rename = "sack")]
    Sack,

    #[serde(rename = "kg")]
    Kilogram,

    /// A 100g bag of hops
    #[serde(rename = "100g")]
    HundredGrams,
}

impl UnitSize {
    pub fn code(&self) -> &'static str {
        match self {
            UnitSize::Sack => "sack",
            UnitSize::Kilogram => "kg",
            UnitSize::HundredGrams => "100g",
        }
    }

    /// Render a quantity of this unit for people, e.g. "5 sacks" or "1 sack"
    pub fn humanize(&self, quantity: u64) -> String {
        match self {
            UnitSize::Sack if quantity == 1 => "1 sack".to_string(),
            UnitSize::Sack => format!("{} sacks", quantity),
            UnitSize::Kilogram => format!("{} kg", quantity),
            UnitSize::HundredGrams => format!("{} x 100g", quantity),
        }
    }
}

impl fmt::Display for UnitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for UnitSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sack" => Ok(UnitSize::Sack),
            "kg" => Ok(UnitSize::Kilogram),
            "100g" => Ok(UnitSize::HundredGrams),
            _ => Err(Error::UnknownUnitSize(s.to_string())),
        }
    }
}

/// A purchasable catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: u64,

    /// Unique ingredient name, also the cart key
    pub name: String,

    pub kind: IngredientKind,

    /// Cost of one unit, excluding GST
    pub unit_cost: Decimal,

    pub unit_size: UnitSize,

    /// Name of the supplier selling this ingredient
    pub supplier: String,
}

/// An ingredient that has been validated but not yet stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub kind: IngredientKind,
    pub unit_cost: Decimal,
    pub unit_size: UnitSize,
    pub supplier: String,
}

impl NewIngredient {
    /// Model-level validation, applied before anything is persisted
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidIngredient("name must not be empty".to_string()));
        }
        if self.unit_cost.is_sign_negative() {
            return Err(Error::InvalidUnitCost(format!(
                "{} is negative",
                self.unit_cost
            )));
        }
        if self.supplier.trim().is_empty() {
            return Err(Error::InvalidIngredient(
                "supplier must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_ingredient(self, id: u64) -> Ingredient {
        Ingredient {
            id,
            name: self.name,
            kind: self.kind,
            unit_cost: self.unit_cost,
            unit_size: self.unit_size,
            supplier: self.supplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_sacks() {
        assert_eq!(UnitSize::Sack.humanize(1), "1 sack");
        assert_eq!(UnitSize::Sack.humanize(5), "5 sacks");
        assert_eq!(UnitSize::Sack.humanize(0), "0 sacks");
    }

    #[test]
    fn test_humanize_other_units() {
        assert_eq!(UnitSize::Kilogram.humanize(3), "3 kg");
        assert_eq!(UnitSize::HundredGrams.humanize(1), "1 x 100g");
    }

    #[test]
    fn test_unit_size_parse() {
        assert_eq!("sack".parse::<UnitSize>().unwrap(), UnitSize::Sack);
        assert_eq!(" 100G ".parse::<UnitSize>().unwrap(), UnitSize::HundredGrams);
        assert!(matches!(
            "bucket".parse::<UnitSize>(),
            Err(Error::UnknownUnitSize(_))
        ));
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!("hop".parse::<IngredientKind>().unwrap(), IngredientKind::Hop);
        assert_eq!(IngredientKind::from_slug("grains"), Some(IngredientKind::Grain));
        assert!(IngredientKind::from_slug("yeast").is_none());
        assert!(matches!(
            "yeast".parse::<IngredientKind>(),
            Err(Error::UnknownModel(_))
        ));
    }

    #[test]
    fn test_new_ingredient_validation() {
        let mut munich = NewIngredient {
            name: "Munich".to_string(),
            kind: IngredientKind::Grain,
            unit_cost: Decimal::new(125, 1),
            unit_size: UnitSize::Sack,
            supplier: "Gladfields".to_string(),
        };
        assert!(munich.validate().is_ok());

        munich.unit_cost = Decimal::new(-1, 0);
        assert!(matches!(munich.validate(), Err(Error::InvalidUnitCost(_))));

        munich.unit_cost = Decimal::ONE;
        munich.name = "  ".to_string();
        assert!(matches!(munich.validate(), Err(Error::InvalidIngredient(_))));
    }
}
