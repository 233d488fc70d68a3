//! CSV import of catalog ingredients
//!
//! Rows are `name,unit_cost,unit_size,supplier_name` after a header row.
//! Each row stands alone: a bad row is logged and skipped, good rows are
//! stored as they are read.

use brewclub_common::{Error, Ingredient, IngredientKind, NewIngredient, Result, UnitSize};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, warn};

use crate::storage::Storage;

pub const COLUMNS: [&str; 4] = ["name", "unit_cost", "unit_size", "supplier_name"];

/// Catalog models that accept CSV imports, by model name
#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
    models: BTreeMap<String, IngredientKind>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grains and hops under their model names
    pub fn standard() -> Self {
        IngredientKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, kind| registry.register(kind.model_name(), kind))
    }

    pub fn register(mut self, model_name: &str, kind: IngredientKind) -> Self {
        self.models.insert(model_name.to_string(), kind);
        self
    }

    /// Checked once at startup
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.models.is_empty() {
            anyhow::bail!("No catalog models registered for import");
        }
        for (name, kind) in &self.models {
            if name.trim().is_empty() || name.chars().any(|c| c.is_whitespace() || c == '/') {
                anyhow::bail!("Invalid import model name: {:?}", name);
            }
            if IngredientKind::from_str(name).ok() != Some(*kind) {
                anyhow::bail!("Import model {} is registered as {}", name, kind);
            }
        }
        Ok(())
    }

    pub fn resolve(&self, model_name: &str) -> Result<IngredientKind> {
        self.models
            .get(model_name)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("Model {}", model_name)))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

/// A row that was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the upload, counting the header
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub model: IngredientKind,
    pub created: Vec<Ingredient>,
    pub skipped: Vec<SkippedRow>,
}

fn parse_row(kind: IngredientKind, record: &csv::StringRecord) -> Result<NewIngredient> {
    if record.len() < COLUMNS.len() {
        return Err(Error::InvalidIngredient(format!(
            "expected {} columns, found {}",
            COLUMNS.len(),
            record.len()
        )));
    }

    let unit_cost = Decimal::from_str(&record[1])
        .map_err(|_| Error::InvalidUnitCost(record[1].to_string()))?;

    Ok(NewIngredient {
        name: record[0].to_string(),
        kind,
        unit_cost,
        unit_size: UnitSize::from_str(&record[2])?,
        supplier: record[3].to_string(),
    })
}

/// Import ingredients of `kind` from CSV text
pub async fn import_csv(storage: &mut Storage, kind: IngredientKind, text: &str) -> Result<ImportReport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut report = ImportReport {
        model: kind,
        created: Vec::new(),
        skipped: Vec::new(),
    };

    for (index, record) in reader.records().enumerate() {
        let line = index + 2;

        let outcome = match record {
            Ok(record) => import_row(storage, kind, &record).await,
            Err(e) => Err(Error::InvalidIngredient(e.to_string())),
        };

        match outcome {
            Ok(ingredient) => report.created.push(ingredient),
            Err(Error::Other(e)) => return Err(Error::Other(e)),
            Err(e) => {
                warn!("Import of {} line {} skipped: {}", kind, line, e);
                report.skipped.push(SkippedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Imported {} {}(s), skipped {} row(s)",
        report.created.len(),
        kind,
        report.skipped.len()
    );
    Ok(report)
}

async fn import_row(
    storage: &mut Storage,
    kind: IngredientKind,
    record: &csv::StringRecord,
) -> Result<Ingredient> {
    let new = parse_row(kind, record)?;

    if storage.get_supplier(&new.supplier).await?.is_none() {
        return Err(Error::NotFound(format!("Supplier {}", new.supplier)));
    }
    new.validate()?;

    let name = new.name.clone();
    storage
        .create_ingredient(new)
        .await?
        .ok_or(Error::DuplicateIngredient(name))
}
