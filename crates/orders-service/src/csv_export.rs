//! CSV export of a supplier order summary

use anyhow::Context;
use brewclub_common::{Result, SummaryLine};

use crate::aggregation::supplier_order_detail;
use crate::storage::Storage;

pub const HEADER: [&str; 2] = ["Name", "Quantity"];

/// Write summary lines as `Name,Quantity` rows with humanized quantities
pub fn write_summary(summary: &[SummaryLine]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for line in summary {
        let quantity = line.humanized_quantity();
        writer.write_record([line.ingredient_name.as_str(), quantity.as_str()])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// Export a supplier order. Unknown ids are `NotFound`.
pub async fn export_supplier_order(storage: &mut Storage, id: u64) -> Result<String> {
    let detail = supplier_order_detail(storage, id).await?;
    Ok(write_summary(&detail.summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewclub_common::UnitSize;
    use rust_decimal::Decimal;

    fn rows(csv_text: &str) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(csv_text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_write_summary() {
        let summary = vec![
            SummaryLine {
                ingredient_name: "Munich".to_string(),
                unit_size: UnitSize::Sack,
                quantity: 5,
                total_cost: Decimal::new(625, 1),
            },
            SummaryLine {
                ingredient_name: "Pale, Ale".to_string(),
                unit_size: UnitSize::Sack,
                quantity: 1,
                total_cost: Decimal::new(60, 0),
            },
        ];

        let text = write_summary(&summary).unwrap();
        assert_eq!(
            rows(&text),
            vec![
                vec!["Name", "Quantity"],
                vec!["Munich", "5 sacks"],
                vec!["Pale, Ale", "1 sack"],
            ]
        );
    }

    #[test]
    fn test_write_empty_summary() {
        assert_eq!(write_summary(&[]).unwrap(), "Name,Quantity\n");
    }

    #[tokio::test]
    async fn test_export_unknown_order() {
        let mut storage = Storage::in_memory();
        assert!(matches!(
            export_supplier_order(&mut storage, 1).await,
            Err(brewclub_common::Error::NotFound(_))
        ));
    }
}
