//! Match-result parsing and workbook output.
//!
//! The matching assistant answers with a JSON array of match records. This
//! crate parses that array leniently (missing fields become empty cells,
//! non-numeric numbers become 0) and writes an `.xlsx` workbook with a
//! fixed six-column schema and background banding on the probability
//! column.

use std::path::Path;

use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};
use serde_json::Value;
use tracing::{debug, info};

use invoicematch_shared::{InvoiceMatchError, MATCH_HEADERS, MatchRecord, Result};

/// Fill for probabilities below [`RED_BELOW`].
const RED_FILL: Color = Color::RGB(0xFFC7CE);

/// Fill for probabilities in the yellow band.
const YELLOW_FILL: Color = Color::RGB(0xFFEB9C);

/// Probabilities strictly below this get the red fill.
const RED_BELOW: f64 = 0.21;

/// Probabilities up to and including this (and at least [`RED_BELOW`]) get
/// the yellow fill; anything higher is unstyled.
const YELLOW_UP_TO: f64 = 0.41;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the matching assistant's JSON array into match records.
///
/// The top level must be an array of objects. Within an object, missing or
/// mistyped fields fall back to empty strings and zeros rather than
/// failing the whole report.
pub fn parse_match_records(json: &str) -> Result<Vec<MatchRecord>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| InvoiceMatchError::format(format!("match result is not valid JSON: {e}")))?;

    let items = value.as_array().ok_or_else(|| {
        InvoiceMatchError::format("match result is not a JSON array")
    })?;

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| {
            InvoiceMatchError::format(format!("match result element {index} is not an object"))
        })?;

        let text = |key: &str| -> String {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        records.push(MatchRecord {
            vendor_sku: text("vendor_sku"),
            vendor_product: text("vendor_product"),
            bzbs_product: text("bzbs_product"),
            bzbs_sku: text("bzbs_sku"),
            probability: object
                .get("probability")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            quantity: object
                .get("quantity")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        });
    }

    debug!(records = records.len(), "parsed match records");
    Ok(records)
}

// ---------------------------------------------------------------------------
// Workbook output
// ---------------------------------------------------------------------------

/// Background fill for a probability cell, if the value falls in a band
/// worth flagging: red below 0.21, yellow through 0.41, none above.
pub fn probability_fill(probability: f64) -> Option<Color> {
    if probability < RED_BELOW {
        Some(RED_FILL)
    } else if probability <= YELLOW_UP_TO {
        Some(YELLOW_FILL)
    } else {
        None
    }
}

fn xlsx_err(e: XlsxError) -> InvoiceMatchError {
    InvoiceMatchError::format(format!("workbook write failed: {e}"))
}

/// Write the match records to an `.xlsx` workbook at `path`: one header
/// row, one row per record, probability banding on column 5.
pub fn write_workbook(records: &[MatchRecord], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("matches").map_err(xlsx_err)?;

    let header_format = Format::new().set_bold();

    for (col, title) in MATCH_HEADERS.iter().enumerate() {
        worksheet
            .write_with_format(0, col as u16, *title, &header_format)
            .map_err(xlsx_err)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;
        worksheet
            .write(row, 0, record.vendor_sku.as_str())
            .map_err(xlsx_err)?;
        worksheet
            .write(row, 1, record.vendor_product.as_str())
            .map_err(xlsx_err)?;
        worksheet
            .write(row, 2, record.bzbs_product.as_str())
            .map_err(xlsx_err)?;
        worksheet
            .write(row, 3, record.bzbs_sku.as_str())
            .map_err(xlsx_err)?;

        match probability_fill(record.probability) {
            Some(fill) => {
                let banded = Format::new().set_background_color(fill);
                worksheet
                    .write_number_with_format(row, 4, record.probability, &banded)
                    .map_err(xlsx_err)?
            }
            None => worksheet
                .write_number(row, 4, record.probability)
                .map_err(xlsx_err)?,
        };

        worksheet
            .write_number(row, 5, record.quantity as f64)
            .map_err(xlsx_err)?;
    }

    workbook.save(path).map_err(|e| {
        InvoiceMatchError::format(format!("failed to save workbook {}: {e}", path.display()))
    })?;

    info!(path = %path.display(), rows = records.len(), "workbook written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let json = r#"[{
            "vendor_sku": "A1",
            "vendor_product": "Widget",
            "bzbs_product": "Widget Pro",
            "bzbs_sku": "B9",
            "probability": 0.5,
            "quantity": 3
        }]"#;
        let records = parse_match_records(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vendor_sku, "A1");
        assert_eq!(records[0].bzbs_sku, "B9");
        assert_eq!(records[0].probability, 0.5);
        assert_eq!(records[0].quantity, 3);
    }

    #[test]
    fn missing_and_mistyped_fields_default() {
        let json = r#"[{"vendor_sku": "A1", "probability": "high", "quantity": null}]"#;
        let records = parse_match_records(json).unwrap();
        assert_eq!(records[0].vendor_product, "");
        assert_eq!(records[0].probability, 0.0);
        assert_eq!(records[0].quantity, 0);
    }

    #[test]
    fn rejects_non_array_top_level() {
        let err = parse_match_records(r#"{"vendor_sku": "A1"}"#).unwrap_err();
        assert!(matches!(err, InvoiceMatchError::Format { .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_match_records("not json at all").unwrap_err();
        assert!(matches!(err, InvoiceMatchError::Format { .. }));
    }

    #[test]
    fn rejects_non_object_element() {
        let err = parse_match_records(r#"[1, 2, 3]"#).unwrap_err();
        assert!(err.to_string().contains("element 0"));
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_match_records("[]").unwrap().is_empty());
    }

    #[test]
    fn probability_banding() {
        assert_eq!(probability_fill(0.10), Some(RED_FILL));
        assert_eq!(probability_fill(0.30), Some(YELLOW_FILL));
        assert_eq!(probability_fill(0.90), None);
    }

    #[test]
    fn probability_band_boundaries() {
        assert_eq!(probability_fill(0.20999), Some(RED_FILL));
        assert_eq!(probability_fill(0.21), Some(YELLOW_FILL));
        assert_eq!(probability_fill(0.41), Some(YELLOW_FILL));
        assert_eq!(probability_fill(0.41001), None);
        assert_eq!(probability_fill(0.0), Some(RED_FILL));
    }

    #[test]
    fn header_schema_is_fixed() {
        assert_eq!(
            MATCH_HEADERS,
            [
                "vendor_sku",
                "vendor_product",
                "bzbs_product",
                "bzbs_sku",
                "probability",
                "quantity",
            ]
        );
    }

    #[test]
    fn writes_workbook_to_disk() {
        let records = vec![
            MatchRecord {
                vendor_sku: "A1".into(),
                vendor_product: "Widget".into(),
                bzbs_product: "Widget Pro".into(),
                bzbs_sku: "B9".into(),
                probability: 0.10,
                quantity: 3,
            },
            MatchRecord {
                vendor_sku: "A2".into(),
                vendor_product: "Gadget".into(),
                bzbs_product: "Gadget Max".into(),
                bzbs_sku: "B4".into(),
                probability: 0.30,
                quantity: 1,
            },
            MatchRecord {
                vendor_sku: "A3".into(),
                vendor_product: "Sprocket".into(),
                bzbs_product: "Sprocket XL".into(),
                bzbs_sku: "B7".into(),
                probability: 0.90,
                quantity: 12,
            },
        ];

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("match_result.xlsx");
        write_workbook(&records, &path).unwrap();

        let metadata = std::fs::metadata(&path).expect("workbook exists");
        assert!(metadata.len() > 0);
    }

    #[test]
    fn writes_empty_workbook() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.xlsx");
        write_workbook(&[], &path).unwrap();
        assert!(path.exists());
    }
}
