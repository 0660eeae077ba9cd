//! JSON parsing helpers for extraction service responses
//!
//! Vision models wrap their JSON in markdown fences, add prose around it,
//! return numbers as strings and leave fields out. These helpers turn that
//! into a `DraftReceipt` or fail with `Error::Extraction`.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

use super::types::{DraftItem, DraftReceipt};

/// Longest slice of raw output quoted in error messages
const RAW_PREVIEW_CHARS: usize = 200;

/// Remove leading ```` ```json ```` / ```` ``` ```` and trailing ```` ``` ```` markers
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a receipt draft from raw model output
pub fn parse_receipt_response(response: &str) -> Result<DraftReceipt> {
    let body = strip_code_fences(response);

    let start = body.find('{');
    let end = body.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &body[s..=e];
            let value: Value = serde_json::from_str(json_str).map_err(|e| {
                Error::Extraction(format!(
                    "Invalid receipt JSON from model: {} | Raw: {}",
                    e,
                    preview(json_str)
                ))
            })?;
            draft_from_value(&value)
        }
        _ => Err(Error::Extraction(format!(
            "No JSON object found in model response | Raw: {}",
            preview(body)
        ))),
    }
}

/// Build a draft from an already-parsed JSON value
///
/// Missing `store`, `date` and `total` stay `None`. A missing or non-array
/// `items` yields an empty list, which the ingestor rejects.
pub fn draft_from_value(value: &Value) -> Result<DraftReceipt> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Extraction("Receipt JSON must be an object".into()))?;

    let store = obj
        .get("store")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let date = obj.get("date").and_then(Value::as_str).and_then(parse_date);

    let total = coerce_number(obj.get("total"));

    let items = match obj.get("items") {
        Some(Value::Array(entries)) => entries.iter().filter_map(item_from_value).collect(),
        _ => Vec::new(),
    };

    Ok(DraftReceipt {
        store,
        date,
        total,
        items,
    })
}

fn item_from_value(value: &Value) -> Option<DraftItem> {
    let Some(obj) = value.as_object() else {
        warn!("Ignoring non-object receipt line: {}", value);
        return None;
    };

    let name = match obj.get("name") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let price = coerce_number(obj.get("price")).unwrap_or(0.0);
    let quantity = coerce_number(obj.get("quantity"))
        .filter(|q| *q > 0.0)
        .unwrap_or(1.0);

    Some(DraftItem {
        name,
        price,
        quantity,
    })
}

/// Read a finite number from a JSON number or numeric string ("$3.49", "1,299.00")
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
        .or_else(|| {
            // Timestamps like 2024-03-01T10:15:00
            s.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

fn preview(s: &str) -> String {
    if s.chars().count() > RAW_PREVIEW_CHARS {
        format!("{}...", s.chars().take(RAW_PREVIEW_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_receipt() {
        let response = r#"```json
{
  "store": "MartX",
  "date": "2024-03-01",
  "total": 10.50,
  "items": [
    {"name": " Milk ", "price": 5.00, "quantity": 1},
    {"name": "milk", "price": 5.00, "quantity": 1}
  ]
}
```"#;
        let draft = parse_receipt_response(response).unwrap();
        assert_eq!(draft.store.as_deref(), Some("MartX"));
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(draft.total, Some(10.50));
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].name, "Milk");
        assert_eq!(draft.items[0].price, 5.0);
        assert_eq!(draft.items[1].quantity, 1.0);
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let response = "Here is the receipt:\n{\"store\": \"Aldi\", \"items\": []}\nHope that helps!";
        let draft = parse_receipt_response(response).unwrap();
        assert_eq!(draft.store.as_deref(), Some("Aldi"));
        assert!(draft.items.is_empty());
    }

    #[test]
    fn test_invalid_json_is_extraction_error() {
        let err = parse_receipt_response("```json\n{\"store\": \"MartX\", items: [}\n```")
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));

        let err = parse_receipt_response("I could not read this receipt.").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_missing_header_fields_stay_absent() {
        let draft =
            parse_receipt_response(r#"{"items": [{"name": "Bread", "price": 2.5}]}"#).unwrap();
        assert_eq!(draft.store, None);
        assert_eq!(draft.date, None);
        assert_eq!(draft.total, None);
        assert_eq!(draft.items[0].quantity, 1.0);
    }

    #[test]
    fn test_item_coercion() {
        let draft = parse_receipt_response(
            r#"{"store": "  ", "total": "12.40", "items": [
                {"name": "Eggs", "price": "$3.49", "quantity": "2"},
                {"name": "Apples", "price": "n/a", "quantity": 0},
                {"name": "Bananas", "quantity": -1},
                {"name": "Cheese", "price": null, "quantity": "lots"},
                {"name": "Coupon", "price": -1.00},
                "stray text"
            ]}"#,
        )
        .unwrap();

        assert_eq!(draft.store, None);
        assert_eq!(draft.total, Some(12.40));
        assert_eq!(draft.items.len(), 5);
        assert_eq!(draft.items[0].price, 3.49);
        assert_eq!(draft.items[0].quantity, 2.0);
        assert_eq!(draft.items[1].price, 0.0);
        assert_eq!(draft.items[1].quantity, 1.0);
        assert_eq!(draft.items[2].quantity, 1.0);
        assert_eq!(draft.items[3].price, 0.0);
        assert_eq!(draft.items[3].quantity, 1.0);
        // Negative prices survive extraction; the ingestor decides what to drop
        assert_eq!(draft.items[4].price, -1.0);
    }

    #[test]
    fn test_date_variants() {
        assert_eq!(parse_date("2024-03-01"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(parse_date("2024/03/01"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(
            parse_date("2024-03-01T18:22:00"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_date("March 1st"), None);
    }

    #[test]
    fn test_non_object_root() {
        let err = draft_from_value(&serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
