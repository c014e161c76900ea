use crate::domain::rating::NewStockRating;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub index: usize,
    pub field: Option<&'static str>,
    pub reason: &'static str,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "item {}: field `{field}` {}", self.index, self.reason),
            None => write!(f, "item {}: {}", self.index, self.reason),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Lenient currency parse: drops everything but ASCII digits and `.`, then parses.
/// Anything that still fails to parse (empty, several dots, ...) is 0.0, not an error.
pub fn parse_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Decodes every raw item of a page. The first malformed item fails the whole page.
pub fn decode_items(items: &[Value]) -> Result<Vec<NewStockRating>, DecodeError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_item(index, item))
        .collect()
}

pub fn decode_item(index: usize, item: &Value) -> Result<NewStockRating, DecodeError> {
    let obj = item.as_object().ok_or(DecodeError {
        index,
        field: None,
        reason: "is not a JSON object",
    })?;

    let ticker = required_str(obj, index, "ticker")?.trim().to_string();
    if ticker.is_empty() {
        return Err(DecodeError {
            index,
            field: Some("ticker"),
            reason: "is empty",
        });
    }

    let time = required_str(obj, index, "time")?.trim().to_string();
    if time.is_empty() {
        return Err(DecodeError {
            index,
            field: Some("time"),
            reason: "is empty",
        });
    }

    Ok(NewStockRating {
        ticker,
        company: required_str(obj, index, "company")?.trim().to_string(),
        target_from: parse_price(required_str(obj, index, "target_from")?),
        target_to: parse_price(required_str(obj, index, "target_to")?),
        action: required_str(obj, index, "action")?.trim().to_string(),
        brokerage: required_str(obj, index, "brokerage")?.trim().to_string(),
        rating_from: required_str(obj, index, "rating_from")?.trim().to_string(),
        rating_to: required_str(obj, index, "rating_to")?.trim().to_string(),
        time,
    })
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(DecodeError {
            index,
            field: Some(field),
            reason: "is not a string",
        }),
        None => Err(DecodeError {
            index,
            field: Some(field),
            reason: "is missing",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_item() -> Value {
        json!({
            "ticker": "AAPL",
            "company": "Apple Inc.",
            "target_from": "$150.00",
            "target_to": "$1,175.50",
            "action": "target raised by",
            "brokerage": "The Goldman Sachs Group",
            "rating_from": "Neutral",
            "rating_to": "Buy",
            "time": "2025-01-13T00:30:05.813548892Z"
        })
    }

    #[test]
    fn parse_price_strips_currency_formatting() {
        assert_eq!(parse_price("$12.34"), 12.34);
        assert_eq!(parse_price("$1,175.50"), 1175.5);
        assert_eq!(parse_price(" 42 "), 42.0);
        assert_eq!(parse_price("USD 7"), 7.0);
    }

    #[test]
    fn parse_price_falls_back_to_zero() {
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("$"), 0.0);
        assert_eq!(parse_price("n/a"), 0.0);
        assert_eq!(parse_price("1.2.3"), 0.0);
    }

    #[test]
    fn decodes_a_complete_item() {
        let rec = decode_item(0, &raw_item()).unwrap();
        assert_eq!(rec.ticker, "AAPL");
        assert_eq!(rec.target_from, 150.0);
        assert_eq!(rec.target_to, 1175.5);
        assert_eq!(rec.rating_to, "Buy");
        assert_eq!(rec.time, "2025-01-13T00:30:05.813548892Z");
    }

    #[test]
    fn unknown_ratings_pass_through_untouched() {
        let mut item = raw_item();
        item["rating_to"] = json!("Sector Outperform");
        let rec = decode_item(0, &item).unwrap();
        assert_eq!(rec.rating_to, "Sector Outperform");
    }

    #[test]
    fn missing_or_mistyped_fields_fail_the_page() {
        let mut missing = raw_item();
        missing.as_object_mut().unwrap().remove("brokerage");

        let mut mistyped = raw_item();
        mistyped["target_to"] = json!(12.5);

        let err = decode_items(&[raw_item(), missing]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.field, Some("brokerage"));
        assert_eq!(err.reason, "is missing");

        let err = decode_items(&[mistyped]).unwrap_err();
        assert_eq!(err.field, Some("target_to"));
        assert_eq!(err.to_string(), "item 0: field `target_to` is not a string");

        let err = decode_items(&[json!(["AAPL"])]).unwrap_err();
        assert_eq!(err.field, None);
    }

    #[test]
    fn blank_key_fields_are_rejected() {
        let mut item = raw_item();
        item["ticker"] = json!("  ");
        let err = decode_item(3, &item).unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(err.field, Some("ticker"));
        assert_eq!(err.reason, "is empty");
    }
}
