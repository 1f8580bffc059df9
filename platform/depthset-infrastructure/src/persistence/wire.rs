use depthset_domain::errors::{RepositoryError, ValidationError};
use depthset_domain::value_objects::order_book_event::BookLevel;
use serde_json::Value;

/// Decodes one stored book side: a JSON array of `[price, quantity, ...]` rows.
///
/// Fields may be JSON strings (the venue format) or plain numbers. Placeholder fields after the
/// quantity are dropped. Anything else is [`RepositoryError::InvalidData`].
pub fn decode_book_side(value: &Value) -> Result<Vec<BookLevel>, RepositoryError> {
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ValidationError::MalformedBookSide(format!(
                "expected a JSON array, got {other}"
            ))
            .into())
        }
    };

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            decode_row(row).map_err(|err| RepositoryError::invalid(format!("book row #{idx}"), err))
        })
        .collect()
}

fn decode_row(row: &Value) -> Result<BookLevel, ValidationError> {
    let fields = row
        .as_array()
        .ok_or_else(|| {
            ValidationError::MalformedBookSide(format!("row must be an array, got {row}"))
        })?
        .iter()
        .take(2)
        .map(field_text)
        .collect::<Result<Vec<String>, ValidationError>>()?;
    BookLevel::from_wire(&fields)
}

fn field_text(field: &Value) -> Result<String, ValidationError> {
    match field {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(ValidationError::MalformedDecimal {
            input: other.to_string(),
            reason: "expected a string or a number".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthset_domain::value_objects::decimal::Decimal;
    use serde_json::json;

    #[test]
    fn decodes_venue_rows_with_placeholders() {
        let levels = decode_book_side(&json!([
            ["50000.1", "0.5", "0", "3"],
            ["50000.2", "1", "0", "1"]
        ]))
        .unwrap();

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, Decimal::parse("50000.1").unwrap());
        assert_eq!(levels[1].quantity, Decimal::ONE);
    }

    #[test]
    fn accepts_numbers_and_null_sides() {
        let levels = decode_book_side(&json!([[100, 2]])).unwrap();
        assert_eq!(levels[0].price, Decimal::from(100));
        assert!(decode_book_side(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn rejects_short_or_malformed_rows_as_invalid_data() {
        let err = decode_book_side(&json!([["100", "1"], ["100"]])).unwrap_err();
        assert_eq!(
            err,
            RepositoryError::invalid("book row #1", ValidationError::MalformedLevel { fields: 1 })
        );
        assert!(err.to_string().contains("got 1 field"));

        let malformed = [
            json!([["abc", "1"]]),
            json!({"price": "1"}),
            json!([[true, "1"]]),
            json!(["1"]),
        ];
        for bad in malformed {
            let err = decode_book_side(&bad).unwrap_err();
            assert!(
                matches!(err, RepositoryError::InvalidData { .. }),
                "{bad} decoded to {err:?}"
            );
        }
    }
}
