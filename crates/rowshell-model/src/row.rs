//! Rows as they come off the host document, plus cell coercions.
//!
//! The host may answer a table fetch in several wire shapes. Everything in
//! the workspace works on [`Row`]s, so [`rows_from_wire`] is the single place
//! where those shapes are normalized.

use serde_json::{Map, Value};

/// One record of a host table, keyed by column id.
pub type Row = Map<String, Value>;

/// Numeric row identifier assigned by the host document.
pub type RowId = i64;

/// Column names a host may use for the numeric row id, in lookup order.
pub const ROW_ID_KEYS: [&str; 4] = ["id", "_id", "RowId", "rowId"];

/// Normalize any supported fetch result into a list of rows.
///
/// Supported shapes:
/// - an array of row objects
/// - an array of REST records `{ "id": 1, "fields": { ... } }` (flattened)
/// - `{ "records": [...] }` or `{ "data": [...] }`
/// - a column object `{ "col": [v0, v1, ...], ... }`; scalar columns are
///   broadcast to every row and the row count comes from the first array
///   column
///
/// Anything else yields no rows.
pub fn rows_from_wire(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(row_from_item).collect(),
        Value::Object(mut obj) => {
            for key in ["records", "data"] {
                if matches!(obj.get(key), Some(Value::Array(_))) {
                    if let Some(inner) = obj.remove(key) {
                        return rows_from_wire(inner);
                    }
                }
            }
            transpose_columns(obj)
        }
        _ => Vec::new(),
    }
}

fn row_from_item(item: Value) -> Option<Row> {
    let Value::Object(mut obj) = item else {
        return None;
    };
    if let Some(Value::Object(fields)) = obj.remove("fields") {
        let mut row = fields;
        if let Some(id) = obj.remove("id") {
            row.insert("id".to_string(), id);
        }
        return Some(row);
    }
    Some(obj)
}

/// Transpose a column-oriented table into rows.
pub fn transpose_columns(columns: Map<String, Value>) -> Vec<Row> {
    let row_count = columns
        .values()
        .find_map(|v| v.as_array().map(Vec::len))
        .unwrap_or(0);

    (0..row_count)
        .map(|i| {
            columns
                .iter()
                .map(|(col, values)| {
                    let cell = match values {
                        Value::Array(items) => items.get(i).cloned().unwrap_or(Value::Null),
                        scalar => scalar.clone(),
                    };
                    (col.clone(), cell)
                })
                .collect()
        })
        .collect()
}

/// Numeric row id of a row, trying every known id column.
pub fn row_id_of(row: &Row) -> Option<RowId> {
    ROW_ID_KEYS
        .iter()
        .filter_map(|k| row.get(*k))
        .find_map(Value::as_i64)
}

// ============================================================================
// Cell coercions
// ============================================================================

/// Lenient boolean: `true`, `1`, `"1"` and `"true"` (any case) are true.
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Non-empty string content of a cell. Numbers are rendered as text.
pub fn cell_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reference cell: a positive row id, or nothing for `0`/null/empty.
pub fn cell_ref(value: Option<&Value>) -> Option<RowId> {
    match value? {
        Value::Number(n) => n.as_i64().filter(|id| *id != 0),
        Value::String(s) => s.trim().parse::<RowId>().ok().filter(|id| *id != 0),
        _ => None,
    }
}

/// Integer cell with a fallback for missing or non-numeric content.
pub fn cell_i64(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Multi-select cell. Accepts `["L", "a", "b"]` (encoded list marker),
/// a plain array, or a single string.
pub fn choice_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => {
            let skip = usize::from(items.first().and_then(Value::as_str) == Some("L"));
            items
                .iter()
                .skip(skip)
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        }
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transposes_column_object() {
        let rows = rows_from_wire(json!({"id": [1, 2], "name": ["A", "B"]}));
        assert_eq!(
            Value::Array(rows.into_iter().map(Value::Object).collect()),
            json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}])
        );
    }

    #[test]
    fn scalar_columns_are_broadcast() {
        let rows = rows_from_wire(json!({"id": [1, 2], "doc": "x"}));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["doc"], json!("x"));
    }

    #[test]
    fn object_without_array_column_has_no_rows() {
        assert!(rows_from_wire(json!({"a": 1})).is_empty());
        assert!(rows_from_wire(json!("nope")).is_empty());
    }

    #[test]
    fn unwraps_records_and_flattens_fields() {
        let rows = rows_from_wire(json!({
            "records": [{"id": 7, "fields": {"template_id": "home"}}]
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(7));
        assert_eq!(rows[0]["template_id"], json!("home"));
    }

    #[test]
    fn unwraps_data_key() {
        let rows = rows_from_wire(json!({"data": [{"id": 1}, {"id": 2}]}));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn bool_coercion() {
        assert!(to_bool(&json!(true)));
        assert!(to_bool(&json!(1)));
        assert!(to_bool(&json!("1")));
        assert!(to_bool(&json!("TRUE")));
        assert!(!to_bool(&json!("yes")));
        assert!(!to_bool(&json!(0)));
        assert!(!to_bool(&Value::Null));
    }

    #[test]
    fn choice_list_drops_list_marker() {
        assert_eq!(
            choice_list(Some(&json!(["L", "acheteur", "repondant"]))),
            vec!["acheteur", "repondant"]
        );
        assert_eq!(choice_list(Some(&json!(["acheteur"]))), vec!["acheteur"]);
        assert_eq!(choice_list(Some(&json!("solo"))), vec!["solo"]);
        assert!(choice_list(None).is_empty());
    }

    #[test]
    fn zero_reference_is_absent() {
        assert_eq!(cell_ref(Some(&json!(0))), None);
        assert_eq!(cell_ref(Some(&json!(12))), Some(12));
        assert_eq!(cell_ref(Some(&Value::Null)), None);
    }

    #[test]
    fn row_id_fallbacks() {
        let row: Row = serde_json::from_value(json!({"rowId": 5})).unwrap();
        assert_eq!(row_id_of(&row), Some(5));
    }
}
