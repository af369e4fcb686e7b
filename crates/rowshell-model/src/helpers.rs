//! The fixed helper library handed to compiled components.

use crate::row::Row;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::row::to_bool;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Label keys tried, in order, before falling back to the first string column.
pub const LABEL_KEYS: [&str; 11] = [
    "label", "name", "Nom", "nom", "title", "Title", "Libellé", "Libelle", "libelle", "Intitule",
    "Intitulé",
];

/// A `{value, label}` pair for select widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

/// Wrap a scalar in a one-element list; null becomes the empty list.
pub fn as_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Case-insensitive substring test over the text form of both values.
pub fn includes_ci(haystack: &Value, needle: &Value) -> bool {
    text_of(haystack)
        .to_lowercase()
        .contains(&text_of(needle).to_lowercase())
}

/// `local@domain.tld` shape check: one `@`, no whitespace, and a dot inside
/// the domain with text on both sides.
pub fn email_looks_ok(value: &Value) -> bool {
    let text = text_of(value);
    let text = text.trim();
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Best guess at the column holding a human label for `rows`.
pub fn pick_label_field(rows: &[Row]) -> String {
    let Some(sample) = rows.first() else {
        return "id".to_string();
    };
    LABEL_KEYS
        .iter()
        .find(|k| matches!(sample.get(**k), Some(Value::String(_))))
        .map(|k| k.to_string())
        .or_else(|| {
            sample
                .iter()
                .find(|(_, v)| v.is_string())
                .map(|(k, _)| k.clone())
        })
        .unwrap_or_else(|| "id".to_string())
}

/// Turn rows into select options keyed by row id. Rows without an id are
/// dropped.
pub fn to_options(rows: &[Row]) -> Vec<SelectOption> {
    let key = pick_label_field(rows);
    rows.iter()
        .filter_map(|row| {
            let id = row.get("id").filter(|v| !v.is_null())?;
            let label = match row.get(&key) {
                Some(v) if !v.is_null() => text_of(v),
                _ => text_of(id),
            };
            Some(SelectOption {
                value: id.clone(),
                label,
            })
        })
        .collect()
}

/// Lenient date parsing over strings, epoch seconds, epoch millis and day
/// numbers.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) if !s.trim().is_empty() => parse_date_str(s.trim()),
        Value::Number(n) => {
            let v = n.as_f64().filter(|v| *v != 0.0 && v.is_finite())?;
            let millis = if v > 1e12 || (v <= 1e9 && v > 1e4) {
                v
            } else if v > 1e9 {
                v * 1000.0
            } else {
                v * MS_PER_DAY as f64
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

/// `dd/mm/YYYY`, or an em dash when there is no date.
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%d/%m/%Y").to_string(),
        None => "—".to_string(),
    }
}

/// Whole days left until the end of the target day.
pub fn days_left(target: &Value) -> Option<i64> {
    days_left_at(target, Utc::now())
}

pub fn days_left_at(target: &Value, now: DateTime<Utc>) -> Option<i64> {
    let date = parse_date(target)?;
    let end_of_day = Utc.from_utc_datetime(&date.date_naive().and_time(NaiveTime::MIN))
        + Duration::milliseconds(MS_PER_DAY - 1);
    let ms = (end_of_day - now).num_milliseconds();
    Some((ms as f64 / MS_PER_DAY as f64).ceil() as i64)
}

pub fn is_finite_number(value: &Value) -> bool {
    value.as_f64().is_some_and(f64::is_finite)
}

pub fn valid_lat_lng(lat: &Value, lng: &Value) -> bool {
    match (lat.as_f64(), lng.as_f64()) {
        (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
            (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
        }
        _ => false,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
