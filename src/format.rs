//! Display formatting and ordering of country records.

use itertools::Itertools;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{CountField, CountrySnapshot};

/// Formats a daily change for the stat cards: `"+1,234"`, or `"0"` when the
/// value is missing, NaN or not strictly positive.
pub fn format_delta(n: Option<f64>) -> String {
    match n {
        Some(v) if v > 0.0 => format!("+{}", group_thousands(v.round() as u64)),
        _ => "0".to_string(),
    }
}

/// Abbreviated total with one decimal (`1234 -> "1.2k"`, `2.5e6 -> "2.5m"`).
pub fn format_compact(n: Option<f64>) -> String {
    const SCALES: [(f64, &str); 5] = [
        (1.0, ""),
        (1e3, "k"),
        (1e6, "m"),
        (1e9, "b"),
        (1e12, "t"),
    ];

    let Some(v) = n.filter(|v| v.is_finite()) else {
        return "0".to_string();
    };
    let abs = v.abs();
    let mut idx = SCALES
        .iter()
        .rposition(|(scale, _)| abs >= *scale)
        .unwrap_or(0);
    let round_at = |i: usize| (abs / SCALES[i].0 * 10.0).round() / 10.0;

    let mut rounded = round_at(idx);
    // 999_950 rounds to 1000.0k; promote it to 1.0m.
    if rounded >= 1000.0 && idx + 1 < SCALES.len() {
        idx += 1;
        rounded = round_at(idx);
    }
    let sign = if v < 0.0 && rounded > 0.0 { "-" } else { "" };
    format!("{}{:.1}{}", sign, rounded, SCALES[idx].1)
}

/// Inserts `,` between every group of three digits.
pub fn group_thousands(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Returns a new list ordered by `field`, largest first.
///
/// The sort is stable, so records with equal counts keep their input order
/// and sorting an already sorted list is a no-op.
pub fn sort_by_metric(list: &[CountrySnapshot], field: CountField) -> Vec<CountrySnapshot> {
    list.iter()
        .sorted_by(|a, b| b.count(field).cmp(&a.count(field)))
        .cloned()
        .collect()
}

/// Tera filter `delta`: `{{ snapshot.todayCases | delta }}`.
pub fn delta_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(format_delta(value.as_f64())))
}

/// Tera filter `compact`: `{{ snapshot.cases | compact }}`.
pub fn compact_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(format_compact(value.as_f64())))
}

/// Tera filter `script_json`: `{{ map | script_json | safe }}`.
///
/// Serializes the value for a `<script type="application/json">` block with
/// `<`, `>` and `&` written as `\u003c`, `\u003e` and `\u0026`. Those bytes
/// only ever occur inside JSON strings, so the output still parses to the
/// same value but can never close the surrounding element.
pub fn script_json_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let json = serde_json::to_string(value).map_err(tera::Error::msg)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            c => out.push(c),
        }
    }
    Ok(Value::String(out))
}
