//! Row → JSON conversion and tree assembly for nested selects.

use std::collections::HashMap;

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Converts one row into a JSON object. NULL columns are left out.
pub fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    let mut object = Map::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = match row.try_get_raw(i) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        if raw.is_null() {
            continue;
        }
        let type_name = raw.type_info().name().to_ascii_uppercase();
        let value = match type_name.as_str() {
            "INTEGER" | "BOOLEAN" | "INT" | "BIGINT" => {
                row.try_get_unchecked::<i64, _>(i).map(Value::from).unwrap_or(Value::Null)
            }
            "REAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => row
                .try_get_unchecked::<f64, _>(i)
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            "BLOB" => row
                .try_get_unchecked::<Vec<u8>, _>(i)
                .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                .unwrap_or(Value::Null),
            _ => row.try_get_unchecked::<String, _>(i).map(Value::String).unwrap_or(Value::Null),
        };
        object.insert(column.name().to_string(), value);
    }
    object
}

/// Keys used to match ids and parent ids: numbers and strings compare by text.
fn key_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Assembles flat rows into a forest.
///
/// A row whose `pidfield` is missing, null or names no row's `idfield` is a root.
/// Row order is kept among siblings; `children` is only set on nodes that have any.
pub fn build_forest(rows: Vec<Map<String, Value>>, idfield: &str, pidfield: &str) -> Vec<Value> {
    let ids: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| key_of(row.get(idfield)).map(|k| (k, i)))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        match key_of(row.get(pidfield)).and_then(|p| ids.get(&p).copied()) {
            // A row naming itself as parent would never be reachable.
            Some(parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut slots: Vec<Option<Map<String, Value>>> = rows.into_iter().map(Some).collect();
    let mut visiting = vec![false; slots.len()];
    let mut forest: Vec<Value> = roots
        .into_iter()
        .filter_map(|root| assemble(root, &children, &mut slots, &mut visiting))
        .collect();

    // Rows caught in a parent cycle are unreachable from any root; emit them as roots.
    for i in 0..slots.len() {
        if slots[i].is_some() {
            if let Some(node) = assemble(i, &children, &mut slots, &mut visiting) {
                forest.push(node);
            }
        }
    }
    forest
}

fn assemble(
    index: usize,
    children: &[Vec<usize>],
    slots: &mut [Option<Map<String, Value>>],
    visiting: &mut [bool],
) -> Option<Value> {
    let mut node = slots[index].take()?;
    visiting[index] = true;
    let mut kids = Vec::new();
    for &c in &children[index] {
        if visiting[c] {
            continue;
        }
        if let Some(kid) = assemble(c, children, slots, visiting) {
            kids.push(kid);
        }
    }
    visiting[index] = false;
    if !kids.is_empty() {
        node.insert("children".to_string(), Value::Array(kids));
    }
    Some(Value::Object(node))
}
