// ABOUTME: Canonicalisation of raw model output into stage documents
// ABOUTME: Wraps bare lists, assigns missing ids and resets demo page state

use std::collections::HashSet;

use pmstation_core::StageType;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, WorkflowError};
use crate::feature_tree::{self, next_free_id};
use crate::types::{
    DemoStructure, DirectionsOutput, FeaturesOutput, PageStatus, PrdDocument, PrototypeOutput,
    TestcasesOutput,
};

/// Ensure `raw` is an object holding a list under `key`.
///
/// A bare list becomes `{key: list}`; an object missing `key` becomes
/// `{key: [object]}`.
pub fn wrap_list(raw: Value, key: &str) -> Value {
    match raw {
        Value::Object(ref map) if map.contains_key(key) => raw,
        Value::Array(items) => {
            let mut map = Map::new();
            map.insert(key.to_string(), Value::Array(items));
            Value::Object(map)
        }
        other => {
            let mut map = Map::new();
            map.insert(key.to_string(), Value::Array(vec![other]));
            Value::Object(map)
        }
    }
}

/// Like [`wrap_list`] but leaves objects alone, for documents whose list key is optional
fn wrap_bare_list(raw: Value, key: &str) -> Value {
    match raw {
        Value::Array(_) => wrap_list(raw, key),
        other => other,
    }
}

/// Move ids that are not integers (e.g. `"auth"`) to `original_id` so a fresh
/// numeric id can be assigned without losing the model's value.
fn keep_foreign_ids(items: Option<&mut Value>, children_key: Option<&str>) {
    let Some(Value::Array(items)) = items else {
        return;
    };
    for item in items.iter_mut() {
        let Value::Object(map) = item else {
            continue;
        };
        let foreign = match map.get("id") {
            None | Some(Value::Null) => false,
            Some(Value::Number(n)) => n.as_i64().is_none(),
            Some(Value::String(s)) => s.trim().parse::<i64>().is_err(),
            Some(_) => true,
        };
        if foreign {
            if let Some(original) = map.remove("id") {
                debug!(original_id = %original, "Replacing non-numeric id");
                map.entry("original_id").or_insert(original);
            }
        }
        if let Some(key) = children_key {
            keep_foreign_ids(map.get_mut(key), children_key);
        }
    }
}

pub fn normalize_directions(raw: Value) -> Result<DirectionsOutput> {
    let mut raw = wrap_list(raw, "directions");
    keep_foreign_ids(raw.get_mut("directions"), None);
    let mut output: DirectionsOutput = serde_json::from_value(raw)
        .map_err(|e| WorkflowError::decode(StageType::Direction, e))?;

    let taken: HashSet<i64> = output.directions.iter().filter_map(|d| d.id).collect();
    let mut next = 1;
    for direction in output.directions.iter_mut() {
        if direction.id.is_none() {
            let id = next_free_id(next, &taken);
            direction.id = Some(id);
            next = id + 1;
        }
    }
    Ok(output)
}

pub fn normalize_features(raw: Value) -> Result<FeaturesOutput> {
    let mut raw = wrap_list(raw, "modules");
    keep_foreign_ids(raw.get_mut("modules"), Some("sub_features"));
    let mut output: FeaturesOutput = serde_json::from_value(raw)
        .map_err(|e| WorkflowError::decode(StageType::Features, e))?;

    feature_tree::assign_ids(&mut output.modules);
    feature_tree::default_selected(&mut output.modules);
    Ok(output)
}

pub fn normalize_prd(raw: Value) -> Result<PrdDocument> {
    serde_json::from_value(wrap_bare_list(raw, "modules"))
        .map_err(|e| WorkflowError::decode(StageType::Prd, e))
}

pub fn normalize_testcases(raw: Value) -> Result<TestcasesOutput> {
    serde_json::from_value(wrap_bare_list(raw, "test_suites"))
        .map_err(|e| WorkflowError::decode(StageType::Testcases, e))
}

pub fn normalize_prototype(raw: Value) -> Result<PrototypeOutput> {
    serde_json::from_value(wrap_bare_list(raw, "screens"))
        .map_err(|e| WorkflowError::decode(StageType::Prototype, e))
}

/// Decode a demo structure and reset every page to `pending` with empty code.
///
/// Pages without an id receive `page_<n>`; duplicate ids receive a `_<k>`
/// suffix so ids stay unique across the whole structure.
pub fn normalize_demo_structure(raw: Value) -> Result<DemoStructure> {
    let mut structure: DemoStructure = serde_json::from_value(raw)
        .map_err(|e| WorkflowError::decode(StageType::Demo, e))?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut counter = 0usize;

    for platform in structure.platforms.iter_mut() {
        for (index, page) in platform.pages.iter_mut().enumerate() {
            counter += 1;

            let mut id = page.id.trim().to_string();
            if id.is_empty() {
                id = format!("page_{}", counter);
            }
            if seen.contains(&id) {
                let base = id.clone();
                let mut k = 2;
                while seen.contains(&format!("{}_{}", base, k)) {
                    k += 1;
                }
                id = format!("{}_{}", base, k);
                debug!(page_id = %base, renamed = %id, "Renamed duplicate page id");
            }
            seen.insert(id.clone());
            page.id = id;

            if page.order <= 0 {
                page.order = index as i64 + 1;
            }
            page.status = PageStatus::Pending;
            page.code = String::new();
            page.error = None;
            page.skip_reason = None;
        }
    }

    Ok(structure)
}
