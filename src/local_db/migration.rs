//! # Schema Migration
//!
//! Normalizes any document this app ever wrote into the current shape.
//!
//! Documents carrying a `version` tag dispatch on it. Documents without one
//! predate versioning and go through the structural legacy path, which
//! guesses from field presence:
//!
//! - settings with a currency symbol but no code get the code the symbol
//!   implies, then missing fields are merged with defaults
//! - per-project embedded `materials: [{ materialId, quantity }]` arrays
//!   become `projectMaterials` snapshots, looking up the material's name,
//!   cost and unit at migration time (`Unknown`/0/`unit` when it is gone)
//! - projects without a slug get one derived from their name
//! - numeric epoch-millisecond timestamps become RFC 3339 strings
//!
//! Running [`migrate`] on its own output is a no-op.

use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::shared::models::{slugify, Settings, CURRENT_SCHEMA_VERSION};
use crate::shared::pricing::currency_code_for_symbol;

const COLLECTIONS: &[&str] = &[
    "materials",
    "laborTypes",
    "projects",
    "projectMaterials",
    "projectPhotos",
];

/// Bring `raw` up to the current schema.
///
/// Non-object input and unknown future versions are returned untouched so
/// validation can reject them.
pub fn migrate(raw: Value) -> Value {
    let mut obj = match raw {
        Value::Object(obj) => obj,
        other => return other,
    };

    match obj.get("version") {
        None => {
            tracing::debug!("Migrating unversioned state document");
            migrate_legacy(&mut obj);
            obj.insert("version".to_string(), json!(CURRENT_SCHEMA_VERSION));
        }
        Some(v) if v.as_u64() == Some(u64::from(CURRENT_SCHEMA_VERSION)) => {}
        Some(v) => {
            tracing::warn!("State document has unsupported schema version {}", v);
            return Value::Object(obj);
        }
    }

    fill_defaults(&mut obj);
    Value::Object(obj)
}

/// Fill parts every version may omit: settings fields, empty collections,
/// the UI selection.
fn fill_defaults(obj: &mut Map<String, Value>) {
    let defaults = match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(defaults)) => defaults,
        _ => Map::new(),
    };

    match obj.get_mut("settings") {
        Some(Value::Object(settings)) => {
            for (key, value) in defaults {
                settings.entry(key).or_insert(value);
            }
        }
        Some(Value::Null) | None => {
            obj.insert("settings".to_string(), Value::Object(defaults));
        }
        // Wrong type: leave for validation to report.
        Some(_) => {}
    }

    for key in COLLECTIONS {
        match obj.get(*key) {
            None | Some(Value::Null) => {
                obj.insert((*key).to_string(), json!([]));
            }
            Some(_) => {}
        }
    }

    if !obj.contains_key("lastSelectedProjectId") {
        obj.insert("lastSelectedProjectId".to_string(), Value::Null);
    }
}

fn migrate_legacy(obj: &mut Map<String, Value>) {
    if let Some(Value::Object(settings)) = obj.get_mut("settings") {
        derive_currency_code(settings);
    }

    let materials = obj
        .get("materials")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let has_project_materials = obj
        .get("projectMaterials")
        .map(Value::is_array)
        .unwrap_or(false);

    let mut snapshots = Vec::new();

    if let Some(Value::Array(projects)) = obj.get_mut("projects") {
        for project in projects.iter_mut() {
            let Value::Object(project) = project else {
                continue;
            };

            let embedded = project.remove("materials");
            if !has_project_materials {
                if let (Some(Value::Array(entries)), Some(project_id)) =
                    (embedded, project.get("id").cloned())
                {
                    snapshots.extend(
                        entries
                            .iter()
                            .map(|entry| snapshot_entry(&project_id, entry, &materials)),
                    );
                }
            }

            if !project.contains_key("slug") {
                let name = project.get("name").and_then(Value::as_str).unwrap_or("");
                project.insert("slug".to_string(), json!(slugify(name)));
            }

            for field in ["createdAt", "updatedAt"] {
                coerce_timestamp(project, field);
            }
        }
    }

    if let Some(Value::Array(photos)) = obj.get_mut("projectPhotos") {
        for photo in photos.iter_mut().filter_map(Value::as_object_mut) {
            coerce_timestamp(photo, "createdAt");
        }
    }

    if !has_project_materials {
        tracing::debug!("Converted {} embedded project materials to snapshots", snapshots.len());
        obj.insert("projectMaterials".to_string(), Value::Array(snapshots));
    }
}

/// Settings from before currency codes: infer the code from the symbol
fn derive_currency_code(settings: &mut Map<String, Value>) {
    if settings.get("currencyCode").is_some_and(|code| !code.is_null()) {
        return;
    }
    if let Some(symbol) = settings.get("currencySymbol").and_then(Value::as_str) {
        let code = currency_code_for_symbol(symbol);
        settings.insert("currencyCode".to_string(), json!(code));
    }
}

/// Build a snapshot row from a legacy `{ materialId, quantity }` entry
fn snapshot_entry(project_id: &Value, entry: &Value, materials: &[Value]) -> Value {
    let material_id = entry.get("materialId").cloned().unwrap_or(Value::Null);
    let quantity = entry.get("quantity").cloned().unwrap_or(json!(1));
    let source = materials
        .iter()
        .find(|m| !material_id.is_null() && m.get("id") == Some(&material_id));

    let (name, unit_cost, unit) = match source {
        Some(m) => (
            m.get("name").cloned().unwrap_or(json!("Unknown")),
            m.get("unitCost").cloned().unwrap_or(json!(0)),
            m.get("unit").cloned().unwrap_or(json!("unit")),
        ),
        None => (json!("Unknown"), json!(0), json!("unit")),
    };

    json!({
        "id": Uuid::new_v4(),
        "projectId": project_id,
        "materialId": material_id,
        "quantity": quantity,
        "materialName": name,
        "materialUnitCost": unit_cost,
        "materialUnit": unit,
    })
}

/// Rewrite an epoch-millis number at `field` as an RFC 3339 string
fn coerce_timestamp(obj: &mut Map<String, Value>, field: &str) {
    let Some(millis) = obj.get(field).and_then(|v| {
        v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
    }) else {
        return;
    };

    if let Some(ts) = DateTime::from_timestamp_millis(millis) {
        obj.insert(
            field.to_string(),
            json!(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
}
