//! # Schema Validation
//!
//! Turns migrated, untyped JSON into a typed [`AppState`] and checks the
//! invariants serde cannot express (non-negative costs, referential
//! integrity, unique ids). Every failure is reported as a
//! [`ValidationIssue`] carrying the field path, so an import screen can show
//! one message per bad field instead of a single opaque error.
//!
//! Paths join segments with ` > `, e.g. `projectMaterials > 2 > quantity`;
//! an empty path renders as `root`.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::shared::models::{
    AppState, LaborRateUnit, LaborType, Material, Project, ProjectMaterial, ProjectPhoto, Settings,
    CURRENT_SCHEMA_VERSION,
};

/// Currency codes the pricing screens know how to format
pub const SUPPORTED_CURRENCY_CODES: &[&str] = &[
    "USD", "CAD", "EUR", "GBP", "AUD", "MXN", "JPY", "CHF", "NZD", "INR",
];

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "root" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// The full list of issues found in one document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    /// One user-facing line per issue
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Outcome of validating a document: the typed state or every issue found
pub type ValidationResult = Result<AppState, ValidationErrors>;

/// Accumulates issues while walking the document
#[derive(Default)]
struct Collector {
    issues: Vec<ValidationIssue>,
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{} > {}", path, key)
    }
}

impl Collector {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(path, message));
    }

    fn value_at<T: DeserializeOwned>(&mut self, value: &Value, path: &str) -> Option<T> {
        match T::deserialize(value) {
            Ok(v) => Some(v),
            Err(e) => {
                self.push(path, e.to_string());
                None
            }
        }
    }

    fn field<T: DeserializeOwned>(&mut self, obj: &Map<String, Value>, key: &str) -> Option<T> {
        self.field_at(obj, "", key)
    }

    fn field_at<T: DeserializeOwned>(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<T> {
        let path = join(path, key);
        let Some(value) = obj.get(key) else {
            self.push(path, "Required");
            return None;
        };
        self.value_at(value, &path)
    }

    /// Keys with a serde default may be absent or null
    fn optional_at<T: DeserializeOwned>(&mut self, obj: &Map<String, Value>, path: &str, key: &str) {
        if let Some(value) = obj.get(key).filter(|v| !v.is_null()) {
            let _: Option<T> = self.value_at(value, &join(path, key));
        }
    }

    /// Check an object key by key, then build it whole
    fn object<T: FieldSchema>(&mut self, value: &Value, path: &str) -> Option<T> {
        let Some(obj) = value.as_object() else {
            self.push(path, "Expected object");
            return None;
        };
        let before = self.issues.len();
        T::check_fields(self, obj, path);
        if self.issues.len() > before {
            return None;
        }
        self.value_at(value, path)
    }

    fn object_field<T: FieldSchema>(&mut self, obj: &Map<String, Value>, key: &str) -> Option<T> {
        let Some(value) = obj.get(key) else {
            self.push(key, "Required");
            return None;
        };
        self.object(value, key)
    }

    /// Validate each element on its own so one bad row does not hide others
    fn list<T: FieldSchema>(&mut self, obj: &Map<String, Value>, key: &str) -> Vec<T> {
        let Some(value) = obj.get(key) else {
            self.push(key, "Required");
            return Vec::new();
        };
        let Some(items) = value.as_array() else {
            self.push(key, "Expected array");
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.object(item, &join(key, &i.to_string())))
            .collect()
    }
}

/// Per-key shape of an object in the document
trait FieldSchema: DeserializeOwned {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str);
}

impl FieldSchema for Settings {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str) {
        c.field_at::<String>(obj, path, "currencySymbol");
        c.optional_at::<String>(obj, path, "currencyCode");
        c.field_at::<f64>(obj, path, "laborRate");
        c.field_at::<LaborRateUnit>(obj, path, "laborRateUnit");
        c.optional_at::<bool>(obj, path, "laborRatePromptDismissed");
        c.optional_at::<Uuid>(obj, path, "defaultLaborTypeId");
    }
}

impl FieldSchema for Material {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str) {
        c.field_at::<Uuid>(obj, path, "id");
        c.field_at::<String>(obj, path, "name");
        c.field_at::<f64>(obj, path, "unitCost");
        c.field_at::<String>(obj, path, "unit");
        c.optional_at::<String>(obj, path, "notes");
    }
}

impl FieldSchema for LaborType {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str) {
        c.field_at::<Uuid>(obj, path, "id");
        c.field_at::<String>(obj, path, "name");
        c.field_at::<f64>(obj, path, "rate");
        c.field_at::<LaborRateUnit>(obj, path, "rateUnit");
        c.optional_at::<i64>(obj, path, "sortOrder");
    }
}

impl FieldSchema for Project {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str) {
        c.field_at::<Uuid>(obj, path, "id");
        c.field_at::<String>(obj, path, "name");
        c.field_at::<String>(obj, path, "slug");
        c.optional_at::<String>(obj, path, "description");
        c.field_at::<f64>(obj, path, "laborMinutes");
        c.optional_at::<Uuid>(obj, path, "laborTypeId");
        c.field_at::<DateTime<Utc>>(obj, path, "createdAt");
        c.field_at::<DateTime<Utc>>(obj, path, "updatedAt");
    }
}

impl FieldSchema for ProjectMaterial {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str) {
        c.field_at::<Uuid>(obj, path, "id");
        c.field_at::<Uuid>(obj, path, "projectId");
        c.optional_at::<Uuid>(obj, path, "materialId");
        c.field_at::<f64>(obj, path, "quantity");
        c.field_at::<String>(obj, path, "materialName");
        c.field_at::<f64>(obj, path, "materialUnitCost");
        c.field_at::<String>(obj, path, "materialUnit");
    }
}

impl FieldSchema for ProjectPhoto {
    fn check_fields(c: &mut Collector, obj: &Map<String, Value>, path: &str) {
        c.field_at::<Uuid>(obj, path, "id");
        c.field_at::<Uuid>(obj, path, "projectId");
        c.field_at::<String>(obj, path, "storagePath");
        c.optional_at::<String>(obj, path, "altText");
        c.optional_at::<i64>(obj, path, "sortOrder");
        c.field_at::<DateTime<Utc>>(obj, path, "createdAt");
    }
}

/// Validate a migrated document and build the typed state
pub fn validate_value(value: &Value) -> ValidationResult {
    let Some(obj) = value.as_object() else {
        return Err(ValidationErrors(vec![ValidationIssue::new(
            "",
            "Expected an object",
        )]));
    };

    let mut c = Collector::default();

    let version: Option<u32> = c.field(obj, "version");
    if let Some(v) = version {
        if v != CURRENT_SCHEMA_VERSION {
            c.push("version", format!("Unsupported schema version {}", v));
        }
    }

    let settings: Option<Settings> = c.object_field(obj, "settings");
    let materials: Vec<Material> = c.list(obj, "materials");
    let labor_types: Vec<LaborType> = c.list(obj, "laborTypes");
    let projects: Vec<Project> = c.list(obj, "projects");
    let project_materials: Vec<ProjectMaterial> = c.list(obj, "projectMaterials");
    let project_photos: Vec<ProjectPhoto> = c.list(obj, "projectPhotos");
    let last_selected_project_id: Option<Option<Uuid>> = c.field(obj, "lastSelectedProjectId");

    if !c.issues.is_empty() {
        return Err(ValidationErrors(c.issues));
    }

    let (Some(settings), Some(last_selected_project_id)) = (settings, last_selected_project_id)
    else {
        return Err(ValidationErrors(c.issues));
    };

    let state = AppState {
        version: CURRENT_SCHEMA_VERSION,
        settings,
        materials,
        labor_types,
        projects,
        project_materials,
        project_photos,
        last_selected_project_id,
    };

    let issues = check_invariants(&state);
    if issues.is_empty() {
        Ok(state)
    } else {
        Err(ValidationErrors(issues))
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Semantic checks on an already-typed state
pub fn check_invariants(state: &AppState) -> Vec<ValidationIssue> {
    let mut c = Collector::default();

    let settings = &state.settings;
    if blank(&settings.currency_symbol) {
        c.push("settings > currencySymbol", "Currency symbol is required");
    }
    if let Some(code) = &settings.currency_code {
        if !SUPPORTED_CURRENCY_CODES.contains(&code.as_str()) {
            c.push("settings > currencyCode", format!("Unsupported currency code {}", code));
        }
    }
    if !non_negative(settings.labor_rate) {
        c.push("settings > laborRate", "Labor rate must be non-negative");
    }

    let mut seen = HashSet::new();
    for (i, m) in state.materials.iter().enumerate() {
        if !seen.insert(m.id) {
            c.push(format!("materials > {} > id", i), "Duplicate id");
        }
        if blank(&m.name) {
            c.push(format!("materials > {} > name", i), "Material name is required");
        }
        if !non_negative(m.unit_cost) {
            c.push(format!("materials > {} > unitCost", i), "Unit cost must be non-negative");
        }
        if blank(&m.unit) {
            c.push(format!("materials > {} > unit", i), "Unit is required");
        }
    }

    seen.clear();
    for (i, lt) in state.labor_types.iter().enumerate() {
        if !seen.insert(lt.id) {
            c.push(format!("laborTypes > {} > id", i), "Duplicate id");
        }
        if blank(&lt.name) {
            c.push(format!("laborTypes > {} > name", i), "Labor type name is required");
        }
        if !non_negative(lt.rate) {
            c.push(format!("laborTypes > {} > rate", i), "Rate must be non-negative");
        }
    }

    let project_ids: HashSet<Uuid> = state.projects.iter().map(|p| p.id).collect();
    seen.clear();
    for (i, p) in state.projects.iter().enumerate() {
        if !seen.insert(p.id) {
            c.push(format!("projects > {} > id", i), "Duplicate id");
        }
        if blank(&p.name) {
            c.push(format!("projects > {} > name", i), "Project name is required");
        }
        if !valid_slug(&p.slug) {
            c.push(format!("projects > {} > slug", i), "Slug must be lowercase letters, digits and dashes");
        }
        if !non_negative(p.labor_minutes) {
            c.push(format!("projects > {} > laborMinutes", i), "Labor minutes must be non-negative");
        }
    }

    seen.clear();
    for (i, pm) in state.project_materials.iter().enumerate() {
        if !seen.insert(pm.id) {
            c.push(format!("projectMaterials > {} > id", i), "Duplicate id");
        }
        if !project_ids.contains(&pm.project_id) {
            c.push(format!("projectMaterials > {} > projectId", i), "Project does not exist");
        }
        if !(pm.quantity.is_finite() && pm.quantity > 0.0) {
            c.push(format!("projectMaterials > {} > quantity", i), "Quantity must be greater than 0");
        }
        if !non_negative(pm.material_unit_cost) {
            c.push(
                format!("projectMaterials > {} > materialUnitCost", i),
                "Unit cost must be non-negative",
            );
        }
    }

    seen.clear();
    for (i, photo) in state.project_photos.iter().enumerate() {
        if !seen.insert(photo.id) {
            c.push(format!("projectPhotos > {} > id", i), "Duplicate id");
        }
        if !project_ids.contains(&photo.project_id) {
            c.push(format!("projectPhotos > {} > projectId", i), "Project does not exist");
        }
        if blank(&photo.storage_path) {
            c.push(format!("projectPhotos > {} > storagePath", i), "Storage path is required");
        }
    }

    c.issues
}
