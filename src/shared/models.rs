//! Domain Model
//!
//! The data a crafter catalogs: the material library, labor types, projects,
//! the per-project material snapshots, and photos. `AppState` is the root
//! aggregate persisted locally and pushed to a workspace as a whole.
//!
//! All types serialize with camelCase field names so that exported backups
//! and remote payloads share one JSON shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version stamped on every state written by this crate.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Unit a labor rate is expressed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LaborRateUnit {
    #[serde(rename = "hour")]
    Hour,
    #[default]
    #[serde(rename = "minute")]
    Minute,
    #[serde(rename = "15min")]
    FifteenMinutes,
}

impl LaborRateUnit {
    /// Human-readable label used after "per"
    pub fn label(self) -> &'static str {
        match self {
            LaborRateUnit::Hour => "hour",
            LaborRateUnit::Minute => "minute",
            LaborRateUnit::FifteenMinutes => "15 minutes",
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub currency_symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    /// Flat labor rate, used when a project resolves no labor type
    pub labor_rate: f64,
    pub labor_rate_unit: LaborRateUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labor_rate_prompt_dismissed: Option<bool>,
    #[serde(default)]
    pub default_labor_type_id: Option<Uuid>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            currency_code: Some("USD".to_string()),
            labor_rate: 0.33,
            labor_rate_unit: LaborRateUnit::Minute,
            labor_rate_prompt_dismissed: None,
            default_labor_type_id: None,
        }
    }
}

/// A material in the shared materials library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub unit_cost: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A named labor rate (e.g. "Sewing" at $30/hour)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaborType {
    pub id: Uuid,
    pub name: String,
    pub rate: f64,
    pub rate_unit: LaborRateUnit,
    #[serde(default)]
    pub sort_order: i64,
}

/// A craft project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub labor_minutes: f64,
    #[serde(default)]
    pub labor_type_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A material assigned to a project.
///
/// Name, cost and unit are copied from the library at assignment time so
/// later edits (or deletion) of the source material do not change
/// historical pricing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMaterial {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(default)]
    pub material_id: Option<Uuid>,
    pub quantity: f64,
    pub material_name: String,
    pub material_unit_cost: f64,
    pub material_unit: String,
}

impl ProjectMaterial {
    /// Snapshot `material` into a new assignment on `project_id`
    pub fn snapshot(project_id: Uuid, material: &Material, quantity: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            material_id: Some(material.id),
            quantity,
            material_name: material.name.clone(),
            material_unit_cost: material.unit_cost,
            material_unit: material.unit.clone(),
        }
    }
}

/// Photo attached to a project; the bytes live in remote object storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPhoto {
    pub id: Uuid,
    pub project_id: Uuid,
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Complete application state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub version: u32,
    pub settings: Settings,
    pub materials: Vec<Material>,
    pub labor_types: Vec<LaborType>,
    pub projects: Vec<Project>,
    pub project_materials: Vec<ProjectMaterial>,
    pub project_photos: Vec<ProjectPhoto>,
    /// Purely local UI state, never taken from a remote pull
    pub last_selected_project_id: Option<Uuid>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            settings: Settings::default(),
            materials: Vec::new(),
            labor_types: Vec::new(),
            projects: Vec::new(),
            project_materials: Vec::new(),
            project_photos: Vec::new(),
            last_selected_project_id: None,
        }
    }
}

impl AppState {
    pub fn material(&self, id: Uuid) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn labor_type(&self, id: Uuid) -> Option<&LaborType> {
        self.labor_types.iter().find(|lt| lt.id == id)
    }

    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Project-material snapshots belonging to `project_id`
    pub fn materials_for_project(&self, project_id: Uuid) -> impl Iterator<Item = &ProjectMaterial> {
        self.project_materials
            .iter()
            .filter(move |pm| pm.project_id == project_id)
    }

    pub fn photos_for_project(&self, project_id: Uuid) -> impl Iterator<Item = &ProjectPhoto> {
        self.project_photos
            .iter()
            .filter(move |photo| photo.project_id == project_id)
    }

    /// Replace everything except the local-only UI selection with `remote`.
    pub fn overwrite_from_remote(&mut self, remote: AppState) {
        let last_selected = self.last_selected_project_id;
        *self = remote;
        self.last_selected_project_id = last_selected;
    }
}

/// Derive a URL-safe slug from a project name
///
/// Lowercases, collapses runs of non-alphanumerics into a single `-`,
/// trims leading/trailing dashes and caps the length at 60 characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
        if slug.len() >= 60 {
            break;
        }
    }

    slug.truncate(60);
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}
