//! Entity mutations on [`CraftStore`].
//!
//! Each returns the entity it touched (the removed one for deletions).
//! Deletions cascade: a material takes its project assignments with it, a
//! project takes its assignments and photos, a labor type is unlinked from
//! projects and settings.

use chrono::Utc;
use uuid::Uuid;

use super::CraftStore;
use crate::shared::error::{CraftError, Result};
use crate::shared::models::{
    slugify, AppState, LaborRateUnit, LaborType, Material, Project, ProjectMaterial, ProjectPhoto,
    Settings,
};
use crate::sync::ChangeKind;

const SETTINGS: &str = "settings";
const MATERIALS: &str = "materials";
const LABOR_TYPES: &str = "labor_types";
const PROJECTS: &str = "projects";
const PROJECT_MATERIALS: &str = "project_materials";
const PROJECT_PHOTOS: &str = "project_photos";

/// Fields for a new library material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialInput {
    pub name: String,
    pub unit_cost: f64,
    pub unit: String,
    pub notes: Option<String>,
}

impl MaterialInput {
    pub fn new(name: impl Into<String>, unit_cost: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit_cost,
            unit: unit.into(),
            notes: None,
        }
    }
}

/// Fields for a new project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub labor_minutes: f64,
    pub labor_type_id: Option<Uuid>,
}

impl ProjectInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn position<T>(items: &[T], id: Uuid, id_of: impl Fn(&T) -> Uuid, entity: &'static str) -> Result<usize> {
    items
        .iter()
        .position(|item| id_of(item) == id)
        .ok_or_else(|| CraftError::not_found(entity, id))
}

/// `base` slug, suffixed with `-2`, `-3`, ... until no other project uses it
fn unique_slug(state: &AppState, base: &str, own_id: Option<Uuid>) -> String {
    let taken = |slug: &str| {
        state
            .projects
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != own_id)
    };

    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| format!("{}-{}", base, Uuid::new_v4().simple()))
}

fn touch(state: &mut AppState, project_id: Uuid) {
    if let Some(project) = state.projects.iter_mut().find(|p| p.id == project_id) {
        project.updated_at = Utc::now();
    }
}

impl CraftStore {
    pub async fn update_settings(&self, update: impl FnOnce(&mut Settings)) -> Result<Settings> {
        self.commit(ChangeKind::Update, SETTINGS, |state| {
            update(&mut state.settings);
            if let Some(id) = state.settings.default_labor_type_id {
                if state.labor_type(id).is_none() {
                    return Err(CraftError::not_found("labor type", id));
                }
            }
            Ok(state.settings.clone())
        })
        .await
    }

    pub async fn add_material(&self, input: MaterialInput) -> Result<Material> {
        self.commit(ChangeKind::Insert, MATERIALS, |state| {
            let material = Material {
                id: Uuid::new_v4(),
                name: input.name.trim().to_string(),
                unit_cost: input.unit_cost,
                unit: input.unit.trim().to_string(),
                notes: input.notes,
            };
            state.materials.push(material.clone());
            Ok(material)
        })
        .await
    }

    /// Edit a library material; existing project snapshots keep their copy
    pub async fn update_material(&self, id: Uuid, update: impl FnOnce(&mut Material)) -> Result<Material> {
        self.commit(ChangeKind::Update, MATERIALS, |state| {
            let index = position(&state.materials, id, |m| m.id, "material")?;
            let material = &mut state.materials[index];
            update(material);
            material.id = id;
            Ok(material.clone())
        })
        .await
    }

    pub async fn delete_material(&self, id: Uuid) -> Result<Material> {
        self.commit(ChangeKind::Delete, MATERIALS, |state| {
            let index = position(&state.materials, id, |m| m.id, "material")?;
            let removed = state.materials.remove(index);
            state.project_materials.retain(|pm| pm.material_id != Some(id));
            Ok(removed)
        })
        .await
    }

    pub async fn add_labor_type(&self, name: &str, rate: f64, rate_unit: LaborRateUnit) -> Result<LaborType> {
        self.commit(ChangeKind::Insert, LABOR_TYPES, |state| {
            let sort_order = state
                .labor_types
                .iter()
                .map(|lt| lt.sort_order + 1)
                .max()
                .unwrap_or(0);
            let labor_type = LaborType {
                id: Uuid::new_v4(),
                name: name.trim().to_string(),
                rate,
                rate_unit,
                sort_order,
            };
            state.labor_types.push(labor_type.clone());
            Ok(labor_type)
        })
        .await
    }

    pub async fn update_labor_type(&self, id: Uuid, update: impl FnOnce(&mut LaborType)) -> Result<LaborType> {
        self.commit(ChangeKind::Update, LABOR_TYPES, |state| {
            let index = position(&state.labor_types, id, |lt| lt.id, "labor type")?;
            let labor_type = &mut state.labor_types[index];
            update(labor_type);
            labor_type.id = id;
            Ok(labor_type.clone())
        })
        .await
    }

    /// Remove a labor type; projects using it fall back to the default rate
    pub async fn delete_labor_type(&self, id: Uuid) -> Result<LaborType> {
        self.commit(ChangeKind::Delete, LABOR_TYPES, |state| {
            let index = position(&state.labor_types, id, |lt| lt.id, "labor type")?;
            let removed = state.labor_types.remove(index);

            for project in state.projects.iter_mut().filter(|p| p.labor_type_id == Some(id)) {
                project.labor_type_id = None;
            }
            if state.settings.default_labor_type_id == Some(id) {
                state.settings.default_labor_type_id = None;
            }
            Ok(removed)
        })
        .await
    }

    pub async fn add_project(&self, input: ProjectInput) -> Result<Project> {
        self.commit(ChangeKind::Insert, PROJECTS, |state| {
            if let Some(lt) = input.labor_type_id {
                if state.labor_type(lt).is_none() {
                    return Err(CraftError::not_found("labor type", lt));
                }
            }

            let name = input.name.trim().to_string();
            let slug = unique_slug(state, &slugify(&name), None);
            let now = Utc::now();
            let project = Project {
                id: Uuid::new_v4(),
                name,
                slug,
                description: input.description,
                labor_minutes: input.labor_minutes,
                labor_type_id: input.labor_type_id,
                created_at: now,
                updated_at: now,
            };
            state.projects.push(project.clone());
            Ok(project)
        })
        .await
    }

    /// Edit a project; the slug is kept stable unless the edit changes it
    pub async fn update_project(&self, id: Uuid, update: impl FnOnce(&mut Project)) -> Result<Project> {
        self.commit(ChangeKind::Update, PROJECTS, |state| {
            let index = position(&state.projects, id, |p| p.id, "project")?;
            let mut project = state.projects[index].clone();
            let created_at = project.created_at;

            update(&mut project);
            project.id = id;
            project.created_at = created_at;
            project.updated_at = Utc::now();
            if let Some(lt) = project.labor_type_id {
                if state.labor_type(lt).is_none() {
                    return Err(CraftError::not_found("labor type", lt));
                }
            }
            if project.slug != state.projects[index].slug {
                project.slug = unique_slug(state, &slugify(&project.slug), Some(id));
            }

            state.projects[index] = project.clone();
            Ok(project)
        })
        .await
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<Project> {
        self.commit(ChangeKind::Delete, PROJECTS, |state| {
            let index = position(&state.projects, id, |p| p.id, "project")?;
            let removed = state.projects.remove(index);

            state.project_materials.retain(|pm| pm.project_id != id);
            state.project_photos.retain(|photo| photo.project_id != id);
            if state.last_selected_project_id == Some(id) {
                state.last_selected_project_id = None;
            }
            Ok(removed)
        })
        .await
    }

    /// Assign a library material to a project, snapshotting its name, cost
    /// and unit. Assigning the same material again adds to its quantity.
    pub async fn add_material_to_project(
        &self,
        project_id: Uuid,
        material_id: Uuid,
        quantity: f64,
    ) -> Result<ProjectMaterial> {
        self.commit(ChangeKind::Insert, PROJECT_MATERIALS, |state| {
            if state.project(project_id).is_none() {
                return Err(CraftError::not_found("project", project_id));
            }
            let material = state
                .material(material_id)
                .cloned()
                .ok_or_else(|| CraftError::not_found("material", material_id))?;

            let existing = state
                .project_materials
                .iter_mut()
                .find(|pm| pm.project_id == project_id && pm.material_id == Some(material_id));
            let assignment = match existing {
                Some(pm) => {
                    pm.quantity += quantity;
                    pm.clone()
                }
                None => {
                    let pm = ProjectMaterial::snapshot(project_id, &material, quantity);
                    state.project_materials.push(pm.clone());
                    pm
                }
            };

            touch(state, project_id);
            Ok(assignment)
        })
        .await
    }

    pub async fn update_project_material(&self, id: Uuid, quantity: f64) -> Result<ProjectMaterial> {
        self.commit(ChangeKind::Update, PROJECT_MATERIALS, |state| {
            let index = position(&state.project_materials, id, |pm| pm.id, "project material")?;
            let assignment = &mut state.project_materials[index];
            assignment.quantity = quantity;
            let assignment = assignment.clone();

            touch(state, assignment.project_id);
            Ok(assignment)
        })
        .await
    }

    pub async fn remove_project_material(&self, id: Uuid) -> Result<ProjectMaterial> {
        self.commit(ChangeKind::Delete, PROJECT_MATERIALS, |state| {
            let index = position(&state.project_materials, id, |pm| pm.id, "project material")?;
            let removed = state.project_materials.remove(index);

            touch(state, removed.project_id);
            Ok(removed)
        })
        .await
    }

    /// Attach an already-uploaded photo to a project
    pub async fn add_photo(
        &self,
        project_id: Uuid,
        storage_path: &str,
        alt_text: Option<String>,
    ) -> Result<ProjectPhoto> {
        self.commit(ChangeKind::Insert, PROJECT_PHOTOS, |state| {
            if state.project(project_id).is_none() {
                return Err(CraftError::not_found("project", project_id));
            }
            let sort_order = state.photos_for_project(project_id).count() as i64;
            let photo = ProjectPhoto {
                id: Uuid::new_v4(),
                project_id,
                storage_path: storage_path.to_string(),
                alt_text,
                sort_order,
                created_at: Utc::now(),
            };
            state.project_photos.push(photo.clone());
            Ok(photo)
        })
        .await
    }

    pub async fn remove_photo(&self, id: Uuid) -> Result<ProjectPhoto> {
        self.commit(ChangeKind::Delete, PROJECT_PHOTOS, |state| {
            let index = position(&state.project_photos, id, |photo| photo.id, "photo")?;
            Ok(state.project_photos.remove(index))
        })
        .await
    }
}
