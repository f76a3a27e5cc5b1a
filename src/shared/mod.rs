//! Shared Module
//!
//! Types and helpers used by every layer: the domain model, the pricing
//! calculator, schema validation, error types and configuration.

/// Domain model and the `AppState` aggregate
pub mod models;

/// Suggested-price calculator
pub mod pricing;

/// Field-level schema validation
pub mod validation;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::CraftError;
pub use models::{
    AppState, LaborRateUnit, LaborType, Material, Project, ProjectMaterial, ProjectPhoto,
    Settings, CURRENT_SCHEMA_VERSION,
};
pub use validation::{ValidationErrors, ValidationIssue, ValidationResult};
