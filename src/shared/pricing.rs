//! Suggested-price calculator.
//!
//! Materials are priced from the project's snapshots, never from the live
//! library, so editing a material's cost does not reprice old projects.

use serde::Serialize;
use uuid::Uuid;

use crate::shared::models::{AppState, LaborRateUnit, Project};

/// Convert a labor rate to cost per minute
pub fn labor_rate_per_minute(rate: f64, unit: LaborRateUnit) -> f64 {
    match unit {
        LaborRateUnit::Hour => rate / 60.0,
        LaborRateUnit::FifteenMinutes => rate / 15.0,
        LaborRateUnit::Minute => rate,
    }
}

/// Labor rate that applies to `project`, as `(rate, unit)`.
///
/// The project's own labor type wins, then the workspace default labor type,
/// then the flat rate from settings.
pub fn effective_labor_rate(state: &AppState, project: &Project) -> (f64, LaborRateUnit) {
    project
        .labor_type_id
        .and_then(|id| state.labor_type(id))
        .or_else(|| {
            state
                .settings
                .default_labor_type_id
                .and_then(|id| state.labor_type(id))
        })
        .map(|lt| (lt.rate, lt.rate_unit))
        .unwrap_or((state.settings.labor_rate, state.settings.labor_rate_unit))
}

pub fn materials_total(state: &AppState, project_id: Uuid) -> f64 {
    state
        .materials_for_project(project_id)
        .map(|pm| pm.material_unit_cost * pm.quantity)
        .sum()
}

pub fn labor_cost(state: &AppState, project: &Project) -> f64 {
    let (rate, unit) = effective_labor_rate(state, project);
    project.labor_minutes * labor_rate_per_minute(rate, unit)
}

/// Cost breakdown for one project
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub materials: f64,
    pub labor: f64,
    pub total: f64,
}

pub fn price_project(state: &AppState, project: &Project) -> PriceBreakdown {
    let materials = materials_total(state, project.id);
    let labor = labor_cost(state, project);
    PriceBreakdown {
        materials,
        labor,
        total: materials + labor,
    }
}

/// Format an amount with two decimals behind `symbol`
pub fn format_currency(amount: f64, symbol: &str) -> String {
    format!("{}{:.2}", symbol, amount)
}

/// Currency code assumed when a symbol alone cannot tell
pub const DEFAULT_CURRENCY_CODE: &str = "USD";

/// Best-effort ISO 4217 code for settings saved with only a symbol
///
/// `$` is shared by several currencies and maps to the default.
pub fn currency_code_for_symbol(symbol: &str) -> &'static str {
    match symbol.trim() {
        "€" => "EUR",
        "£" => "GBP",
        "¥" => "JPY",
        "₹" => "INR",
        "CHF" => "CHF",
        _ => DEFAULT_CURRENCY_CODE,
    }
}
