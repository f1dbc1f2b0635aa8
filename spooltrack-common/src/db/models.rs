//! Database models
//!
//! Row types for the inventory tables plus the normalized filament key used
//! for all (type, color, brand) matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized (type, color, brand) triple.
///
/// Filament link groups and ideal-inventory targets identify filaments by
/// this composite value rather than by row reference, so one key matches any
/// current or future spool sharing the triple. All three fields are stored
/// uppercased and trimmed; matching is therefore case-insensitive by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilamentKey {
    pub filament_type: String,
    pub color: String,
    pub brand: String,
}

impl FilamentKey {
    pub fn new(filament_type: &str, color: &str, brand: &str) -> Self {
        Self {
            filament_type: filament_type.trim().to_uppercase(),
            color: color.trim().to_uppercase(),
            brand: brand.trim().to_uppercase(),
        }
    }
}

impl std::fmt::Display for FilamentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.filament_type, self.color, self.brand)
    }
}

/// A filament spool in the inventory
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Filament {
    pub id: String,
    #[sqlx(rename = "type")]
    pub filament_type: String,
    pub color: String,
    pub brand: String,
    /// Grams of filament left on the spool
    pub quantity_remaining: f64,
    /// Total spool weight in grams
    pub spool_weight: f64,
    /// Price per spool, if known
    pub price: Option<f64>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl Filament {
    pub fn key(&self) -> FilamentKey {
        FilamentKey::new(&self.filament_type, &self.color, &self.brand)
    }

    /// Display label preserving the user's casing
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.filament_type, self.color, self.brand)
    }
}

/// A 3D printer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Printer {
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    /// Power draw in kW, if known
    pub power_consumption: Option<f64>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// A replaceable printer component (nozzle, belt, ...)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrinterComponent {
    pub id: String,
    pub printer_id: String,
    pub name: String,
    pub installation_date: DateTime<Utc>,
    /// Recommended replacement interval in hours
    pub replacement_interval: Option<f64>,
    /// Hours accumulated since installation
    pub usage_hours: f64,
    pub notes: Option<String>,
}

impl PrinterComponent {
    /// Whether usage has reached the recommended replacement interval
    pub fn is_due_for_replacement(&self) -> bool {
        match self.replacement_interval {
            Some(interval) => interval > 0.0 && self.usage_hours >= interval,
            None => false,
        }
    }
}

/// A recorded print job. Up to three secondary filament slots support
/// multicolor prints.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrintJob {
    pub id: String,
    pub date: DateTime<Utc>,
    pub project_name: String,
    pub filament_id: String,
    pub printer_id: String,
    /// Grams of primary filament used
    pub filament_used: f64,
    /// Duration in hours
    pub duration: f64,
    pub notes: Option<String>,
    pub filament_id_2: Option<String>,
    pub filament_used_2: Option<f64>,
    pub filament_id_3: Option<String>,
    pub filament_used_3: Option<f64>,
    pub filament_id_4: Option<String>,
    pub filament_used_4: Option<f64>,
}

impl PrintJob {
    /// All (filament id, grams used) pairs of the job, primary first.
    pub fn filament_usages(&self) -> Vec<(String, f64)> {
        let mut usages = vec![(self.filament_id.clone(), self.filament_used)];
        let secondary = [
            (&self.filament_id_2, &self.filament_used_2),
            (&self.filament_id_3, &self.filament_used_3),
            (&self.filament_id_4, &self.filament_used_4),
        ];
        for (id, used) in secondary {
            if let (Some(id), Some(used)) = (id, used) {
                usages.push((id.clone(), *used));
            }
        }
        usages
    }

    /// Total grams used across all filament slots
    pub fn total_filament_used(&self) -> f64 {
        self.filament_usages().iter().map(|(_, g)| g).sum()
    }
}

/// A named set of filament triples managed as one inventory unit
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FilamentLinkGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Target stock level for the whole group, in grams
    pub ideal_quantity: f64,
}

/// Membership record of a link group; matches by normalized triple
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FilamentLink {
    pub id: String,
    pub group_id: String,
    #[sqlx(rename = "type")]
    pub filament_type: String,
    pub color: String,
    pub brand: String,
}

impl FilamentLink {
    pub fn key(&self) -> FilamentKey {
        FilamentKey::new(&self.filament_type, &self.color, &self.brand)
    }
}

/// Per-triple target stock level used while the triple is not in a group
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdealInventory {
    #[sqlx(rename = "type")]
    pub filament_type: String,
    pub color: String,
    pub brand: String,
    pub ideal_quantity: f64,
}

impl IdealInventory {
    pub fn key(&self) -> FilamentKey {
        FilamentKey::new(&self.filament_type, &self.color, &self.brand)
    }
}
