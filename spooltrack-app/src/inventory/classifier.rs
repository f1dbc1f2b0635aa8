//! Status band classification
//!
//! Maps a current/ideal percentage to one of seven status bands. Total over
//! every input; called once per row per refresh, no caching.

use serde::{Deserialize, Serialize};

/// Stock level classification for one inventory row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusBand {
    /// No ideal quantity configured (or configured as zero)
    NoTargetSet,
    /// Target set but nothing in stock
    OutOfStock,
    /// Below 20% of target
    Critical,
    /// 20% up to 50% of target
    Low,
    /// 50% up to 95% of target
    Adequate,
    /// 95% up to 120% of target
    Optimal,
    /// 120% of target or more
    Overstocked,
}

impl StatusBand {
    /// Classify a percentage of ideal quantity.
    ///
    /// Boundaries are inclusive below, exclusive above: 20.0 is `Low`,
    /// 19.999 is `Critical`. `None` means no target is configured.
    pub fn classify(percentage: Option<f64>) -> StatusBand {
        match percentage {
            None => StatusBand::NoTargetSet,
            Some(p) if p <= 0.0 => StatusBand::OutOfStock,
            Some(p) if p < 20.0 => StatusBand::Critical,
            Some(p) if p < 50.0 => StatusBand::Low,
            Some(p) if p < 95.0 => StatusBand::Adequate,
            Some(p) if p < 120.0 => StatusBand::Optimal,
            Some(_) => StatusBand::Overstocked,
        }
    }

    /// Human-readable band name
    pub fn name(&self) -> &'static str {
        match self {
            StatusBand::NoTargetSet => "No Target Set",
            StatusBand::OutOfStock => "Out of Stock",
            StatusBand::Critical => "Critical",
            StatusBand::Low => "Low",
            StatusBand::Adequate => "Adequate",
            StatusBand::Optimal => "Optimal",
            StatusBand::Overstocked => "Overstocked",
        }
    }

    /// Display color as a hex RGB string.
    ///
    /// Group rows render a darker variant of the same hue so they stand out
    /// from individual-filament rows.
    pub fn color(&self, is_group: bool) -> &'static str {
        match (self, is_group) {
            (StatusBand::NoTargetSet, false) => "#e0e0e0",
            (StatusBand::NoTargetSet, true) => "#b0b0b0",
            (StatusBand::OutOfStock, false) => "#d32f2f",
            (StatusBand::OutOfStock, true) => "#8e1f1f",
            (StatusBand::Critical, false) => "#f44336",
            (StatusBand::Critical, true) => "#aa2e25",
            (StatusBand::Low, false) => "#ff9800",
            (StatusBand::Low, true) => "#b26a00",
            (StatusBand::Adequate, false) => "#ffeb3b",
            (StatusBand::Adequate, true) => "#b2a429",
            (StatusBand::Optimal, false) => "#4caf50",
            (StatusBand::Optimal, true) => "#357a38",
            (StatusBand::Overstocked, false) => "#2196f3",
            (StatusBand::Overstocked, true) => "#1769aa",
        }
    }
}
