//! Usage reports over the job history
//!
//! Consumption reports walk every filament slot of every job, so multicolor
//! prints attribute grams to each category they actually used.

use std::collections::HashMap;

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::{Filament, PrinterComponent};
use spooltrack_common::Result;

use crate::db::print_jobs::JobFilter;
use crate::db::{components, filaments, print_jobs, printers};

/// Grams consumed per printer, with job and hour totals
#[derive(Debug, Clone)]
pub struct PrinterUsage {
    pub printer_id: String,
    pub printer_name: String,
    pub total_jobs: usize,
    pub total_hours: f64,
    pub total_filament_used: f64,
}

/// Grams consumed per filament type across all recorded jobs
pub async fn filament_usage_by_type(db: &Pool<Sqlite>) -> Result<Vec<(String, f64)>> {
    usage_by(db, |f| f.filament_type.trim().to_uppercase()).await
}

/// Grams consumed per filament color across all recorded jobs
pub async fn filament_usage_by_color(db: &Pool<Sqlite>) -> Result<Vec<(String, f64)>> {
    usage_by(db, |f| f.color.trim().to_uppercase()).await
}

async fn usage_by(
    db: &Pool<Sqlite>,
    category: impl Fn(&Filament) -> String,
) -> Result<Vec<(String, f64)>> {
    let jobs = print_jobs::get_print_jobs(db, &JobFilter::default()).await?;
    let filament_by_id: HashMap<String, Filament> = filaments::get_filaments(db)
        .await?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    let mut totals: HashMap<String, f64> = HashMap::new();
    for job in &jobs {
        for (filament_id, grams) in job.filament_usages() {
            if let Some(filament) = filament_by_id.get(&filament_id) {
                *totals.entry(category(filament)).or_insert(0.0) += grams;
            }
        }
    }

    let mut rows: Vec<(String, f64)> = totals.into_iter().collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(rows)
}

/// Per-printer job counts, hours, and grams consumed
pub async fn printer_usage_stats(db: &Pool<Sqlite>) -> Result<Vec<PrinterUsage>> {
    let jobs = print_jobs::get_print_jobs(db, &JobFilter::default()).await?;
    let all_printers = printers::get_printers(db).await?;

    let mut stats: Vec<PrinterUsage> = all_printers
        .into_iter()
        .map(|p| PrinterUsage {
            printer_id: p.id,
            printer_name: p.name,
            total_jobs: 0,
            total_hours: 0.0,
            total_filament_used: 0.0,
        })
        .collect();
    let index: HashMap<String, usize> = stats
        .iter()
        .enumerate()
        .map(|(i, s)| (s.printer_id.clone(), i))
        .collect();

    for job in &jobs {
        if let Some(&i) = index.get(&job.printer_id) {
            stats[i].total_jobs += 1;
            stats[i].total_hours += job.duration;
            stats[i].total_filament_used += job.total_filament_used();
        }
    }

    Ok(stats)
}

/// Components whose accumulated usage has reached the replacement interval
pub async fn components_due_for_replacement(db: &Pool<Sqlite>) -> Result<Vec<PrinterComponent>> {
    let all = components::get_components(db, None).await?;
    Ok(all
        .into_iter()
        .filter(|c| c.is_due_for_replacement())
        .collect())
}
