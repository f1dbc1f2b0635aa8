//! CSV export of print job history

use std::collections::HashMap;

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::{Filament, Printer};
use spooltrack_common::db::settings::get_electricity_rate;
use spooltrack_common::Result;

use crate::costs::{compute_job_cost, MaterialUsage};
use crate::db::print_jobs::JobFilter;
use crate::db::{filaments, print_jobs, printers};

const HEADER: &str =
    "Date,Project,Printer,Filaments,Amount Used (g),Duration (h),Material Cost,Electricity Cost,Total Cost,Notes";

/// Export the jobs matching `filter` as a CSV document.
///
/// Each row carries the cost breakdown computed with the persisted
/// electricity rate, or `rate_override` when given. Deleted filaments and
/// printers render as "(deleted)" rather than failing the export.
pub async fn export_print_jobs(
    db: &Pool<Sqlite>,
    filter: &JobFilter,
    rate_override: Option<f64>,
) -> Result<String> {
    let jobs = print_jobs::get_print_jobs(db, filter).await?;
    let rate = match rate_override {
        Some(rate) => rate,
        None => get_electricity_rate(db).await?,
    };

    let printer_by_id: HashMap<String, Printer> = printers::get_printers(db)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();
    let filament_by_id: HashMap<String, Filament> = filaments::get_filaments(db)
        .await?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    let mut out = String::from(HEADER);
    out.push('\n');

    for job in &jobs {
        let printer = printer_by_id.get(&job.printer_id);
        let printer_name = printer.map(|p| p.name.as_str()).unwrap_or("(deleted)");

        let mut labels = Vec::new();
        let mut usages = Vec::new();
        for (filament_id, grams_used) in job.filament_usages() {
            match filament_by_id.get(&filament_id) {
                Some(f) => {
                    labels.push(f.label());
                    usages.push(MaterialUsage {
                        price: f.price,
                        spool_weight: f.spool_weight,
                        grams_used,
                    });
                }
                None => {
                    labels.push("(deleted)".to_string());
                    usages.push(MaterialUsage {
                        price: None,
                        spool_weight: 0.0,
                        grams_used,
                    });
                }
            }
        }

        let cost = compute_job_cost(
            &usages,
            printer.and_then(|p| p.power_consumption),
            job.duration,
            rate,
        )?;

        let fields = [
            job.date.format("%Y-%m-%d %H:%M").to_string(),
            job.project_name.clone(),
            printer_name.to_string(),
            labels.join("; "),
            format_number(job.total_filament_used()),
            format_number(job.duration),
            format!("{:.2}", cost.material_cost),
            format!("{:.2}", cost.electricity_cost),
            format!("{:.2}", cost.total_cost),
            job.notes.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|s| csv_escape(s)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    Ok(out)
}

/// Quote a field when it contains a comma, quote, or newline (RFC 4180)
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_number(value: f64) -> String {
    // Trim a trailing ".0" so whole grams/hours export as integers
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
