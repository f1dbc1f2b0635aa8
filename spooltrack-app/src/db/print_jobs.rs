//! Print job queries
//!
//! Creating a job decrements the referenced filament quantities and adds the
//! job duration to every component of the printer; deleting a job reverses
//! both. Each operation is a single transaction.

use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::collections::HashMap;
use spooltrack_common::db::models::{Filament, PrintJob};
use spooltrack_common::{Error, Result};
use uuid::Uuid;

use crate::db::components;

/// One filament slot of a new job
#[derive(Debug, Clone)]
pub struct FilamentUsage {
    pub filament_id: String,
    pub grams: f64,
}

/// Fields for a new print job
#[derive(Debug, Clone)]
pub struct NewPrintJob {
    pub project_name: String,
    pub filament_id: String,
    pub printer_id: String,
    /// Grams of primary filament used
    pub filament_used: f64,
    /// Duration in hours
    pub duration: f64,
    pub notes: Option<String>,
    /// Up to three secondary filaments for multicolor prints
    pub secondary: Vec<FilamentUsage>,
}

/// Print job list filter; all fields optional and combined with AND
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Substring match on project name
    pub project_name: Option<String>,
    pub printer_id: Option<String>,
    pub filament_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Add a new print job
pub async fn add_print_job(db: &Pool<Sqlite>, new: NewPrintJob) -> Result<String> {
    if new.project_name.trim().is_empty() {
        return Err(Error::Validation("Project name is required".to_string()));
    }
    if new.filament_used < 0.0 {
        return Err(Error::Validation(format!(
            "Filament used must be non-negative, got {}",
            new.filament_used
        )));
    }
    if new.duration < 0.0 {
        return Err(Error::Validation(format!(
            "Duration must be non-negative, got {}",
            new.duration
        )));
    }
    if new.secondary.len() > 3 {
        return Err(Error::Validation(format!(
            "At most 3 secondary filaments are supported, got {}",
            new.secondary.len()
        )));
    }
    for usage in &new.secondary {
        if usage.grams < 0.0 {
            return Err(Error::Validation(format!(
                "Filament used must be non-negative, got {}",
                usage.grams
            )));
        }
    }

    let mut tx = db.begin().await?;

    // Printer must exist
    let printer_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM printers WHERE id = ?)")
            .bind(&new.printer_id)
            .fetch_one(&mut *tx)
            .await?;
    if !printer_exists {
        return Err(Error::NotFound(format!(
            "No printer found with ID {}",
            new.printer_id
        )));
    }

    // Every referenced filament must exist and have enough material left.
    // A spool may appear in more than one slot, so availability is checked
    // against the summed demand per filament, not per slot.
    let mut usages = vec![(new.filament_id.clone(), new.filament_used)];
    for usage in &new.secondary {
        usages.push((usage.filament_id.clone(), usage.grams));
    }
    let mut demand: HashMap<&str, f64> = HashMap::new();
    for (filament_id, grams) in &usages {
        *demand.entry(filament_id.as_str()).or_insert(0.0) += grams;
    }
    for (filament_id, grams) in &demand {
        let filament =
            sqlx::query_as::<_, Filament>("SELECT * FROM filaments WHERE id = ?")
                .bind(filament_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    Error::NotFound(format!("No filament found with ID {}", filament_id))
                })?;
        if filament.quantity_remaining < *grams {
            return Err(Error::Validation(format!(
                "Not enough filament available for {}. Only {}g remaining.",
                filament.label(),
                filament.quantity_remaining
            )));
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let slot = |n: usize| -> (Option<&str>, Option<f64>) {
        match new.secondary.get(n) {
            Some(usage) => (Some(usage.filament_id.as_str()), Some(usage.grams)),
            None => (None, None),
        }
    };
    let (id_2, used_2) = slot(0);
    let (id_3, used_3) = slot(1);
    let (id_4, used_4) = slot(2);

    sqlx::query(
        r#"
        INSERT INTO print_jobs
            (id, date, project_name, filament_id, printer_id, filament_used, duration, notes,
             filament_id_2, filament_used_2, filament_id_3, filament_used_3,
             filament_id_4, filament_used_4)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(now)
    .bind(new.project_name.trim())
    .bind(&new.filament_id)
    .bind(&new.printer_id)
    .bind(new.filament_used)
    .bind(new.duration)
    .bind(&new.notes)
    .bind(id_2)
    .bind(used_2)
    .bind(id_3)
    .bind(used_3)
    .bind(id_4)
    .bind(used_4)
    .execute(&mut *tx)
    .await?;

    // Decrement each referenced spool
    for (filament_id, grams) in &usages {
        sqlx::query(
            "UPDATE filaments SET quantity_remaining = quantity_remaining - ?, last_updated = ? WHERE id = ?",
        )
        .bind(grams)
        .bind(now)
        .bind(filament_id)
        .execute(&mut *tx)
        .await?;
    }

    // Accumulate wear on the printer's components
    components::bump_usage_for_printer(&mut *tx, &new.printer_id, new.duration).await?;

    tx.commit().await?;
    Ok(id)
}

/// Get print jobs matching the filter, newest first
pub async fn get_print_jobs(db: &Pool<Sqlite>, filter: &JobFilter) -> Result<Vec<PrintJob>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM print_jobs WHERE 1 = 1");

    if let Some(project) = &filter.project_name {
        qb.push(" AND project_name LIKE ");
        qb.push_bind(format!("%{}%", project));
    }
    if let Some(printer_id) = &filter.printer_id {
        qb.push(" AND printer_id = ");
        qb.push_bind(printer_id);
    }
    if let Some(filament_id) = &filter.filament_id {
        qb.push(" AND (filament_id = ");
        qb.push_bind(filament_id);
        qb.push(" OR filament_id_2 = ");
        qb.push_bind(filament_id);
        qb.push(" OR filament_id_3 = ");
        qb.push_bind(filament_id);
        qb.push(" OR filament_id_4 = ");
        qb.push_bind(filament_id);
        qb.push(")");
    }
    if let Some(from) = &filter.from {
        qb.push(" AND date >= ");
        qb.push_bind(from);
    }
    if let Some(to) = &filter.to {
        qb.push(" AND date <= ");
        qb.push_bind(to);
    }
    qb.push(" ORDER BY date DESC");

    let jobs = qb.build_query_as::<PrintJob>().fetch_all(db).await?;
    Ok(jobs)
}

/// Get a print job by id
pub async fn get_print_job(db: &Pool<Sqlite>, id: &str) -> Result<PrintJob> {
    sqlx::query_as::<_, PrintJob>("SELECT * FROM print_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No print job found with ID {}", id)))
}

/// Delete a print job, restoring filament quantities and component hours
pub async fn delete_print_job(db: &Pool<Sqlite>, id: &str) -> Result<()> {
    let job = get_print_job(db, id).await?;

    let mut tx = db.begin().await?;
    let now = Utc::now();

    for (filament_id, grams) in job.filament_usages() {
        sqlx::query(
            "UPDATE filaments SET quantity_remaining = quantity_remaining + ?, last_updated = ? WHERE id = ?",
        )
        .bind(grams)
        .bind(now)
        .bind(&filament_id)
        .execute(&mut *tx)
        .await?;
    }

    components::unwind_usage_for_printer(&mut *tx, &job.printer_id, job.duration).await?;

    sqlx::query("DELETE FROM print_jobs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::components::{add_component, get_component};
    use crate::db::filaments::{add_filament, delete_filament, get_filament, NewFilament};
    use crate::db::printers::{add_printer, NewPrinter};
    use spooltrack_common::db::init::init_memory_database;

    async fn fixture(db: &Pool<Sqlite>) -> (String, String, String) {
        let filament_id = add_filament(
            db,
            NewFilament {
                filament_type: "PLA".to_string(),
                color: "Red".to_string(),
                brand: "Prusament".to_string(),
                spool_weight: 1000.0,
                quantity_remaining: None,
                price: Some(25.99),
            },
        )
        .await
        .unwrap();
        let printer_id = add_printer(
            db,
            NewPrinter {
                name: "MK3S".to_string(),
                power_consumption: Some(0.12),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let component_id = add_component(db, &printer_id, "Nozzle", Some(200.0), None)
            .await
            .unwrap();
        (filament_id, printer_id, component_id)
    }

    fn job(filament_id: &str, printer_id: &str) -> NewPrintJob {
        NewPrintJob {
            project_name: "Benchy".to_string(),
            filament_id: filament_id.to_string(),
            printer_id: printer_id.to_string(),
            filament_used: 100.0,
            duration: 2.5,
            notes: None,
            secondary: Vec::new(),
        }
    }

    #[tokio::test]
    async fn job_creation_applies_side_effects() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, component_id) = fixture(&db).await;

        add_print_job(&db, job(&filament_id, &printer_id)).await.unwrap();

        let filament = get_filament(&db, &filament_id).await.unwrap();
        assert_eq!(filament.quantity_remaining, 900.0);

        let component = get_component(&db, &component_id).await.unwrap();
        assert_eq!(component.usage_hours, 2.5);
    }

    #[tokio::test]
    async fn job_deletion_reverses_side_effects() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, component_id) = fixture(&db).await;

        let job_id = add_print_job(&db, job(&filament_id, &printer_id)).await.unwrap();
        delete_print_job(&db, &job_id).await.unwrap();

        let filament = get_filament(&db, &filament_id).await.unwrap();
        assert_eq!(filament.quantity_remaining, 1000.0);

        let component = get_component(&db, &component_id).await.unwrap();
        assert_eq!(component.usage_hours, 0.0);
    }

    #[tokio::test]
    async fn insufficient_filament_rejected() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, _) = fixture(&db).await;

        let mut new = job(&filament_id, &printer_id);
        new.filament_used = 1500.0;
        let result = add_print_job(&db, new).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // Nothing was decremented
        let filament = get_filament(&db, &filament_id).await.unwrap();
        assert_eq!(filament.quantity_remaining, 1000.0);
    }

    #[tokio::test]
    async fn negative_inputs_rejected() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, _) = fixture(&db).await;

        let mut new = job(&filament_id, &printer_id);
        new.duration = -1.0;
        assert!(matches!(
            add_print_job(&db, new).await,
            Err(Error::Validation(_))
        ));

        let mut new = job(&filament_id, &printer_id);
        new.filament_used = -10.0;
        assert!(matches!(
            add_print_job(&db, new).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn multicolor_job_decrements_all_slots() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, _) = fixture(&db).await;
        let second = add_filament(
            &db,
            NewFilament {
                filament_type: "PETG".to_string(),
                color: "Black".to_string(),
                brand: "Overture".to_string(),
                spool_weight: 1000.0,
                quantity_remaining: None,
                price: Some(29.99),
            },
        )
        .await
        .unwrap();

        let mut new = job(&filament_id, &printer_id);
        new.filament_used = 80.0;
        new.secondary = vec![FilamentUsage {
            filament_id: second.clone(),
            grams: 20.0,
        }];
        add_print_job(&db, new).await.unwrap();

        assert_eq!(
            get_filament(&db, &filament_id).await.unwrap().quantity_remaining,
            920.0
        );
        assert_eq!(
            get_filament(&db, &second).await.unwrap().quantity_remaining,
            980.0
        );
    }

    #[tokio::test]
    async fn same_spool_in_two_slots_checked_against_summed_demand() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, _) = fixture(&db).await;

        // 600 + 600 from one 1000 g spool: each slot fits alone, the sum
        // does not
        let mut new = job(&filament_id, &printer_id);
        new.filament_used = 600.0;
        new.secondary = vec![FilamentUsage {
            filament_id: filament_id.clone(),
            grams: 600.0,
        }];
        let result = add_print_job(&db, new).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        // Nothing was decremented
        assert_eq!(
            get_filament(&db, &filament_id).await.unwrap().quantity_remaining,
            1000.0
        );

        // The same pair within the available quantity is fine
        let mut new = job(&filament_id, &printer_id);
        new.filament_used = 600.0;
        new.secondary = vec![FilamentUsage {
            filament_id: filament_id.clone(),
            grams: 400.0,
        }];
        add_print_job(&db, new).await.unwrap();
        assert_eq!(
            get_filament(&db, &filament_id).await.unwrap().quantity_remaining,
            0.0
        );
    }

    #[tokio::test]
    async fn referenced_filament_cannot_be_deleted() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, _) = fixture(&db).await;
        add_print_job(&db, job(&filament_id, &printer_id)).await.unwrap();

        let result = delete_filament(&db, &filament_id).await;
        assert!(matches!(result, Err(Error::ReferentialIntegrity(_))));

        // Record store unchanged
        assert!(get_filament(&db, &filament_id).await.is_ok());
    }

    #[tokio::test]
    async fn filter_by_project_and_printer() {
        let db = init_memory_database().await.unwrap();
        let (filament_id, printer_id, _) = fixture(&db).await;

        add_print_job(&db, job(&filament_id, &printer_id)).await.unwrap();
        let mut other = job(&filament_id, &printer_id);
        other.project_name = "Calibration cube".to_string();
        other.filament_used = 10.0;
        add_print_job(&db, other).await.unwrap();

        let jobs = get_print_jobs(
            &db,
            &JobFilter {
                project_name: Some("Benchy".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].project_name, "Benchy");

        let jobs = get_print_jobs(
            &db,
            &JobFilter {
                printer_id: Some(printer_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(jobs.len(), 2);
    }
}
