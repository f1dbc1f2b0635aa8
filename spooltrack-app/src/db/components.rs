//! Printer component queries
//!
//! Components accumulate usage hours from every print job run on their
//! parent printer since installation.

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};
use spooltrack_common::db::models::PrinterComponent;
use spooltrack_common::{Error, Result};
use uuid::Uuid;

/// Add a new component to a printer
pub async fn add_component(
    db: &Pool<Sqlite>,
    printer_id: &str,
    name: &str,
    replacement_interval: Option<f64>,
    notes: Option<String>,
) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Component name is required".to_string()));
    }
    if let Some(interval) = replacement_interval {
        if interval <= 0.0 {
            return Err(Error::Validation(format!(
                "Replacement interval must be positive, got {}",
                interval
            )));
        }
    }
    crate::db::printers::get_printer(db, printer_id).await?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO printer_components
            (id, printer_id, name, installation_date, replacement_interval, usage_hours, notes)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(printer_id)
    .bind(name.trim())
    .bind(Utc::now())
    .bind(replacement_interval)
    .bind(notes)
    .execute(db)
    .await?;

    Ok(id)
}

/// Get components, optionally restricted to one printer
pub async fn get_components(
    db: &Pool<Sqlite>,
    printer_id: Option<&str>,
) -> Result<Vec<PrinterComponent>> {
    let components = match printer_id {
        Some(printer_id) => {
            sqlx::query_as::<_, PrinterComponent>(
                "SELECT * FROM printer_components WHERE printer_id = ? ORDER BY name",
            )
            .bind(printer_id)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, PrinterComponent>(
                "SELECT * FROM printer_components ORDER BY printer_id, name",
            )
            .fetch_all(db)
            .await?
        }
    };
    Ok(components)
}

/// Get a component by id
pub async fn get_component(db: &Pool<Sqlite>, id: &str) -> Result<PrinterComponent> {
    sqlx::query_as::<_, PrinterComponent>("SELECT * FROM printer_components WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No component found with ID {}", id)))
}

/// Manually add usage hours to a component; returns the new total
pub async fn add_component_usage(db: &Pool<Sqlite>, id: &str, hours: f64) -> Result<f64> {
    if hours < 0.0 {
        return Err(Error::Validation(format!(
            "Usage hours must be non-negative, got {}",
            hours
        )));
    }
    get_component(db, id).await?;

    sqlx::query("UPDATE printer_components SET usage_hours = usage_hours + ? WHERE id = ?")
        .bind(hours)
        .bind(id)
        .execute(db)
        .await?;

    let total: f64 = sqlx::query_scalar("SELECT usage_hours FROM printer_components WHERE id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(total)
}

/// Replace a component: reset usage hours and installation date
pub async fn replace_component(db: &Pool<Sqlite>, id: &str) -> Result<()> {
    get_component(db, id).await?;

    sqlx::query(
        "UPDATE printer_components SET usage_hours = 0, installation_date = ? WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

/// Add job duration to every component of a printer (within a transaction)
pub(crate) async fn bump_usage_for_printer(
    conn: &mut SqliteConnection,
    printer_id: &str,
    hours: f64,
) -> Result<()> {
    sqlx::query("UPDATE printer_components SET usage_hours = usage_hours + ? WHERE printer_id = ?")
        .bind(hours)
        .bind(printer_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Reverse job duration on every component of a printer, floored at zero
pub(crate) async fn unwind_usage_for_printer(
    conn: &mut SqliteConnection,
    printer_id: &str,
    hours: f64,
) -> Result<()> {
    sqlx::query(
        "UPDATE printer_components SET usage_hours = MAX(0, usage_hours - ?) WHERE printer_id = ?",
    )
    .bind(hours)
    .bind(printer_id)
    .execute(conn)
    .await?;
    Ok(())
}
