//! Printer queries

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::Printer;
use spooltrack_common::{Error, Result};
use uuid::Uuid;

/// Fields for a new printer
#[derive(Debug, Clone, Default)]
pub struct NewPrinter {
    pub name: String,
    pub model: Option<String>,
    /// Power draw in kW
    pub power_consumption: Option<f64>,
    pub notes: Option<String>,
}

/// Partial update; only provided fields are changed
#[derive(Debug, Clone, Default)]
pub struct PrinterUpdate {
    pub name: Option<String>,
    pub model: Option<String>,
    pub power_consumption: Option<f64>,
    pub notes: Option<String>,
}

/// Add a new printer
pub async fn add_printer(db: &Pool<Sqlite>, new: NewPrinter) -> Result<String> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("Printer name is required".to_string()));
    }
    if let Some(power) = new.power_consumption {
        if power < 0.0 {
            return Err(Error::Validation(format!(
                "Power consumption must be non-negative, got {}",
                power
            )));
        }
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO printers (id, name, model, power_consumption, purchase_date, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.name.trim())
    .bind(new.model)
    .bind(new.power_consumption)
    .bind(Utc::now())
    .bind(new.notes)
    .execute(db)
    .await?;

    Ok(id)
}

/// Get all printers
pub async fn get_printers(db: &Pool<Sqlite>) -> Result<Vec<Printer>> {
    Ok(
        sqlx::query_as::<_, Printer>("SELECT * FROM printers ORDER BY name")
            .fetch_all(db)
            .await?,
    )
}

/// Get a printer by id
pub async fn get_printer(db: &Pool<Sqlite>, id: &str) -> Result<Printer> {
    sqlx::query_as::<_, Printer>("SELECT * FROM printers WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No printer found with ID {}", id)))
}

/// Update printer information (only provided fields change)
pub async fn update_printer(db: &Pool<Sqlite>, id: &str, update: PrinterUpdate) -> Result<()> {
    let current = get_printer(db, id).await?;

    if let Some(power) = update.power_consumption {
        if power < 0.0 {
            return Err(Error::Validation(format!(
                "Power consumption must be non-negative, got {}",
                power
            )));
        }
    }
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(Error::Validation("Printer name is required".to_string()));
        }
    }

    sqlx::query(
        "UPDATE printers SET name = ?, model = ?, power_consumption = ?, notes = ? WHERE id = ?",
    )
    .bind(update.name.unwrap_or(current.name))
    .bind(update.model.or(current.model))
    .bind(update.power_consumption.or(current.power_consumption))
    .bind(update.notes.or(current.notes))
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

/// Delete a printer and its components
///
/// Blocked while any print job references the printer.
pub async fn delete_printer(db: &Pool<Sqlite>, id: &str) -> Result<()> {
    get_printer(db, id).await?;

    let mut tx = db.begin().await?;

    let references: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM print_jobs WHERE printer_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if references > 0 {
        return Err(Error::ReferentialIntegrity(format!(
            "Cannot delete printer {}: referenced by {} print job(s)",
            id, references
        )));
    }

    // Components cascade via the foreign key
    sqlx::query("DELETE FROM printers WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spooltrack_common::db::init::init_memory_database;

    #[tokio::test]
    async fn add_and_update_printer() {
        let db = init_memory_database().await.unwrap();
        let id = add_printer(
            &db,
            NewPrinter {
                name: "Prusa MK3S".to_string(),
                model: Some("MK3S+".to_string()),
                power_consumption: Some(0.12),
                notes: None,
            },
        )
        .await
        .unwrap();

        update_printer(
            &db,
            &id,
            PrinterUpdate {
                power_consumption: Some(0.2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let printer = get_printer(&db, &id).await.unwrap();
        assert_eq!(printer.name, "Prusa MK3S");
        assert_eq!(printer.model.as_deref(), Some("MK3S+"));
        assert_eq!(printer.power_consumption, Some(0.2));
    }

    #[tokio::test]
    async fn add_rejects_missing_name_and_negative_power() {
        let db = init_memory_database().await.unwrap();

        let result = add_printer(&db, NewPrinter::default()).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let result = add_printer(
            &db,
            NewPrinter {
                name: "Ender 3".to_string(),
                power_consumption: Some(-0.5),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn delete_missing_printer_is_not_found() {
        let db = init_memory_database().await.unwrap();
        let result = delete_printer(&db, "no-such-id").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn referenced_printer_cannot_be_deleted() {
        use crate::db::filaments::{add_filament, NewFilament};
        use crate::db::print_jobs::{add_print_job, NewPrintJob};

        let db = init_memory_database().await.unwrap();
        let printer_id = add_printer(
            &db,
            NewPrinter {
                name: "MK3S".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let filament_id = add_filament(
            &db,
            NewFilament {
                filament_type: "PLA".to_string(),
                color: "Red".to_string(),
                brand: "Prusament".to_string(),
                spool_weight: 1000.0,
                quantity_remaining: None,
                price: None,
            },
        )
        .await
        .unwrap();
        add_print_job(
            &db,
            NewPrintJob {
                project_name: "Benchy".to_string(),
                filament_id,
                printer_id: printer_id.clone(),
                filament_used: 50.0,
                duration: 1.0,
                notes: None,
                secondary: Vec::new(),
            },
        )
        .await
        .unwrap();

        let result = delete_printer(&db, &printer_id).await;
        assert!(matches!(result, Err(Error::ReferentialIntegrity(_))));

        // Record store unchanged
        assert!(get_printer(&db, &printer_id).await.is_ok());
    }
}
