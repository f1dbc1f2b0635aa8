//! Filament inventory queries

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::{Filament, FilamentKey};
use spooltrack_common::{Error, Result};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Fields for a new filament spool
#[derive(Debug, Clone)]
pub struct NewFilament {
    pub filament_type: String,
    pub color: String,
    pub brand: String,
    /// Total spool weight in grams
    pub spool_weight: f64,
    /// Grams remaining; defaults to the full spool weight
    pub quantity_remaining: Option<f64>,
    /// Price per spool
    pub price: Option<f64>,
}

/// Inventory for one (type, color, brand) triple across all its spools
#[derive(Debug, Clone)]
pub struct TripleInventory {
    pub key: FilamentKey,
    /// Display label preserving the first-seen casing
    pub label: String,
    pub quantity_remaining: f64,
    pub total_quantity: f64,
    pub percentage_remaining: f64,
    pub avg_price: Option<f64>,
    pub spool_count: usize,
    pub filament_ids: Vec<String>,
}

/// Add a new filament spool to the inventory
pub async fn add_filament(db: &Pool<Sqlite>, new: NewFilament) -> Result<String> {
    if new.filament_type.trim().is_empty()
        || new.color.trim().is_empty()
        || new.brand.trim().is_empty()
    {
        return Err(Error::Validation(
            "Filament type, color and brand are required".to_string(),
        ));
    }
    if new.spool_weight <= 0.0 {
        return Err(Error::Validation(format!(
            "Spool weight must be positive, got {}",
            new.spool_weight
        )));
    }
    let quantity = new.quantity_remaining.unwrap_or(new.spool_weight);
    if quantity < 0.0 {
        return Err(Error::Validation(format!(
            "Quantity remaining must be non-negative, got {}",
            quantity
        )));
    }
    if let Some(price) = new.price {
        if price < 0.0 {
            return Err(Error::Validation(format!(
                "Price must be non-negative, got {}",
                price
            )));
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO filaments (id, type, color, brand, quantity_remaining,
                               spool_weight, price, purchase_date, last_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.filament_type.trim())
    .bind(new.color.trim())
    .bind(new.brand.trim())
    .bind(quantity)
    .bind(new.spool_weight)
    .bind(new.price)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(id)
}

/// Get all filaments
pub async fn get_filaments(db: &Pool<Sqlite>) -> Result<Vec<Filament>> {
    let filaments = sqlx::query_as::<_, Filament>(
        "SELECT * FROM filaments ORDER BY type, color, brand",
    )
    .fetch_all(db)
    .await?;
    Ok(filaments)
}

/// Get a filament by id
pub async fn get_filament(db: &Pool<Sqlite>, id: &str) -> Result<Filament> {
    sqlx::query_as::<_, Filament>("SELECT * FROM filaments WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No filament found with ID {}", id)))
}

/// Update the remaining quantity of a filament
pub async fn update_filament_quantity(db: &Pool<Sqlite>, id: &str, new_quantity: f64) -> Result<()> {
    if new_quantity < 0.0 {
        return Err(Error::Validation(format!(
            "Quantity remaining must be non-negative, got {}",
            new_quantity
        )));
    }

    let filament = get_filament(db, id).await?;
    if new_quantity > filament.spool_weight {
        // Expected invariant, not enforced at write time; surfaces later as a
        // calculation error in the status view.
        warn!(
            "Filament {}: quantity_remaining {} exceeds spool_weight {}",
            id, new_quantity, filament.spool_weight
        );
    }

    sqlx::query("UPDATE filaments SET quantity_remaining = ?, last_updated = ? WHERE id = ?")
        .bind(new_quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;

    Ok(())
}

/// Delete a filament from the inventory
///
/// Blocked while any print job references the spool in any filament slot;
/// the store is left unchanged in that case.
pub async fn delete_filament(db: &Pool<Sqlite>, id: &str) -> Result<()> {
    // Existence check first so a miss reports NotFound, not a silent no-op
    get_filament(db, id).await?;

    let mut tx = db.begin().await?;

    let references: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM print_jobs
        WHERE filament_id = ?1 OR filament_id_2 = ?1
           OR filament_id_3 = ?1 OR filament_id_4 = ?1
        "#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if references > 0 {
        return Err(Error::ReferentialIntegrity(format!(
            "Cannot delete filament {}: referenced by {} print job(s)",
            id, references
        )));
    }

    sqlx::query("DELETE FROM filaments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Distinct filament types in the inventory
pub async fn filament_types(db: &Pool<Sqlite>) -> Result<Vec<String>> {
    Ok(
        sqlx::query_scalar("SELECT DISTINCT type FROM filaments ORDER BY type")
            .fetch_all(db)
            .await?,
    )
}

/// Distinct filament colors in the inventory
pub async fn filament_colors(db: &Pool<Sqlite>) -> Result<Vec<String>> {
    Ok(
        sqlx::query_scalar("SELECT DISTINCT color FROM filaments ORDER BY color")
            .fetch_all(db)
            .await?,
    )
}

/// Distinct filament brands in the inventory
pub async fn filament_brands(db: &Pool<Sqlite>) -> Result<Vec<String>> {
    Ok(
        sqlx::query_scalar("SELECT DISTINCT brand FROM filaments ORDER BY brand")
            .fetch_all(db)
            .await?,
    )
}

/// Inventory aggregated by normalized (type, color, brand) triple
pub async fn aggregated_inventory(db: &Pool<Sqlite>) -> Result<Vec<TripleInventory>> {
    let filaments = get_filaments(db).await?;

    struct Acc {
        row: TripleInventory,
        price_sum: f64,
        price_count: usize,
    }

    let mut by_key: HashMap<FilamentKey, Acc> = HashMap::new();
    for filament in filaments {
        let key = filament.key();
        let acc = by_key.entry(key.clone()).or_insert_with(|| Acc {
            row: TripleInventory {
                key,
                label: filament.label(),
                quantity_remaining: 0.0,
                total_quantity: 0.0,
                percentage_remaining: 0.0,
                avg_price: None,
                spool_count: 0,
                filament_ids: Vec::new(),
            },
            price_sum: 0.0,
            price_count: 0,
        });
        acc.row.quantity_remaining += filament.quantity_remaining;
        acc.row.total_quantity += filament.spool_weight;
        acc.row.spool_count += 1;
        acc.row.filament_ids.push(filament.id.clone());
        if let Some(price) = filament.price {
            acc.price_sum += price;
            acc.price_count += 1;
        }
    }

    let mut rows: Vec<TripleInventory> = by_key
        .into_values()
        .map(|acc| {
            let mut row = acc.row;
            if acc.price_count > 0 {
                row.avg_price = Some(acc.price_sum / acc.price_count as f64);
            }
            if row.total_quantity > 0.0 {
                row.percentage_remaining = row.quantity_remaining / row.total_quantity * 100.0;
            }
            row
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(rows)
}
