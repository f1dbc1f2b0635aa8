//! Per-triple ideal inventory targets
//!
//! One target quantity per normalized (type, color, brand) triple, used
//! while the triple is not covered by a link group. Rows survive group
//! membership; the reconciler relies on that to restore targets after
//! structural changes.

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::{FilamentKey, IdealInventory};
use spooltrack_common::{Error, Result};

/// Get the target quantity for a triple, if one is set
pub async fn get_ideal(db: &Pool<Sqlite>, key: &FilamentKey) -> Result<Option<f64>> {
    let value: Option<f64> = sqlx::query_scalar(
        "SELECT ideal_quantity FROM filament_ideal_inventory WHERE type = ? AND color = ? AND brand = ?",
    )
    .bind(&key.filament_type)
    .bind(&key.color)
    .bind(&key.brand)
    .fetch_optional(db)
    .await?;
    Ok(value)
}

/// Set (upsert) the target quantity for a triple
pub async fn set_ideal(db: &Pool<Sqlite>, key: &FilamentKey, quantity: f64) -> Result<()> {
    if quantity < 0.0 {
        return Err(Error::Validation(format!(
            "Ideal quantity must be non-negative, got {}",
            quantity
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO filament_ideal_inventory (type, color, brand, ideal_quantity)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(type, color, brand) DO UPDATE SET
            ideal_quantity = excluded.ideal_quantity,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&key.filament_type)
    .bind(&key.color)
    .bind(&key.brand)
    .bind(quantity)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove the target for a triple
pub async fn clear_ideal(db: &Pool<Sqlite>, key: &FilamentKey) -> Result<()> {
    sqlx::query(
        "DELETE FROM filament_ideal_inventory WHERE type = ? AND color = ? AND brand = ?",
    )
    .bind(&key.filament_type)
    .bind(&key.color)
    .bind(&key.brand)
    .execute(db)
    .await?;
    Ok(())
}

/// All persisted per-triple targets
pub async fn all_ideals(db: &Pool<Sqlite>) -> Result<Vec<IdealInventory>> {
    Ok(sqlx::query_as::<_, IdealInventory>(
        "SELECT * FROM filament_ideal_inventory ORDER BY type, color, brand",
    )
    .fetch_all(db)
    .await?)
}
