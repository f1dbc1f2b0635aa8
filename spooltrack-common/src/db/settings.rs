//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! All settings are global (single-user desktop application).

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Get the global electricity rate (cost per kWh)
pub async fn get_electricity_rate(db: &Pool<Sqlite>) -> Result<f64> {
    match get_setting::<f64>(db, "electricity_cost_per_kwh").await? {
        Some(rate) if rate >= 0.0 => Ok(rate),
        Some(_) | None => {
            // Default rate is 0.15 per kWh
            set_electricity_rate(db, 0.15).await?;
            Ok(0.15)
        }
    }
}

/// Set the global electricity rate (cost per kWh)
pub async fn set_electricity_rate(db: &Pool<Sqlite>, rate: f64) -> Result<()> {
    if rate < 0.0 {
        return Err(Error::Validation(format!(
            "Electricity rate must be non-negative, got {}",
            rate
        )));
    }
    set_setting(db, "electricity_cost_per_kwh", rate).await
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}
