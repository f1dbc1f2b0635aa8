//! Database initialization
//!
//! Creates the inventory schema on first run and seeds default settings.
//! All statements are idempotent, so initialization is safe to repeat on
//! every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode keeps readers responsive while a backup snapshot runs
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_all_tables(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// In-memory database with full schema, for tests
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    create_all_tables(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_filaments_table(pool).await?;
    create_printers_table(pool).await?;
    create_printer_components_table(pool).await?;
    create_print_jobs_table(pool).await?;
    create_filament_link_groups_table(pool).await?;
    create_filament_links_table(pool).await?;
    create_filament_ideal_inventory_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_filaments_table(pool: &SqlitePool) -> Result<()> {
    // quantity_remaining <= spool_weight is expected but deliberately not a
    // CHECK constraint; violations are reported by the cost/status views.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS filaments (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            color TEXT NOT NULL,
            brand TEXT NOT NULL,
            quantity_remaining REAL NOT NULL DEFAULT 0,
            spool_weight REAL NOT NULL,
            price REAL,
            purchase_date TIMESTAMP,
            last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (quantity_remaining >= 0),
            CHECK (spool_weight > 0),
            CHECK (price IS NULL OR price >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_filaments_triple ON filaments(type, color, brand)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_printers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS printers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            model TEXT,
            power_consumption REAL,
            purchase_date TIMESTAMP,
            notes TEXT,
            CHECK (power_consumption IS NULL OR power_consumption >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_printer_components_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS printer_components (
            id TEXT PRIMARY KEY,
            printer_id TEXT NOT NULL REFERENCES printers(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            installation_date TIMESTAMP NOT NULL,
            replacement_interval REAL,
            usage_hours REAL NOT NULL DEFAULT 0,
            notes TEXT,
            CHECK (usage_hours >= 0),
            CHECK (replacement_interval IS NULL OR replacement_interval > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_components_printer ON printer_components(printer_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_print_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS print_jobs (
            id TEXT PRIMARY KEY,
            date TIMESTAMP NOT NULL,
            project_name TEXT NOT NULL,
            filament_id TEXT NOT NULL REFERENCES filaments(id),
            printer_id TEXT NOT NULL REFERENCES printers(id),
            filament_used REAL NOT NULL,
            duration REAL NOT NULL,
            notes TEXT,
            filament_id_2 TEXT REFERENCES filaments(id),
            filament_used_2 REAL,
            filament_id_3 TEXT REFERENCES filaments(id),
            filament_used_3 REAL,
            filament_id_4 TEXT REFERENCES filaments(id),
            filament_used_4 REAL,
            CHECK (filament_used >= 0),
            CHECK (duration >= 0),
            CHECK (filament_used_2 IS NULL OR filament_used_2 >= 0),
            CHECK (filament_used_3 IS NULL OR filament_used_3 >= 0),
            CHECK (filament_used_4 IS NULL OR filament_used_4 >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_print_jobs_date ON print_jobs(date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_print_jobs_printer ON print_jobs(printer_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_print_jobs_filament ON print_jobs(filament_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_filament_link_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS filament_link_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            ideal_quantity REAL NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (ideal_quantity >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_filament_links_table(pool: &SqlitePool) -> Result<()> {
    // Triples are stored normalized (uppercase); membership matches any
    // filament whose uppercased triple is equal.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS filament_links (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL REFERENCES filament_link_groups(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            color TEXT NOT NULL,
            brand TEXT NOT NULL,
            UNIQUE (group_id, type, color, brand)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_filament_links_group ON filament_links(group_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_filament_ideal_inventory_table(pool: &SqlitePool) -> Result<()> {
    // Triples are stored normalized (uppercase), one target per triple.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS filament_ideal_inventory (
            type TEXT NOT NULL,
            color TEXT NOT NULL,
            brand TEXT NOT NULL,
            ideal_quantity REAL NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (type, color, brand),
            CHECK (ideal_quantity >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values, and resets any
/// NULL values back to their defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Cost settings
    ensure_setting(pool, "electricity_cost_per_kwh", "0.15").await?;

    // Cloud sync settings
    ensure_setting(pool, "sync_enabled", "false").await?;
    ensure_setting(pool, "sync_frequency", "on_close").await?;
    ensure_setting(pool, "max_backups_to_keep", "5").await?;
    ensure_setting(pool, "last_sync_timestamp_ms", "0").await?;
    ensure_setting(pool, "sync_check_interval_secs", "60").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
