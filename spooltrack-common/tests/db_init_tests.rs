//! Tests for database initialization and default settings seeding

use spooltrack_common::db::init::init_database;
use std::path::PathBuf;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let test_db = format!("/tmp/spooltrack-test-db-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);

    // Ensure database doesn't exist
    let _ = std::fs::remove_file(&db_path);

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());

    assert!(db_path.exists(), "Database file was not created");

    // Cleanup
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let test_db = format!("/tmp/spooltrack-test-db-existing-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);

    let _ = std::fs::remove_file(&db_path);

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Opening a second time must succeed (idempotent schema)
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    drop(pool1);
    drop(pool2);
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let test_db = format!("/tmp/spooltrack-test-db-settings-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);

    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();

    let rate: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'electricity_cost_per_kwh'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(rate.as_deref(), Some("0.15"));

    let frequency: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'sync_frequency'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(frequency.as_deref(), Some("on_close"));

    let enabled: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'sync_enabled'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(enabled.as_deref(), Some("false"));

    drop(pool);
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_inventory_tables_created() {
    let test_db = format!("/tmp/spooltrack-test-db-tables-{}.db", std::process::id());
    let db_path = PathBuf::from(&test_db);

    let _ = std::fs::remove_file(&db_path);

    let pool = init_database(&db_path).await.unwrap();

    for table in [
        "filaments",
        "printers",
        "printer_components",
        "print_jobs",
        "filament_link_groups",
        "filament_links",
        "filament_ideal_inventory",
        "settings",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }

    drop(pool);
    let _ = std::fs::remove_file(&db_path);
}
