//! Filament link group queries (raw structural operations)
//!
//! These functions change group structure only. Callers that need
//! ideal-quantity preservation go through `inventory::reconciler`, which
//! wraps each of these with its capture/restore/repair sequence.

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::{FilamentKey, FilamentLink, FilamentLinkGroup};
use spooltrack_common::{Error, Result};
use uuid::Uuid;

/// Create a group with an initial member set. Returns the group id.
pub async fn create_group_raw(
    db: &Pool<Sqlite>,
    name: &str,
    description: Option<&str>,
    ideal_quantity: f64,
    members: &[FilamentKey],
) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::Validation("Group name is required".to_string()));
    }
    if ideal_quantity < 0.0 {
        return Err(Error::Validation(format!(
            "Ideal quantity must be non-negative, got {}",
            ideal_quantity
        )));
    }

    let mut tx = db.begin().await?;
    let group_id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO filament_link_groups (id, name, description, ideal_quantity) VALUES (?, ?, ?, ?)",
    )
    .bind(&group_id)
    .bind(name.trim())
    .bind(description)
    .bind(ideal_quantity)
    .execute(&mut *tx)
    .await?;

    for key in members {
        sqlx::query(
            "INSERT INTO filament_links (id, group_id, type, color, brand) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&group_id)
        .bind(&key.filament_type)
        .bind(&key.color)
        .bind(&key.brand)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(group_id)
}

/// Delete a group, returning the member keys it had.
///
/// Member filaments and their per-triple ideal records are untouched; links
/// are removed by cascade.
pub async fn delete_group_raw(db: &Pool<Sqlite>, group_id: &str) -> Result<Vec<FilamentKey>> {
    get_group(db, group_id).await?;
    let members: Vec<FilamentKey> = get_links(db, group_id)
        .await?
        .iter()
        .map(|link| link.key())
        .collect();

    sqlx::query("DELETE FROM filament_link_groups WHERE id = ?")
        .bind(group_id)
        .execute(db)
        .await?;

    Ok(members)
}

/// Add a member triple to a group
pub async fn add_member_raw(db: &Pool<Sqlite>, group_id: &str, key: &FilamentKey) -> Result<()> {
    get_group(db, group_id).await?;

    sqlx::query(
        r#"
        INSERT INTO filament_links (id, group_id, type, color, brand)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(group_id, type, color, brand) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(group_id)
    .bind(&key.filament_type)
    .bind(&key.color)
    .bind(&key.brand)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a member triple from a group
pub async fn remove_member_raw(db: &Pool<Sqlite>, group_id: &str, key: &FilamentKey) -> Result<()> {
    get_group(db, group_id).await?;

    sqlx::query(
        "DELETE FROM filament_links WHERE group_id = ? AND type = ? AND color = ? AND brand = ?",
    )
    .bind(group_id)
    .bind(&key.filament_type)
    .bind(&key.color)
    .bind(&key.brand)
    .execute(db)
    .await?;

    Ok(())
}

/// Get all groups
pub async fn get_groups(db: &Pool<Sqlite>) -> Result<Vec<FilamentLinkGroup>> {
    Ok(sqlx::query_as::<_, FilamentLinkGroup>(
        "SELECT id, name, description, ideal_quantity FROM filament_link_groups ORDER BY name",
    )
    .fetch_all(db)
    .await?)
}

/// Get a group by id
pub async fn get_group(db: &Pool<Sqlite>, group_id: &str) -> Result<FilamentLinkGroup> {
    sqlx::query_as::<_, FilamentLinkGroup>(
        "SELECT id, name, description, ideal_quantity FROM filament_link_groups WHERE id = ?",
    )
    .bind(group_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::NotFound(format!("No link group found with ID {}", group_id)))
}

/// Get the membership links of one group
pub async fn get_links(db: &Pool<Sqlite>, group_id: &str) -> Result<Vec<FilamentLink>> {
    Ok(sqlx::query_as::<_, FilamentLink>(
        "SELECT * FROM filament_links WHERE group_id = ? ORDER BY type, color, brand",
    )
    .bind(group_id)
    .fetch_all(db)
    .await?)
}

/// Get all membership links across groups
pub async fn get_all_links(db: &Pool<Sqlite>) -> Result<Vec<FilamentLink>> {
    Ok(sqlx::query_as::<_, FilamentLink>(
        "SELECT * FROM filament_links ORDER BY group_id, type, color, brand",
    )
    .fetch_all(db)
    .await?)
}

/// Set the target quantity of a group
pub async fn set_group_ideal(db: &Pool<Sqlite>, group_id: &str, quantity: f64) -> Result<()> {
    if quantity < 0.0 {
        return Err(Error::Validation(format!(
            "Ideal quantity must be non-negative, got {}",
            quantity
        )));
    }
    get_group(db, group_id).await?;

    sqlx::query("UPDATE filament_link_groups SET ideal_quantity = ? WHERE id = ?")
        .bind(quantity)
        .bind(group_id)
        .execute(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spooltrack_common::db::init::init_memory_database;

    #[tokio::test]
    async fn create_and_list_members() {
        let db = init_memory_database().await.unwrap();
        let members = vec![
            FilamentKey::new("PLA", "Red", "Prusament"),
            FilamentKey::new("PLA", "Dark Red", "Prusament"),
        ];
        let group_id = create_group_raw(&db, "Reds", Some("all red PLA"), 500.0, &members)
            .await
            .unwrap();

        let group = get_group(&db, &group_id).await.unwrap();
        assert_eq!(group.name, "Reds");
        assert_eq!(group.ideal_quantity, 500.0);

        let links = get_links(&db, &group_id).await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.key().filament_type == "PLA"));
    }

    #[tokio::test]
    async fn delete_returns_former_members_and_cascades_links() {
        let db = init_memory_database().await.unwrap();
        let members = vec![FilamentKey::new("PETG", "Black", "Overture")];
        let group_id = create_group_raw(&db, "Blacks", None, 250.0, &members)
            .await
            .unwrap();

        let former = delete_group_raw(&db, &group_id).await.unwrap();
        assert_eq!(former, members);
        assert!(get_all_links(&db).await.unwrap().is_empty());
        assert!(matches!(
            get_group(&db, &group_id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_member_is_a_no_op() {
        let db = init_memory_database().await.unwrap();
        let key = FilamentKey::new("PLA", "Red", "Prusament");
        let group_id = create_group_raw(&db, "Reds", None, 100.0, &[key.clone()])
            .await
            .unwrap();

        add_member_raw(&db, &group_id, &key).await.unwrap();
        assert_eq!(get_links(&db, &group_id).await.unwrap().len(), 1);
    }
}
