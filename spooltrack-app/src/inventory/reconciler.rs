//! Ideal-quantity reconciliation around group structure changes
//!
//! Group operations move triples between "group target" and "per-triple
//! target" scope. Changing structure alone would silently zero targets, so
//! every structural operation runs as a capture → mutate → restore → repair
//! sequence: targets for the affected triples are read before the change,
//! re-applied after it, and any record found zeroed despite a captured value
//! is corrected.
//!
//! Restore and repair failures never roll the structural change back. They
//! are logged and returned as [`IntegrityWarning`]s; the caller decides how
//! to surface them.

use std::collections::HashMap;

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::FilamentKey;
use spooltrack_common::Result;
use tracing::warn;

use crate::db::{ideal, link_groups};

/// A target that could not be restored or verified after a structural change
#[derive(Debug, Clone)]
pub struct IntegrityWarning {
    pub key: FilamentKey,
    pub message: String,
}

/// Result of a reconciled group operation
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Id of the created group, for `create_group` only
    pub group_id: Option<String>,
    /// Targets the restore/repair phases could not guarantee
    pub warnings: Vec<IntegrityWarning>,
}

/// Create a link group, preserving members' per-triple targets.
///
/// The per-triple records are kept so that removing a member later, or
/// deleting the group, finds the original targets intact.
pub async fn create_group(
    db: &Pool<Sqlite>,
    name: &str,
    description: Option<&str>,
    ideal_quantity: f64,
    members: &[FilamentKey],
) -> Result<ReconcileOutcome> {
    let captured = capture_targets(db, members).await?;
    let group_id = link_groups::create_group_raw(db, name, description, ideal_quantity, members)
        .await?;
    let mut warnings = restore_targets(db, &captured).await;
    warnings.extend(repair_targets(db, &captured).await);
    Ok(ReconcileOutcome {
        group_id: Some(group_id),
        warnings,
    })
}

/// Delete a link group, distributing its target back to the members.
///
/// Members that had their own non-zero per-triple target get it back.
/// Members without one receive an equal share of the group's target, so a
/// 500 g group over two fresh triples leaves each at 250 g rather than zero.
pub async fn delete_group(db: &Pool<Sqlite>, group_id: &str) -> Result<ReconcileOutcome> {
    let group = link_groups::get_group(db, group_id).await?;
    let members: Vec<FilamentKey> = link_groups::get_links(db, group_id)
        .await?
        .iter()
        .map(|link| link.key())
        .collect();

    let mut captured = capture_targets(db, &members).await?;

    // Fill uncaptured members with an equal split of the group target
    if !members.is_empty() && group.ideal_quantity > 0.0 {
        let share = group.ideal_quantity / members.len() as f64;
        for key in &members {
            captured.entry(key.clone()).or_insert(share);
        }
    }

    link_groups::delete_group_raw(db, group_id).await?;

    let mut warnings = restore_targets(db, &captured).await;
    warnings.extend(repair_targets(db, &captured).await);
    Ok(ReconcileOutcome {
        group_id: None,
        warnings,
    })
}

/// Add a triple to an existing group, keeping its per-triple target on file
pub async fn add_member_to_group(
    db: &Pool<Sqlite>,
    group_id: &str,
    key: &FilamentKey,
) -> Result<ReconcileOutcome> {
    let captured = capture_targets(db, std::slice::from_ref(key)).await?;
    link_groups::add_member_raw(db, group_id, key).await?;
    let mut warnings = restore_targets(db, &captured).await;
    warnings.extend(repair_targets(db, &captured).await);
    Ok(ReconcileOutcome {
        group_id: None,
        warnings,
    })
}

/// Remove a triple from a group, restoring its own target
pub async fn remove_member_from_group(
    db: &Pool<Sqlite>,
    group_id: &str,
    key: &FilamentKey,
) -> Result<ReconcileOutcome> {
    let captured = capture_targets(db, std::slice::from_ref(key)).await?;
    link_groups::remove_member_raw(db, group_id, key).await?;
    let mut warnings = restore_targets(db, &captured).await;
    warnings.extend(repair_targets(db, &captured).await);
    Ok(ReconcileOutcome {
        group_id: None,
        warnings,
    })
}

/// Capture phase: read the current target for each affected triple.
///
/// Targets are read from both the persisted per-triple records and the live
/// group memberships. The persisted value wins unless it is exactly zero,
/// in which case a non-zero group-derived value is taken instead. Triples
/// with no non-zero target anywhere are left out of the map.
async fn capture_targets(
    db: &Pool<Sqlite>,
    keys: &[FilamentKey],
) -> Result<HashMap<FilamentKey, f64>> {
    let mut captured = HashMap::new();
    if keys.is_empty() {
        return Ok(captured);
    }

    // Group-derived targets: each member's share of its group's ideal
    let groups = link_groups::get_groups(db).await?;
    let links = link_groups::get_all_links(db).await?;
    let mut member_count: HashMap<String, usize> = HashMap::new();
    for link in &links {
        *member_count.entry(link.group_id.clone()).or_insert(0) += 1;
    }
    let mut group_share: HashMap<FilamentKey, f64> = HashMap::new();
    for group in &groups {
        let count = member_count.get(&group.id).copied().unwrap_or(0);
        if count == 0 || group.ideal_quantity <= 0.0 {
            continue;
        }
        let share = group.ideal_quantity / count as f64;
        for link in links.iter().filter(|l| l.group_id == group.id) {
            group_share.insert(link.key(), share);
        }
    }

    for key in keys {
        let persisted = ideal::get_ideal(db, key).await?;
        let derived = group_share.get(key).copied();
        let target = match (persisted, derived) {
            (Some(p), _) if p > 0.0 => Some(p),
            (_, Some(d)) if d > 0.0 => Some(d),
            _ => None,
        };
        if let Some(target) = target {
            captured.insert(key.clone(), target);
        }
    }
    Ok(captured)
}

/// Restore phase: re-apply every captured target to its triple
async fn restore_targets(
    db: &Pool<Sqlite>,
    captured: &HashMap<FilamentKey, f64>,
) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();
    for (key, target) in captured {
        if let Err(e) = ideal::set_ideal(db, key, *target).await {
            warn!("failed to restore ideal quantity for {}: {}", key, e);
            warnings.push(IntegrityWarning {
                key: key.clone(),
                message: format!("could not restore target of {} g: {}", target, e),
            });
        }
    }
    warnings
}

/// Repair phase: fix records that ended up zero despite a captured value
async fn repair_targets(
    db: &Pool<Sqlite>,
    captured: &HashMap<FilamentKey, f64>,
) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();
    for (key, target) in captured {
        let current = match ideal::get_ideal(db, key).await {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to verify ideal quantity for {}: {}", key, e);
                warnings.push(IntegrityWarning {
                    key: key.clone(),
                    message: format!("could not verify restored target: {}", e),
                });
                continue;
            }
        };
        if current.unwrap_or(0.0) == 0.0 {
            warn!(
                "ideal quantity for {} was zeroed during a group change, repairing to {}",
                key, target
            );
            if let Err(e) = ideal::set_ideal(db, key, *target).await {
                warnings.push(IntegrityWarning {
                    key: key.clone(),
                    message: format!("could not repair target of {} g: {}", target, e),
                });
            }
        }
    }
    warnings
}
