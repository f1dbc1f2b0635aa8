//! Inventory status aggregation
//!
//! Builds the rows of the inventory status view: one row per link group
//! followed by one row per remaining (type, color, brand) triple. A triple
//! that belongs to a group is counted inside the group row only.

use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::models::FilamentKey;
use spooltrack_common::Result;

use crate::db::{filaments, ideal, link_groups};
use crate::inventory::classifier::StatusBand;

/// One row of the inventory status view
#[derive(Debug, Clone)]
pub struct StatusRow {
    /// Group name, or the triple's display label
    pub label: String,
    pub is_group: bool,
    /// Grams currently in stock across all matching spools
    pub current_quantity: f64,
    /// Target stock level in grams; `None` when no target is configured
    pub ideal_quantity: Option<f64>,
    /// Percentage of target; `None` when no target is configured
    pub percentage: Option<f64>,
    pub band: StatusBand,
}

/// Compute the full inventory status view.
///
/// Group rows come first, ordered by group name, then ungrouped triples
/// ordered by label. An ideal quantity of exactly zero means no target is
/// set, so no percentage is reported and the row classifies as
/// [`StatusBand::NoTargetSet`].
pub async fn compute_inventory_status(db: &Pool<Sqlite>) -> Result<Vec<StatusRow>> {
    let groups = link_groups::get_groups(db).await?;
    let links = link_groups::get_all_links(db).await?;
    let spools = filaments::get_filaments(db).await?;
    let ideals = ideal::all_ideals(db).await?;

    // Stock per triple, plus the first-seen display casing for the label
    let mut quantity_by_key: HashMap<FilamentKey, f64> = HashMap::new();
    let mut label_by_key: HashMap<FilamentKey, String> = HashMap::new();
    for spool in &spools {
        let key = spool.key();
        *quantity_by_key.entry(key.clone()).or_insert(0.0) += spool.quantity_remaining;
        label_by_key.entry(key).or_insert_with(|| spool.label());
    }

    let mut ideal_by_key: HashMap<FilamentKey, f64> = HashMap::new();
    for record in &ideals {
        ideal_by_key.insert(record.key(), record.ideal_quantity);
    }

    let mut members_by_group: HashMap<String, Vec<FilamentKey>> = HashMap::new();
    for link in &links {
        members_by_group
            .entry(link.group_id.clone())
            .or_default()
            .push(link.key());
    }

    let mut rows = Vec::new();
    let mut consumed: HashSet<FilamentKey> = HashSet::new();

    let mut sorted_groups = groups;
    sorted_groups.sort_by(|a, b| a.name.cmp(&b.name));

    for group in &sorted_groups {
        let members = members_by_group.get(&group.id).cloned().unwrap_or_default();
        let mut current = 0.0;
        for key in &members {
            current += quantity_by_key.get(key).copied().unwrap_or(0.0);
            consumed.insert(key.clone());
        }
        let (ideal_quantity, percentage) = if group.ideal_quantity > 0.0 {
            (
                Some(group.ideal_quantity),
                Some(current / group.ideal_quantity * 100.0),
            )
        } else {
            (None, None)
        };
        rows.push(StatusRow {
            label: group.name.clone(),
            is_group: true,
            current_quantity: current,
            ideal_quantity,
            percentage,
            band: StatusBand::classify(percentage),
        });
    }

    let mut loose: Vec<FilamentKey> = quantity_by_key
        .keys()
        .filter(|key| !consumed.contains(key))
        .cloned()
        .collect();
    loose.sort_by(|a, b| {
        (&a.filament_type, &a.color, &a.brand).cmp(&(&b.filament_type, &b.color, &b.brand))
    });

    for key in loose {
        let label = label_by_key[&key].clone();
        let current = quantity_by_key[&key];
        let target = ideal_by_key.get(&key).copied().filter(|q| *q > 0.0);
        let percentage = target.map(|q| current / q * 100.0);
        rows.push(StatusRow {
            label,
            is_group: false,
            current_quantity: current,
            ideal_quantity: target,
            percentage,
            band: StatusBand::classify(percentage),
        });
    }

    Ok(rows)
}
