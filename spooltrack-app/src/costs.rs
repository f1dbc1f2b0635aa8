//! Print job cost calculation
//!
//! Material cost prorates each spool's purchase price by the grams consumed;
//! electricity cost multiplies printer power draw by duration and the
//! configured tariff. Missing prices and unknown power draw contribute zero
//! rather than failing the whole calculation.

use sqlx::{Pool, Sqlite};
use spooltrack_common::db::settings::get_electricity_rate;
use spooltrack_common::{Error, Result};

use crate::db::{filaments, print_jobs, printers};

/// Material consumed from one spool during a job
#[derive(Debug, Clone, Copy)]
pub struct MaterialUsage {
    /// Purchase price of the spool, if known
    pub price: Option<f64>,
    /// Total spool weight in grams
    pub spool_weight: f64,
    /// Grams consumed by the job
    pub grams_used: f64,
}

/// Cost breakdown for one print job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobCost {
    pub material_cost: f64,
    pub electricity_cost: f64,
    pub total_cost: f64,
}

/// Compute the cost of a job from its raw inputs.
///
/// `rate` is the electricity tariff per kWh, `power_kw` the printer's power
/// draw. Negative mass, duration, or rate is a validation error; a cost is
/// never clamped into range.
pub fn compute_job_cost(
    filaments_used: &[MaterialUsage],
    power_kw: Option<f64>,
    duration_h: f64,
    rate: f64,
) -> Result<JobCost> {
    if duration_h < 0.0 {
        return Err(Error::Validation(format!(
            "Duration must be non-negative, got {}",
            duration_h
        )));
    }
    if rate < 0.0 {
        return Err(Error::Validation(format!(
            "Electricity rate must be non-negative, got {}",
            rate
        )));
    }

    let mut material_cost = 0.0;
    for usage in filaments_used {
        if usage.grams_used < 0.0 {
            return Err(Error::Validation(format!(
                "Filament mass must be non-negative, got {}",
                usage.grams_used
            )));
        }
        if let Some(price) = usage.price {
            if usage.spool_weight > 0.0 {
                material_cost += price / usage.spool_weight * usage.grams_used;
            }
        }
    }

    let electricity_cost = power_kw.unwrap_or(0.0) * duration_h * rate;

    Ok(JobCost {
        material_cost,
        electricity_cost,
        total_cost: material_cost + electricity_cost,
    })
}

/// Compute the cost of a stored job.
///
/// Resolves the job, its filaments and printer, and the persisted
/// electricity rate. `rate_override` takes precedence over the stored
/// setting without modifying it.
pub async fn job_cost(
    db: &Pool<Sqlite>,
    job_id: &str,
    rate_override: Option<f64>,
) -> Result<JobCost> {
    let job = print_jobs::get_print_job(db, job_id).await?;
    let printer = printers::get_printer(db, &job.printer_id).await?;

    let mut usages = Vec::new();
    for (filament_id, grams_used) in job.filament_usages() {
        let filament = filaments::get_filament(db, &filament_id).await?;
        usages.push(MaterialUsage {
            price: filament.price,
            spool_weight: filament.spool_weight,
            grams_used,
        });
    }

    let rate = match rate_override {
        Some(rate) => rate,
        None => get_electricity_rate(db).await?,
    };

    compute_job_cost(&usages, printer.power_consumption, job.duration, rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reference_job() {
        // 20-per-spool, 1 kg spool, 250 g used; 0.2 kW for 2 h at 0.15/kWh
        let cost = compute_job_cost(
            &[MaterialUsage {
                price: Some(20.0),
                spool_weight: 1000.0,
                grams_used: 250.0,
            }],
            Some(0.2),
            2.0,
            0.15,
        )
        .unwrap();
        assert!(close(cost.material_cost, 5.0));
        assert!(close(cost.electricity_cost, 0.06));
        assert!(close(cost.total_cost, 5.06));
    }

    #[test]
    fn unknown_price_and_power_cost_zero() {
        let cost = compute_job_cost(
            &[MaterialUsage {
                price: None,
                spool_weight: 1000.0,
                grams_used: 500.0,
            }],
            None,
            4.0,
            0.15,
        )
        .unwrap();
        assert_eq!(cost.material_cost, 0.0);
        assert_eq!(cost.electricity_cost, 0.0);
        assert_eq!(cost.total_cost, 0.0);
    }

    #[test]
    fn multicolor_job_sums_material_over_slots() {
        let cost = compute_job_cost(
            &[
                MaterialUsage {
                    price: Some(20.0),
                    spool_weight: 1000.0,
                    grams_used: 100.0,
                },
                MaterialUsage {
                    price: Some(30.0),
                    spool_weight: 1000.0,
                    grams_used: 50.0,
                },
            ],
            None,
            1.0,
            0.15,
        )
        .unwrap();
        assert!(close(cost.material_cost, 3.5));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let usage = MaterialUsage {
            price: Some(20.0),
            spool_weight: 1000.0,
            grams_used: 100.0,
        };
        assert!(compute_job_cost(&[usage], None, -1.0, 0.15).is_err());
        assert!(compute_job_cost(&[usage], None, 1.0, -0.15).is_err());
        let negative_mass = MaterialUsage {
            grams_used: -5.0,
            ..usage
        };
        assert!(compute_job_cost(&[negative_mass], None, 1.0, 0.15).is_err());
    }
}
