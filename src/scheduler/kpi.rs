//! Run quality metrics (KPIs).
//!
//! Standard order-scheduling performance indicators computed from one
//! completed run.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Run start through the latest completion |
//! | Total tardiness | Sum of max(0, completion - committed date) |
//! | Maximum tardiness | Largest single overrun |
//! | On-time rate | Fraction of due-dated orders not finishing late |
//! | Avg turnaround | Mean minutes from order creation to completion |
//! | Avg utilization | Mean booked share of working time |
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems",
//! Ch. 1.2: Performance Measures

use std::collections::HashMap;

use crate::models::{RunResult, WorkCalendar};

/// Performance indicators of one run.
///
/// All durations are in minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunKpi {
    /// Elapsed minutes from run start to the latest completion.
    pub makespan_minutes: i64,
    /// Sum of overruns past committed dates.
    pub total_tardiness_minutes: i64,
    /// Largest single overrun.
    pub max_tardiness_minutes: i64,
    /// Fraction of due-dated placed orders finishing by their committed
    /// date. 1.0 when no placed order carries one.
    pub on_time_rate: f64,
    /// Mean minutes from order creation to completion.
    pub avg_turnaround_minutes: f64,
    /// Mean booked share of working time across resources.
    pub avg_utilization: f64,
    /// Booked share of working time per resource.
    pub utilization_by_resource: HashMap<String, f64>,
    /// Orders placed.
    pub scheduled_count: usize,
    /// Orders left unschedulable.
    pub unschedulable_count: usize,
    /// Orders excluded before placement.
    pub excluded_count: usize,
}

impl RunKpi {
    /// Computes KPIs from a run result. The calendar supplies working
    /// minutes for the utilization figures.
    pub fn calculate(result: &RunResult, calendar: &WorkCalendar) -> Self {
        let makespan_minutes = result
            .makespan()
            .map(|end| (end - result.run_start).num_minutes())
            .unwrap_or(0);

        let mut total_tardiness: i64 = 0;
        let mut max_tardiness: i64 = 0;
        let mut on_time: usize = 0;
        let mut due_dated: usize = 0;
        let mut placed: usize = 0;
        let mut turnaround_sum: f64 = 0.0;

        for order in &result.orders {
            let Some(completion) = order.completion else {
                continue;
            };
            placed += 1;
            if let Some(minutes) = order.turnaround_minutes {
                turnaround_sum += minutes as f64;
            }
            let Some(due) = order.due else {
                continue;
            };
            due_dated += 1;
            if completion > due {
                let tardiness = (completion - due).num_minutes();
                total_tardiness += tardiness;
                max_tardiness = max_tardiness.max(tardiness);
            } else {
                on_time += 1;
            }
        }

        let report = result.utilization(calendar);
        let utilization_by_resource: HashMap<String, f64> = report
            .iter()
            .map(|r| (r.resource.clone(), r.utilization))
            .collect();
        let avg_utilization = if report.is_empty() {
            0.0
        } else {
            report.iter().map(|r| r.utilization).sum::<f64>() / report.len() as f64
        };

        let on_time_rate = if due_dated == 0 {
            1.0
        } else {
            on_time as f64 / due_dated as f64
        };
        let avg_turnaround_minutes = if placed == 0 {
            0.0
        } else {
            turnaround_sum / placed as f64
        };

        Self {
            makespan_minutes,
            total_tardiness_minutes: total_tardiness,
            max_tardiness_minutes: max_tardiness,
            on_time_rate,
            avg_turnaround_minutes,
            avg_utilization,
            utilization_by_resource,
            scheduled_count: result.scheduled_count(),
            unschedulable_count: result.unschedulable_count(),
            excluded_count: result.excluded.len(),
        }
    }

    /// Whether the run meets the given quality thresholds.
    pub fn meets(&self, max_tardiness_minutes: i64, min_on_time_rate: f64) -> bool {
        self.max_tardiness_minutes <= max_tardiness_minutes && self.on_time_rate >= min_on_time_rate
    }
}
