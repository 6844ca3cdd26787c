//! Schedule comparison and impact analysis.
//!
//! A scheduling run is deterministic, so the effect of a change (a new
//! hot-list entry, a blocked machine, a calendar edit) is measured by
//! running the alternative and comparing the outputs order by order.
//! Delay figures cover orders that complete in both runs; membership
//! and schedulability changes are reported separately.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{DeliveryStatus, RunResult};

/// Options for a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    /// Leave hot orders out of the delay figures. The promoted orders
    /// are the cause of the shift being measured, not part of it; they
    /// are listed under [`ImpactReport::excluded_as_cause`] instead.
    pub exclude_hot: bool,
}

/// One order's shift between two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    /// Order identifier.
    pub order_id: String,
    /// Completion in the baseline run.
    pub baseline_completion: NaiveDateTime,
    /// Completion in the candidate run.
    pub candidate_completion: NaiveDateTime,
    /// Positive when the candidate finishes later.
    pub delay_minutes: i64,
    /// Delivery grade in the baseline run.
    pub baseline_status: DeliveryStatus,
    /// Delivery grade in the candidate run.
    pub candidate_status: DeliveryStatus,
    /// Late in the candidate but not in the baseline.
    pub newly_late: bool,
}

/// Order-by-order comparison of two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Orders completing in both runs, worst delay first.
    pub entries: Vec<ImpactEntry>,
    /// Orders present only in the candidate run.
    pub added: Vec<String>,
    /// Orders present only in the baseline run.
    pub removed: Vec<String>,
    /// Orders placed in the baseline but unschedulable in the candidate.
    pub became_unschedulable: Vec<String>,
    /// Orders unschedulable in the baseline but placed in the candidate.
    pub became_schedulable: Vec<String>,
    /// Hot orders left out of the delay figures as the cause under
    /// measurement. Empty unless [`CompareOptions::exclude_hot`] is set.
    pub excluded_as_cause: Vec<String>,
    /// Entries with a positive delay.
    pub orders_delayed: usize,
    /// Entries with a negative delay.
    pub orders_improved: usize,
    /// Entries late in the candidate only.
    pub orders_newly_late: usize,
}

impl ImpactReport {
    /// Entry for one order, if it completed in both runs.
    pub fn entry(&self, order_id: &str) -> Option<&ImpactEntry> {
        self.entries.iter().find(|e| e.order_id == order_id)
    }

    /// Worst delay across entries, zero when nothing shifted later.
    pub fn max_delay_minutes(&self) -> i64 {
        self.entries
            .iter()
            .map(|e| e.delay_minutes)
            .max()
            .unwrap_or(0)
            .max(0)
    }
}

/// Compares two runs with default options: every order counts,
/// hot ones included.
pub fn compare(baseline: &RunResult, candidate: &RunResult) -> ImpactReport {
    compare_with(baseline, candidate, CompareOptions::default())
}

/// Compares two runs of the same order book.
pub fn compare_with(
    baseline: &RunResult,
    candidate: &RunResult,
    options: CompareOptions,
) -> ImpactReport {
    let mut entries = Vec::new();
    let mut excluded_as_cause = Vec::new();

    for b in &baseline.orders {
        let Some(c) = candidate.order(&b.order_id) else {
            continue;
        };
        if options.exclude_hot && (b.hot || c.hot) {
            excluded_as_cause.push(b.order_id.clone());
            continue;
        }
        let (Some(baseline_completion), Some(candidate_completion)) = (b.completion, c.completion)
        else {
            continue;
        };
        entries.push(ImpactEntry {
            order_id: b.order_id.clone(),
            baseline_completion,
            candidate_completion,
            delay_minutes: (candidate_completion - baseline_completion).num_minutes(),
            baseline_status: b.status,
            candidate_status: c.status,
            newly_late: c.status == DeliveryStatus::Late && b.status != DeliveryStatus::Late,
        });
    }
    entries.sort_by(|a, b| {
        b.delay_minutes
            .cmp(&a.delay_minutes)
            .then_with(|| a.order_id.cmp(&b.order_id))
    });

    let mut added: Vec<String> = candidate
        .orders
        .iter()
        .filter(|c| baseline.order(&c.order_id).is_none())
        .map(|c| c.order_id.clone())
        .collect();
    added.sort_unstable();

    let mut removed: Vec<String> = baseline
        .orders
        .iter()
        .filter(|b| candidate.order(&b.order_id).is_none())
        .map(|b| b.order_id.clone())
        .collect();
    removed.sort_unstable();

    let mut became_unschedulable: Vec<String> = baseline
        .orders
        .iter()
        .filter(|b| {
            b.is_scheduled()
                && candidate
                    .order(&b.order_id)
                    .is_some_and(|c| c.unschedulable)
        })
        .map(|b| b.order_id.clone())
        .collect();
    became_unschedulable.sort_unstable();

    let mut became_schedulable: Vec<String> = baseline
        .orders
        .iter()
        .filter(|b| {
            b.unschedulable
                && candidate
                    .order(&b.order_id)
                    .is_some_and(|c| c.is_scheduled())
        })
        .map(|b| b.order_id.clone())
        .collect();
    became_schedulable.sort_unstable();
    excluded_as_cause.sort_unstable();

    let orders_delayed = entries.iter().filter(|e| e.delay_minutes > 0).count();
    let orders_improved = entries.iter().filter(|e| e.delay_minutes < 0).count();
    let orders_newly_late = entries.iter().filter(|e| e.newly_late).count();

    ImpactReport {
        entries,
        added,
        removed,
        became_unschedulable,
        became_schedulable,
        excluded_as_cause,
        orders_delayed,
        orders_improved,
        orders_newly_late,
    }
}
