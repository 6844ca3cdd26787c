//! Parallel what-if runs.
//!
//! One run never mutates its context, so alternative scenarios (a
//! different hot list, an edited calendar, a blocked machine) can run
//! on separate threads over the same order book and be compared with
//! [`crate::impact`] afterwards.

use std::panic;
use std::thread;

use chrono::NaiveDateTime;

use crate::error::ScheduleError;
use crate::impact::{compare, ImpactReport};
use crate::models::{HotList, Order, RunResult};
use crate::scheduler::RunContext;

/// Runs every context over the same order book, one thread per context.
/// Results come back in context order.
pub fn run_many(
    contexts: &[RunContext],
    orders: &[Order],
    hot: &HotList,
    start: NaiveDateTime,
) -> Vec<Result<RunResult, ScheduleError>> {
    thread::scope(|scope| {
        let handles: Vec<_> = contexts
            .iter()
            .map(|ctx| scope.spawn(move || ctx.run(orders, hot, start)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .collect()
    })
}

/// Runs a baseline and a candidate side by side, each under its own hot
/// list.
pub fn run_pair(
    baseline: &RunContext,
    candidate: &RunContext,
    orders: &[Order],
    baseline_hot: &HotList,
    candidate_hot: &HotList,
    start: NaiveDateTime,
) -> Result<(RunResult, RunResult), ScheduleError> {
    thread::scope(|scope| {
        let side = scope.spawn(move || baseline.run(orders, baseline_hot, start));
        let candidate = candidate.run(orders, candidate_hot, start);
        let baseline = side.join().unwrap_or_else(|e| panic::resume_unwind(e));
        Ok((baseline?, candidate?))
    })
}

/// Measures what a hot list does to a schedule: runs the context with an
/// empty hot list and with the given one, and compares the two.
///
/// Returns (baseline, candidate, report). Hot orders stay in the
/// report's delay figures; pass the results to
/// [`crate::impact::compare_with`] to fold them out instead.
pub fn run_with_impact(
    ctx: &RunContext,
    orders: &[Order],
    hot: &HotList,
    start: NaiveDateTime,
) -> Result<(RunResult, RunResult, ImpactReport), ScheduleError> {
    let (baseline, candidate) = run_pair(ctx, ctx, orders, &HotList::new(), hot, start)?;
    let report = compare(&baseline, &candidate);
    Ok((baseline, candidate, report))
}
