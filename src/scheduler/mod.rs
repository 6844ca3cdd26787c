//! The scheduling run and its evaluation.
//!
//! Provides the greedy priority-tier scheduler, run quality metrics,
//! and parallel what-if scenario runs.
//!
//! # Algorithm
//!
//! [`RunContext::run`] uses a greedy, tier-driven, first-fit-over-time
//! heuristic: orders are sequenced by priority tier with FIFO tiebreaks
//! and hot-list promotions, then placed one at a time on the earliest
//! fitting resource slots. It is not optimal, but it is fast,
//! deterministic, and explainable placement by placement.
//!
//! # KPI
//!
//! `RunKpi` computes standard scheduling metrics: makespan, tardiness,
//! on-time rate, turnaround, and utilization.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Baker & Trietsch (2019), "Principles of Sequencing and Scheduling"

mod kpi;
mod run;
mod scenario;

pub use kpi::RunKpi;
pub use run::{RunContext, SchedulerConfig};
pub use scenario::{run_many, run_pair, run_with_impact};
