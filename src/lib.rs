//! Discrete-event production scheduling for order-driven plants.
//!
//! Builds finite-capacity schedules for production orders: each order
//! expands through its variant's routing template and is placed on the
//! plant's resources under a working-time calendar, a tooling
//! lifecycle, and sequence-dependent changeovers. Runs are
//! deterministic, so two schedules can be diffed to measure the impact
//! of a change before committing to it.
//!
//! # Modules
//!
//! - **`models`**: domain types (`Order`, `RoutingTemplate`, `Resource`,
//!   `WorkCalendar`, `ToolInventory`, `TransitionMatrix`, `RunResult`)
//! - **`scheduler`**: the priority-tier run (`RunContext`), KPIs, and
//!   parallel what-if runs
//! - **`impact`**: order-by-order comparison of two runs
//! - **`validation`**: input integrity checks (duplicate IDs, resource
//!   references, template defects)
//! - **`error`**: run-level and per-order error types
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Baker & Trietsch (2019), "Principles of Sequencing and Scheduling"

pub mod error;
pub mod impact;
pub mod models;
pub mod scheduler;
pub mod validation;
