//! Error taxonomy for scheduling runs.
//!
//! Two severities. [`ScheduleError`] is fatal for a whole run: the run
//! never starts. [`OrderError`] is fatal for one order only: the order
//! is excluded with its reason and the rest of the batch schedules on.
//! Tool shortages are neither; they are part of the run output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationError;

/// Whole-run failure. Surfaced before any order is placed.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ScheduleError {
    /// The calendar configuration can never produce a working instant.
    #[error("calendar defines no working time")]
    NoWorkingTime,
    /// Input validation found configuration defects.
    #[error("input validation failed with {} defect(s)", errors.len())]
    Invalid {
        /// Every defect found, in input order.
        errors: Vec<ValidationError>,
    },
}

/// Single-order failure. The order is excluded, the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum OrderError {
    /// No routing template matches the order's variant.
    #[error("no routing template for variant `{0}`")]
    MissingTemplate(String),
    /// A lookup-duration operation has no table entry for the order.
    #[error("no duration entry for operation `{operation}` of variant `{variant}`")]
    MissingDuration {
        /// Variant the lookup was keyed on.
        variant: String,
        /// Operation whose duration is missing.
        operation: String,
    },
    /// A concurrent pair references an operation the template lacks.
    #[error("operation `{operation}` pairs with `{partner}`, which is not in the template")]
    MissingJoinPartner {
        /// Operation carrying the pair flag.
        operation: String,
        /// Partner name that failed to resolve.
        partner: String,
    },
    /// A routing step's class has no resource able to take a booking.
    #[error("no bookable resource in class `{0}`")]
    NoResourceInClass(String),
    /// A join pair keeps both legs in one class, which holds fewer than
    /// the two distinct stations the pair must occupy.
    #[error("join pair needs two bookable stations in class `{0}`")]
    JoinNeedsTwoStations(String),
}
