//! Run output model.
//!
//! A run produces one [`ScheduledOrder`] per input order, in the exact
//! sequence the scheduler processed them, plus the booked-up resource
//! pool. Orders that could not be expanded are excluded with a reason;
//! orders that hit a tool shortage stay in the sequence, marked
//! unschedulable.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::models::{PriorityTier, ResourcePool, ToolShortage, WorkCalendar};

/// Delivery grade of a scheduled order against its committed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Completes with more than the at-risk band to spare.
    OnTime,
    /// Completes before the committed date, but inside the at-risk band.
    AtRisk,
    /// Completes after the committed date.
    Late,
    /// No committed date to grade against.
    NoDue,
    /// Not placed, nothing to grade.
    Unscheduled,
}

impl DeliveryStatus {
    /// Grades a completion against a committed date. `band_minutes` is
    /// the margin under which an on-time finish still counts as at risk.
    pub fn grade(
        completion: NaiveDateTime,
        due: Option<NaiveDateTime>,
        band_minutes: i64,
    ) -> Self {
        match due {
            None => DeliveryStatus::NoDue,
            Some(due) if completion > due => DeliveryStatus::Late,
            Some(due) if (due - completion).num_minutes() <= band_minutes => DeliveryStatus::AtRisk,
            Some(_) => DeliveryStatus::OnTime,
        }
    }
}

/// One placed routing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOperation {
    /// Operation name.
    pub operation: String,
    /// Resource the operation runs on.
    pub resource: String,
    /// Concurrent partner operation, if this step is a pair.
    pub partner_operation: Option<String>,
    /// Resource the partner leg runs on.
    pub partner_resource: Option<String>,
    /// Tool instance mounted for this step, if any.
    pub tool: Option<String>,
    /// Step start (inclusive).
    pub start: NaiveDateTime,
    /// Step end (exclusive).
    pub end: NaiveDateTime,
    /// Setup minutes included at the front, changeover included.
    pub setup_minutes: i64,
}

impl ScheduledOperation {
    /// Elapsed wall-clock minutes, calendar gaps included.
    pub fn elapsed_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// One order's outcome in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    /// Order identifier.
    pub order_id: String,
    /// Item variant.
    pub variant: String,
    /// Tier the order was sequenced under, promotions applied.
    pub tier: PriorityTier,
    /// Whether the order was on the run's hot list.
    pub hot: bool,
    /// Order creation timestamp.
    pub created_at: NaiveDateTime,
    /// Committed date the order was graded against, overrides applied.
    pub due: Option<NaiveDateTime>,
    /// Piece count.
    pub quantity: u32,
    /// Consumable tag.
    pub consumable: Option<String>,
    /// Tool instance granted to the order, if any.
    pub tool: Option<String>,
    /// Placed steps, in routing sequence.
    pub operations: Vec<ScheduledOperation>,
    /// Completion instant; `None` when unschedulable.
    pub completion: Option<NaiveDateTime>,
    /// Minutes from creation to completion.
    pub turnaround_minutes: Option<i64>,
    /// Delivery grade.
    pub status: DeliveryStatus,
    /// Whether the order could not be placed in this run.
    pub unschedulable: bool,
    /// Tool shortage that blocked the order, if any.
    pub shortage: Option<ToolShortage>,
}

impl ScheduledOrder {
    /// Start of the order's first step.
    pub fn first_start(&self) -> Option<NaiveDateTime> {
        self.operations.iter().map(|op| op.start).min()
    }

    /// Whether the order was placed.
    pub fn is_scheduled(&self) -> bool {
        !self.unschedulable && self.completion.is_some()
    }
}

/// An order dropped from the run with a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedOrder {
    /// Order identifier.
    pub order_id: String,
    /// Item variant.
    pub variant: String,
    /// Why the order could not be expanded.
    pub reason: OrderError,
}

/// Per-resource load figures over the run horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    /// Resource name.
    pub resource: String,
    /// Resource class.
    pub class: String,
    /// Distinct orders that booked the resource.
    pub orders_processed: usize,
    /// Booked minutes, capacity slots summed.
    pub booked_minutes: i64,
    /// Working minutes in the horizon times capacity.
    pub available_minutes: i64,
    /// Available minus booked, floored at zero.
    pub idle_minutes: i64,
    /// Booked share of available time.
    pub utilization: f64,
}

/// Complete output of one scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Instant the run scheduled from.
    pub run_start: NaiveDateTime,
    /// Orders in the sequence the scheduler processed them.
    pub orders: Vec<ScheduledOrder>,
    /// Orders dropped before placement.
    pub excluded: Vec<ExcludedOrder>,
    /// Whether the run stopped early on its compute deadline.
    pub truncated: bool,
    /// Resource pool with every booking of this run.
    pub resources: ResourcePool,
}

impl RunResult {
    /// Latest completion across scheduled orders.
    pub fn makespan(&self) -> Option<NaiveDateTime> {
        self.orders.iter().filter_map(|o| o.completion).max()
    }

    /// Run horizon: run start through the latest completion.
    pub fn horizon(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.makespan().map(|end| (self.run_start, end))
    }

    /// Outcome for one order.
    pub fn order(&self, order_id: &str) -> Option<&ScheduledOrder> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    /// Tool shortages hit during the run.
    pub fn shortages(&self) -> Vec<&ToolShortage> {
        self.orders.iter().filter_map(|o| o.shortage.as_ref()).collect()
    }

    /// Number of placed orders.
    pub fn scheduled_count(&self) -> usize {
        self.orders.iter().filter(|o| o.is_scheduled()).count()
    }

    /// Number of orders left unschedulable.
    pub fn unschedulable_count(&self) -> usize {
        self.orders.iter().filter(|o| o.unschedulable).count()
    }

    /// Per-resource load over the booked span (first booked start through
    /// last booked end), in pool order. Available time is the calendar's
    /// working minutes in that span times resource capacity.
    pub fn utilization(&self, calendar: &WorkCalendar) -> Vec<ResourceUtilization> {
        let bookings = || {
            self.resources
                .resources()
                .iter()
                .flat_map(|r| r.bookings().iter())
        };
        let (from, to) = match (
            bookings().map(|b| b.start).min(),
            bookings().map(|b| b.end).max(),
        ) {
            (Some(from), Some(to)) => (from, to),
            _ => (self.run_start, self.run_start),
        };
        self.resources
            .resources()
            .iter()
            .map(|r| {
                let booked = r.booked_minutes_in(from, to);
                let available =
                    calendar.working_minutes_between(from, to) * i64::from(r.capacity);
                let mut order_ids: Vec<&str> =
                    r.bookings().iter().map(|b| b.order_id.as_str()).collect();
                order_ids.sort_unstable();
                order_ids.dedup();
                ResourceUtilization {
                    resource: r.name.clone(),
                    class: r.class.clone(),
                    orders_processed: order_ids.len(),
                    booked_minutes: booked,
                    available_minutes: available,
                    idle_minutes: (available - booked).max(0),
                    utilization: if available > 0 {
                        booked as f64 / available as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect()
    }
}
