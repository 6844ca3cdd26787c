//! Scheduling domain models.
//!
//! Core data types for plant scheduling: the working calendar, orders
//! and their priority tiers, routing templates, finite-capacity
//! resources, the tooling inventory, changeover matrices, and the run
//! output.

mod calendar;
mod order;
mod resource;
mod routing;
mod schedule;
mod tool;
mod transition;

pub use calendar::{ClockWindow, WorkCalendar};
pub use order::{HotList, Order, PriorityTier};
pub use resource::{Booking, Resource, ResourcePool};
pub use routing::{
    DurationLookup, JoinLeg, OperationDuration, OperationSpec, RoutingSet, RoutingStep,
    RoutingTemplate,
};
pub use schedule::{
    DeliveryStatus, ExcludedOrder, ResourceUtilization, RunResult, ScheduledOperation,
    ScheduledOrder,
};
pub use tool::{ToolGrant, ToolInstance, ToolInventory, ToolShortage, ToolState};
pub use transition::{TransitionMatrix, TransitionSet};
