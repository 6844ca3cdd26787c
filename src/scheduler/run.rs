//! Priority-tier scheduling run.
//!
//! The control loop: sequence orders by tier with FIFO tiebreaks and
//! hot-list promotions applied, then place each order's routing steps
//! left to right onto the first-fitting resource slots, acquiring
//! tooling ahead of the first tool-bearing step. One run is single
//! threaded and deterministic: identical inputs give identical output,
//! which downstream schedule comparison relies on.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 14
//! (dispatching rules)

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{OrderError, ScheduleError};
use crate::models::{
    DeliveryStatus, DurationLookup, ExcludedOrder, HotList, Order, PriorityTier, ResourcePool,
    RoutingSet, RoutingStep, RunResult, ScheduledOperation, ScheduledOrder, ToolGrant,
    ToolInventory, TransitionSet, WorkCalendar,
};
use crate::validation::validate_input;

/// Tunable run parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Margin before the committed date under which a completion is
    /// graded at risk rather than on time.
    pub at_risk_band_minutes: i64,
    /// Whether the consumable-alternation pass reorders within tiers.
    pub alternate_consumables: bool,
    /// How many sequence positions the alternation pass may look ahead.
    pub alternation_window: usize,
    /// Whether alternation may jump an order past one with an earlier
    /// committed date. Off by default: due-date FIFO order is kept.
    pub alternation_overrides_due: bool,
    /// Elapsed minutes past the run start a shortage retry may wait for
    /// a projected tool. `None` waits however long the projection says.
    pub horizon_minutes: Option<i64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            at_risk_band_minutes: 1440,
            alternate_consumables: false,
            alternation_window: 5,
            alternation_overrides_due: false,
            horizon_minutes: None,
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the at-risk band.
    pub fn with_at_risk_band(mut self, minutes: i64) -> Self {
        self.at_risk_band_minutes = minutes;
        self
    }

    /// Enables or disables the alternation pass.
    pub fn with_alternation(mut self, enabled: bool) -> Self {
        self.alternate_consumables = enabled;
        self
    }

    /// Sets the alternation look-ahead window.
    pub fn with_alternation_window(mut self, window: usize) -> Self {
        self.alternation_window = window;
        self
    }

    /// Allows alternation to override due-date order within a tier.
    pub fn with_alternation_overriding_due(mut self, allowed: bool) -> Self {
        self.alternation_overrides_due = allowed;
        self
    }

    /// Bounds how far past the run start a tool shortage may be waited
    /// out.
    pub fn with_horizon_minutes(mut self, minutes: i64) -> Self {
        self.horizon_minutes = Some(minutes);
        self
    }
}

/// Everything one scheduling run reads.
///
/// The context itself is never mutated by a run: the pool and inventory
/// are cloned per run, so one context can serve many runs, including
/// concurrent ones on separate threads.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Plant working-time calendar.
    pub calendar: WorkCalendar,
    /// Resource topology, bookings included as the run's starting state.
    pub pool: ResourcePool,
    /// Tooling inventory.
    pub tools: ToolInventory,
    /// Routing templates by variant.
    pub templates: RoutingSet,
    /// Duration table for lookup operations.
    pub durations: DurationLookup,
    /// Changeover matrices.
    pub transitions: TransitionSet,
    /// Run parameters.
    pub config: SchedulerConfig,
}

/// A step's chosen resources and interval, before booking.
struct Placement {
    resource: String,
    partner: Option<String>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    setup_minutes: i64,
}

impl RunContext {
    /// Creates a context with no changeover matrices and default
    /// configuration.
    pub fn new(
        calendar: WorkCalendar,
        pool: ResourcePool,
        tools: ToolInventory,
        templates: RoutingSet,
        durations: DurationLookup,
    ) -> Self {
        Self {
            calendar,
            pool,
            tools,
            templates,
            durations,
            transitions: TransitionSet::new(),
            config: SchedulerConfig::default(),
        }
    }

    /// Sets the changeover matrices.
    pub fn with_transitions(mut self, transitions: TransitionSet) -> Self {
        self.transitions = transitions;
        self
    }

    /// Sets the run parameters.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Schedules a batch of orders from `start`.
    ///
    /// # Example
    /// ```
    /// use chrono::{Duration, NaiveDate, NaiveTime};
    /// use shopsched::models::{
    ///     DurationLookup, HotList, OperationSpec, Order, Resource, ResourcePool, RoutingSet,
    ///     RoutingTemplate, ToolInventory, WorkCalendar,
    /// };
    /// use shopsched::scheduler::RunContext;
    ///
    /// let calendar = WorkCalendar::five_day(
    ///     NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
    ///     NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    /// )
    /// .unwrap();
    /// let pool = ResourcePool::new().with_resource(Resource::new("saw-1", "saw"));
    /// let templates = RoutingSet::new().with_template(
    ///     RoutingTemplate::new("widget").with_operation(OperationSpec::fixed("cut", "saw", 90)),
    /// );
    /// let ctx = RunContext::new(
    ///     calendar,
    ///     pool,
    ///     ToolInventory::new(0, 0),
    ///     templates,
    ///     DurationLookup::new(),
    /// );
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 1, 1)
    ///     .unwrap()
    ///     .and_hms_opt(8, 0, 0)
    ///     .unwrap();
    /// let order = Order::new("A-1", "widget", start);
    /// let result = ctx.run(&[order], &HotList::new(), start).unwrap();
    /// assert_eq!(
    ///     result.order("A-1").unwrap().completion,
    ///     Some(start + Duration::minutes(90)),
    /// );
    /// ```
    pub fn run(
        &self,
        orders: &[Order],
        hot: &HotList,
        start: NaiveDateTime,
    ) -> Result<RunResult, ScheduleError> {
        self.run_with_deadline(orders, hot, start, None)
    }

    /// Like [`run`](Self::run), but checks a compute deadline between
    /// orders. On expiry the run stops cleanly: orders placed so far are
    /// returned with the `truncated` flag set, the rest are absent.
    pub fn run_with_deadline(
        &self,
        orders: &[Order],
        hot: &HotList,
        start: NaiveDateTime,
        deadline: Option<Instant>,
    ) -> Result<RunResult, ScheduleError> {
        validate_input(orders, &self.templates, &self.pool, &self.tools)
            .map_err(|errors| ScheduleError::Invalid { errors })?;
        debug!(orders = orders.len(), %start, "scheduling run started");

        let sequence = self.sequence(orders, hot);
        let mut pool = self.pool.clone();
        let mut tools = self.tools.clone();
        let mut last_consumable: HashMap<String, String> = HashMap::new();
        let mut scheduled = Vec::with_capacity(orders.len());
        let mut excluded = Vec::new();
        let mut truncated = false;

        for (done, &index) in sequence.iter().enumerate() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    truncated = true;
                    warn!(
                        scheduled = done,
                        remaining = sequence.len() - done,
                        "run truncated at deadline"
                    );
                    break;
                }
            }
            let order = &orders[index];
            let outcome = self.templates.build(order, &self.durations).and_then(|steps| {
                self.place_order(
                    order,
                    hot,
                    &steps,
                    start,
                    &mut pool,
                    &mut tools,
                    &mut last_consumable,
                )
            });
            match outcome {
                Ok(result) => scheduled.push(result),
                Err(reason) => {
                    warn!(order = %order.id, %reason, "order excluded");
                    excluded.push(ExcludedOrder {
                        order_id: order.id.clone(),
                        variant: order.variant.clone(),
                        reason,
                    });
                }
            }
        }

        debug!(
            scheduled = scheduled.len(),
            excluded = excluded.len(),
            truncated,
            "scheduling run complete"
        );
        Ok(RunResult {
            run_start: start,
            orders: scheduled,
            excluded,
            truncated,
            resources: pool,
        })
    }

    /// Final processing order: sort by effective tier, then committed
    /// date within the dated-expedite tier, then FIFO; optionally apply
    /// the consumable-alternation pass.
    fn sequence(&self, orders: &[Order], hot: &HotList) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..orders.len()).collect();
        indices.sort_by(|&a, &b| {
            let (oa, ob) = (&orders[a], &orders[b]);
            let (ta, tb) = (hot.effective_tier(oa), hot.effective_tier(ob));
            ta.cmp(&tb)
                .then_with(|| {
                    if ta == PriorityTier::ExpediteDated {
                        cmp_due(hot.effective_due(oa), hot.effective_due(ob))
                    } else {
                        Ordering::Equal
                    }
                })
                .then_with(|| oa.created_at.cmp(&ob.created_at))
                .then_with(|| oa.id.cmp(&ob.id))
        });
        if self.config.alternate_consumables {
            self.alternate(orders, hot, indices)
        } else {
            indices
        }
    }

    /// Bounded look-ahead pass that breaks up runs of one consumable
    /// tag. Pulls an order forward only within its tier, never ahead of
    /// an order with an earlier committed date (unless configured to)
    /// and never past an order waiting on the same tool number.
    fn alternate(&self, orders: &[Order], hot: &HotList, sequence: Vec<usize>) -> Vec<usize> {
        let window = self.config.alternation_window.max(1);
        let mut pending = sequence;
        let mut result = Vec::with_capacity(pending.len());
        let mut last_tag: Option<String> = None;

        while !pending.is_empty() {
            let mut chosen = 0usize;
            let head = &orders[pending[0]];
            let head_tier = hot.effective_tier(head);
            let repeat = head_tier != PriorityTier::ExpediteDated
                && last_tag.is_some()
                && head.consumable == last_tag;
            if repeat {
                for pos in 1..pending.len().min(window + 1) {
                    let candidate = &orders[pending[pos]];
                    if hot.effective_tier(candidate) != head_tier {
                        break; // never cross a tier boundary
                    }
                    if candidate.consumable == last_tag {
                        continue;
                    }
                    if self.jump_allowed(candidate, &pending[..pos], orders, hot) {
                        chosen = pos;
                        break;
                    }
                }
            }
            let pick = pending.remove(chosen);
            result.push(pick);
            last_tag = orders[pick].consumable.clone();
        }
        result
    }

    /// Whether `candidate` may be scheduled ahead of every order in
    /// `jumped`.
    fn jump_allowed(
        &self,
        candidate: &Order,
        jumped: &[usize],
        orders: &[Order],
        hot: &HotList,
    ) -> bool {
        let candidate_due = hot.effective_due(candidate);
        jumped.iter().all(|&j| {
            let passed = &orders[j];
            // Competing claims on one tool number keep their FIFO order.
            if passed.tool_number.is_some() && passed.tool_number == candidate.tool_number {
                return false;
            }
            if self.config.alternation_overrides_due {
                return true;
            }
            match (hot.effective_due(passed), candidate_due) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(theirs), Some(ours)) => ours <= theirs,
            }
        })
    }

    /// Places one order's steps, booking resources and cycling its tool.
    #[allow(clippy::too_many_arguments)]
    fn place_order(
        &self,
        order: &Order,
        hot: &HotList,
        steps: &[RoutingStep],
        run_start: NaiveDateTime,
        pool: &mut ResourcePool,
        tools: &mut ToolInventory,
        last_consumable: &mut HashMap<String, String>,
    ) -> Result<ScheduledOrder, OrderError> {
        self.check_classes(steps, pool)?;
        let tier = hot.effective_tier(order);
        let due = hot.effective_due(order);
        let is_hot = hot.contains(&order.id);

        let needs_tool = steps.iter().any(|s| s.uses_tool);
        let grant = match (&order.tool_number, needs_tool) {
            (Some(number), true) => {
                match self.acquire_tool(number, order, run_start, tools) {
                    Ok(grant) => Some(grant),
                    Err(shortage) => {
                        warn!(order = %order.id, tool = %number, "tool shortage, order unschedulable");
                        return Ok(unschedulable_order(order, tier, due, is_hot, shortage));
                    }
                }
            }
            _ => None,
        };

        let mut cursor = run_start;
        let mut operations = Vec::with_capacity(steps.len());
        let mut tool_mounted = false;
        for step in steps {
            let mut not_before = cursor;
            if step.uses_tool {
                if let Some(g) = &grant {
                    not_before = not_before.max(g.ready_at);
                }
            }
            let placed = self.place_step(step, order, not_before, pool, last_consumable)?;

            if let Some(r) = pool.get_mut(&placed.resource) {
                r.book(placed.start, placed.end, order.id.as_str());
            }
            if let Some(partner) = &placed.partner {
                if let Some(p) = pool.get_mut(partner) {
                    p.book(placed.start, placed.end, order.id.as_str());
                }
            }
            if let Some(tag) = &order.consumable {
                last_consumable.insert(placed.resource.clone(), tag.clone());
                if let Some(partner) = &placed.partner {
                    last_consumable.insert(partner.clone(), tag.clone());
                }
            }

            let tool_label = if step.uses_tool {
                grant.as_ref().map(|g| g.tool.clone())
            } else {
                None
            };
            if let Some(label) = &tool_label {
                if !tool_mounted {
                    tools.begin_use(label);
                    tool_mounted = true;
                }
            }

            operations.push(ScheduledOperation {
                operation: step.name.clone(),
                resource: placed.resource,
                partner_operation: step.join.as_ref().map(|l| l.name.clone()),
                partner_resource: placed.partner,
                tool: tool_label,
                start: placed.start,
                end: placed.end,
                setup_minutes: placed.setup_minutes,
            });
            cursor = placed.end;
        }

        if let Some(g) = &grant {
            let last_tool_end = operations
                .iter()
                .filter(|op| op.tool.is_some())
                .map(|op| op.end)
                .max();
            if let Some(end) = last_tool_end {
                tools.release(&g.tool, end);
            }
        }

        let completion = cursor;
        Ok(ScheduledOrder {
            order_id: order.id.clone(),
            variant: order.variant.clone(),
            tier,
            hot: is_hot,
            created_at: order.created_at,
            due,
            quantity: order.quantity,
            consumable: order.consumable.clone(),
            tool: grant.map(|g| g.tool),
            operations,
            completion: Some(completion),
            turnaround_minutes: Some((completion - order.created_at).num_minutes()),
            status: DeliveryStatus::grade(completion, due, self.config.at_risk_band_minutes),
            unschedulable: false,
            shortage: None,
        })
    }

    /// Every step must be placeable before anything is booked or a tool
    /// is claimed, so a failing order leaves no partial reservations. A
    /// join pair whose legs share a class needs two distinct stations in
    /// that class.
    fn check_classes(&self, steps: &[RoutingStep], pool: &ResourcePool) -> Result<(), OrderError> {
        for step in steps {
            if !pool.in_class(&step.resource_class).any(|r| r.capacity > 0) {
                return Err(OrderError::NoResourceInClass(step.resource_class.clone()));
            }
            if let Some(leg) = &step.join {
                if !pool.in_class(&leg.resource_class).any(|r| r.capacity > 0) {
                    return Err(OrderError::NoResourceInClass(leg.resource_class.clone()));
                }
                if leg.resource_class == step.resource_class
                    && pool
                        .in_class(&step.resource_class)
                        .filter(|r| r.capacity > 0)
                        .count()
                        < 2
                {
                    return Err(OrderError::JoinNeedsTwoStations(step.resource_class.clone()));
                }
            }
        }
        Ok(())
    }

    /// Claims the order's tool, retrying once at the projected free-up
    /// instant when that falls inside the configured horizon.
    fn acquire_tool(
        &self,
        number: &str,
        order: &Order,
        run_start: NaiveDateTime,
        tools: &mut ToolInventory,
    ) -> Result<ToolGrant, crate::models::ToolShortage> {
        match tools.acquire(number, run_start, &order.id) {
            Ok(grant) => Ok(grant),
            Err(shortage) => {
                let retry_at = shortage.projected_available.filter(|projected| {
                    self.config
                        .horizon_minutes
                        .map_or(true, |h| *projected <= run_start + Duration::minutes(h))
                });
                match retry_at {
                    Some(at) => tools.acquire(number, at, &order.id),
                    None => Err(shortage),
                }
            }
        }
    }

    /// Chooses resources and an interval for one step. A paired step
    /// needs a window where a partner-class resource is simultaneously
    /// free; the search advances to the partner's earliest clear instant
    /// until both sides fit.
    fn place_step(
        &self,
        step: &RoutingStep,
        order: &Order,
        not_before: NaiveDateTime,
        pool: &ResourcePool,
        last_consumable: &HashMap<String, String>,
    ) -> Result<Placement, OrderError> {
        let consumable = order.consumable.as_deref();
        let Some(leg) = &step.join else {
            let (resource, start, end, setup_minutes) = self
                .best_slot(pool, step, consumable, not_before, last_consumable)
                .ok_or_else(|| OrderError::NoResourceInClass(step.resource_class.clone()))?;
            return Ok(Placement {
                resource,
                partner: None,
                start,
                end,
                setup_minutes,
            });
        };

        let mut from = not_before;
        loop {
            let (resource, start, end, setup_minutes) = self
                .best_slot(pool, step, consumable, from, last_consumable)
                .ok_or_else(|| OrderError::NoResourceInClass(step.resource_class.clone()))?;

            let mut partner = None;
            let mut earliest_clear: Option<NaiveDateTime> = None;
            for p in pool.in_class(&leg.resource_class) {
                // The pair occupies two distinct stations.
                if p.capacity == 0 || p.name == resource {
                    continue;
                }
                match p.first_conflict_in(start, end) {
                    None => {
                        partner = Some(p.name.clone());
                        break;
                    }
                    Some(clear) => {
                        earliest_clear = Some(earliest_clear.map_or(clear, |c| c.min(clear)));
                    }
                }
            }
            match (partner, earliest_clear) {
                (Some(partner), _) => {
                    return Ok(Placement {
                        resource,
                        partner: Some(partner),
                        start,
                        end,
                        setup_minutes,
                    })
                }
                (None, Some(clear)) => from = clear,
                (None, None) => {
                    return Err(OrderError::NoResourceInClass(leg.resource_class.clone()))
                }
            }
        }
    }

    /// Earliest slot across a class, changeover included. Ties resolve
    /// to the resource declared first in the pool.
    fn best_slot(
        &self,
        pool: &ResourcePool,
        step: &RoutingStep,
        consumable: Option<&str>,
        not_before: NaiveDateTime,
        last_consumable: &HashMap<String, String>,
    ) -> Option<(String, NaiveDateTime, NaiveDateTime, i64)> {
        let mut best: Option<(String, NaiveDateTime, NaiveDateTime, i64)> = None;
        for r in pool.in_class(&step.resource_class) {
            let changeover = self.transitions.changeover(
                &r.name,
                last_consumable.get(&r.name).map(String::as_str),
                consumable,
            );
            let total = step.setup_minutes + changeover + step.effective_minutes();
            if let Some((start, end)) =
                r.find_slot(&self.calendar, not_before, total, step.runs_through_breaks)
            {
                let better = match &best {
                    None => true,
                    Some((_, bs, be, _)) => (start, end) < (*bs, *be),
                };
                if better {
                    best = Some((r.name.clone(), start, end, step.setup_minutes + changeover));
                }
            }
        }
        best
    }
}

/// Output record for an order blocked by a tool shortage.
fn unschedulable_order(
    order: &Order,
    tier: PriorityTier,
    due: Option<NaiveDateTime>,
    hot: bool,
    shortage: crate::models::ToolShortage,
) -> ScheduledOrder {
    ScheduledOrder {
        order_id: order.id.clone(),
        variant: order.variant.clone(),
        tier,
        hot,
        created_at: order.created_at,
        due,
        quantity: order.quantity,
        consumable: order.consumable.clone(),
        tool: None,
        operations: Vec::new(),
        completion: None,
        turnaround_minutes: None,
        status: DeliveryStatus::Unscheduled,
        unschedulable: true,
        shortage: Some(shortage),
    }
}

/// Ascending by date, undated last.
fn cmp_due(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
