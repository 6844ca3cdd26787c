//! Routing templates and per-order routing expansion.
//!
//! A template lists the operations a variant goes through, in sequence.
//! [`RoutingSet::build`] turns a template into concrete routing steps for
//! one order: lookup durations are resolved against the duration table
//! and concurrent pairs are collapsed into a single step that books both
//! resources side by side.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::OrderError;
use crate::models::Order;

/// How an operation's run time is determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationDuration {
    /// Fixed run time in minutes.
    Fixed(i64),
    /// Resolved from the duration table by variant, with the order's
    /// tooling number as fallback key.
    Lookup,
}

/// One operation in a routing template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Operation name, unique within its template.
    pub name: String,
    /// Resource class the operation runs on.
    pub resource_class: String,
    /// Run time source.
    pub duration: OperationDuration,
    /// Fixed setup minutes on top of any changeover time.
    pub setup_minutes: i64,
    /// Whether the operation mounts the order's tooling.
    pub uses_tool: bool,
    /// Whether the operation keeps running through break intervals.
    pub runs_through_breaks: bool,
    /// Name of an operation that runs concurrently with this one.
    pub concurrent_with: Option<String>,
}

impl OperationSpec {
    /// Creates a fixed-duration operation.
    pub fn fixed(name: impl Into<String>, resource_class: impl Into<String>, minutes: i64) -> Self {
        Self {
            name: name.into(),
            resource_class: resource_class.into(),
            duration: OperationDuration::Fixed(minutes),
            setup_minutes: 0,
            uses_tool: false,
            runs_through_breaks: false,
            concurrent_with: None,
        }
    }

    /// Creates an operation whose run time comes from the duration table.
    pub fn lookup(name: impl Into<String>, resource_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_class: resource_class.into(),
            duration: OperationDuration::Lookup,
            setup_minutes: 0,
            uses_tool: false,
            runs_through_breaks: false,
            concurrent_with: None,
        }
    }

    /// Sets fixed setup minutes.
    pub fn with_setup(mut self, minutes: i64) -> Self {
        self.setup_minutes = minutes;
        self
    }

    /// Marks the operation as mounting the order's tooling.
    pub fn tool_bearing(mut self) -> Self {
        self.uses_tool = true;
        self
    }

    /// Marks the operation as running through breaks.
    pub fn through_breaks(mut self) -> Self {
        self.runs_through_breaks = true;
        self
    }

    /// Pairs this operation with a concurrently running one.
    pub fn concurrent_with(mut self, operation: impl Into<String>) -> Self {
        self.concurrent_with = Some(operation.into());
        self
    }
}

/// Ordered operation list for one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTemplate {
    /// Variant this template applies to.
    pub variant: String,
    /// Operations in processing sequence.
    pub operations: Vec<OperationSpec>,
}

impl RoutingTemplate {
    /// Creates an empty template for a variant.
    pub fn new(variant: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            operations: Vec::new(),
        }
    }

    /// Appends an operation.
    pub fn with_operation(mut self, operation: OperationSpec) -> Self {
        self.operations.push(operation);
        self
    }
}

/// Duration table for lookup operations.
///
/// Keyed by (lookup key, operation name); the lookup key is the order's
/// variant, falling back to its tooling number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationLookup {
    entries: HashMap<(String, String), i64>,
}

impl DurationLookup {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    pub fn with_entry(
        mut self,
        key: impl Into<String>,
        operation: impl Into<String>,
        minutes: i64,
    ) -> Self {
        self.set(key, operation, minutes);
        self
    }

    /// Inserts or replaces an entry.
    pub fn set(&mut self, key: impl Into<String>, operation: impl Into<String>, minutes: i64) {
        self.entries.insert((key.into(), operation.into()), minutes);
    }

    /// Looks up a duration.
    pub fn get(&self, key: &str, operation: &str) -> Option<i64> {
        self.entries
            .get(&(key.to_string(), operation.to_string()))
            .copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The concurrent leg of a collapsed pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLeg {
    /// Partner operation name.
    pub name: String,
    /// Resource class the partner books.
    pub resource_class: String,
    /// Partner run time, its own setup included.
    pub minutes: i64,
}

/// A concrete step of one order's routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStep {
    /// Operation name.
    pub name: String,
    /// Resource class to book.
    pub resource_class: String,
    /// Resolved run time in minutes.
    pub minutes: i64,
    /// Fixed setup minutes.
    pub setup_minutes: i64,
    /// Whether the step mounts the order's tooling.
    pub uses_tool: bool,
    /// Whether the step runs through breaks.
    pub runs_through_breaks: bool,
    /// Concurrent partner leg, if this step is a collapsed pair.
    pub join: Option<JoinLeg>,
}

impl RoutingStep {
    /// Run time the step occupies its resources for: the longer leg of a
    /// pair, or the step's own run time.
    pub fn effective_minutes(&self) -> i64 {
        match &self.join {
            Some(leg) => self.minutes.max(leg.minutes),
            None => self.minutes,
        }
    }
}

/// All routing templates, keyed by variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingSet {
    templates: BTreeMap<String, RoutingTemplate>,
}

impl RoutingSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template, replacing any existing one for the variant.
    pub fn with_template(mut self, template: RoutingTemplate) -> Self {
        self.add(template);
        self
    }

    /// Inserts a template.
    pub fn add(&mut self, template: RoutingTemplate) {
        self.templates.insert(template.variant.clone(), template);
    }

    /// Template for a variant, if present.
    pub fn get(&self, variant: &str) -> Option<&RoutingTemplate> {
        self.templates.get(variant)
    }

    /// Iterates templates in variant order.
    pub fn templates(&self) -> impl Iterator<Item = &RoutingTemplate> {
        self.templates.values()
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Expands the order's template into concrete routing steps.
    ///
    /// Lookup durations resolve by variant first, then by the order's
    /// tooling number. A concurrent pair collapses into one step at the
    /// flagged operation's position; the partner is removed from the
    /// sequence wherever it appears, and its setup folds into its leg.
    pub fn build(&self, order: &Order, lookup: &DurationLookup) -> Result<Vec<RoutingStep>, OrderError> {
        let template = self
            .get(&order.variant)
            .ok_or_else(|| OrderError::MissingTemplate(order.variant.clone()))?;
        let ops = &template.operations;

        let mut minutes = Vec::with_capacity(ops.len());
        for op in ops {
            minutes.push(self.resolve_minutes(op, order, lookup)?);
        }

        // Pairing pass: each flagged operation claims its partner, which
        // drops out of the emitted sequence.
        let mut partner_of: Vec<Option<usize>> = vec![None; ops.len()];
        let mut consumed = vec![false; ops.len()];
        for i in 0..ops.len() {
            if consumed[i] {
                continue;
            }
            let Some(partner_name) = &ops[i].concurrent_with else {
                continue;
            };
            let partner = ops
                .iter()
                .enumerate()
                .find(|(j, cand)| *j != i && !consumed[*j] && cand.name == *partner_name)
                .map(|(j, _)| j);
            match partner {
                Some(j) => {
                    consumed[j] = true;
                    partner_of[i] = Some(j);
                }
                None => {
                    return Err(OrderError::MissingJoinPartner {
                        operation: ops[i].name.clone(),
                        partner: partner_name.clone(),
                    })
                }
            }
        }

        let mut steps = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            let join = partner_of[i].map(|j| JoinLeg {
                name: ops[j].name.clone(),
                resource_class: ops[j].resource_class.clone(),
                minutes: minutes[j] + ops[j].setup_minutes,
            });
            let (uses_tool, runs_through_breaks) = match partner_of[i] {
                Some(j) => (
                    op.uses_tool || ops[j].uses_tool,
                    op.runs_through_breaks || ops[j].runs_through_breaks,
                ),
                None => (op.uses_tool, op.runs_through_breaks),
            };
            steps.push(RoutingStep {
                name: op.name.clone(),
                resource_class: op.resource_class.clone(),
                minutes: minutes[i],
                setup_minutes: op.setup_minutes,
                uses_tool,
                runs_through_breaks,
                join,
            });
        }
        Ok(steps)
    }

    fn resolve_minutes(
        &self,
        op: &OperationSpec,
        order: &Order,
        lookup: &DurationLookup,
    ) -> Result<i64, OrderError> {
        match op.duration {
            OperationDuration::Fixed(minutes) => Ok(minutes),
            OperationDuration::Lookup => lookup
                .get(&order.variant, &op.name)
                .or_else(|| {
                    order
                        .tool_number
                        .as_deref()
                        .and_then(|tool| lookup.get(tool, &op.name))
                })
                .ok_or_else(|| OrderError::MissingDuration {
                    variant: order.variant.clone(),
                    operation: op.name.clone(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order(variant: &str) -> Order {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Order::new("O-1", variant, created)
    }

    fn simple_set() -> RoutingSet {
        RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("cut", "saw", 30).with_setup(10))
                .with_operation(OperationSpec::fixed("mill", "mill", 60)),
        )
    }

    #[test]
    fn test_build_fixed_durations() {
        let steps = simple_set()
            .build(&order("widget"), &DurationLookup::new())
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "cut");
        assert_eq!(steps[0].minutes, 30);
        assert_eq!(steps[0].setup_minutes, 10);
        assert_eq!(steps[1].name, "mill");
        assert_eq!(steps[1].effective_minutes(), 60);
    }

    #[test]
    fn test_missing_template() {
        let err = simple_set()
            .build(&order("gadget"), &DurationLookup::new())
            .unwrap_err();
        assert_eq!(err, OrderError::MissingTemplate("gadget".into()));
    }

    #[test]
    fn test_lookup_resolution_and_tool_fallback() {
        let set = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::lookup("grind", "grinder")),
        );
        let table = DurationLookup::new()
            .with_entry("widget", "grind", 45)
            .with_entry("T-9", "grind", 75);

        let by_variant = set.build(&order("widget"), &table).unwrap();
        assert_eq!(by_variant[0].minutes, 45);

        let tool_only = DurationLookup::new().with_entry("T-9", "grind", 75);
        let by_tool = set
            .build(&order("widget").with_tool("T-9"), &tool_only)
            .unwrap();
        assert_eq!(by_tool[0].minutes, 75);

        let err = set
            .build(&order("widget"), &DurationLookup::new())
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::MissingDuration {
                variant: "widget".into(),
                operation: "grind".into(),
            }
        );
    }

    #[test]
    fn test_concurrent_pair_collapses() {
        let set = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("cut", "saw", 30))
                .with_operation(
                    OperationSpec::fixed("anneal", "furnace", 90).concurrent_with("inspect"),
                )
                .with_operation(OperationSpec::fixed("inspect", "bench", 40).with_setup(5)),
        );
        let steps = set.build(&order("widget"), &DurationLookup::new()).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].name, "anneal");
        let leg = steps[1].join.as_ref().unwrap();
        assert_eq!(leg.name, "inspect");
        assert_eq!(leg.resource_class, "bench");
        assert_eq!(leg.minutes, 45); // partner setup folded in
        assert_eq!(steps[1].effective_minutes(), 90);
    }

    #[test]
    fn test_concurrent_partner_listed_first() {
        let set = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("inspect", "bench", 40))
                .with_operation(
                    OperationSpec::fixed("anneal", "furnace", 20).concurrent_with("inspect"),
                ),
        );
        let steps = set.build(&order("widget"), &DurationLookup::new()).unwrap();
        // Pair sits at the flagged operation's position.
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "anneal");
        assert_eq!(steps[0].effective_minutes(), 40);
    }

    #[test]
    fn test_missing_join_partner() {
        let set = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("anneal", "furnace", 20).concurrent_with("x")),
        );
        let err = set
            .build(&order("widget"), &DurationLookup::new())
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::MissingJoinPartner {
                operation: "anneal".into(),
                partner: "x".into(),
            }
        );
    }

    #[test]
    fn test_pair_merges_flags() {
        let set = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(
                    OperationSpec::fixed("press", "press", 30).concurrent_with("cure"),
                )
                .with_operation(
                    OperationSpec::fixed("cure", "oven", 60)
                        .tool_bearing()
                        .through_breaks(),
                ),
        );
        let steps = set.build(&order("widget"), &DurationLookup::new()).unwrap();
        assert!(steps[0].uses_tool);
        assert!(steps[0].runs_through_breaks);
    }
}
