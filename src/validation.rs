//! Input validation for scheduling runs.
//!
//! Checks configuration integrity before any order is placed. Detects:
//! - Duplicate order ids, resource names, tool instance labels
//! - Template references to unknown or zero-capacity resource classes
//! - Empty templates and non-positive durations
//! - Concurrent-pair flags that cannot resolve
//!
//! All defects are collected in one pass; a run refuses to start while
//! any remain. Per-order data problems (missing template for a variant,
//! lookup misses) are not validated here: they exclude the single order
//! at run time instead.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{OperationDuration, Order, ResourcePool, RoutingSet, ToolInventory};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// Two orders share an id.
    DuplicateOrderId,
    /// Two resources share a name.
    DuplicateResource,
    /// Two tool instances share a (number, suffix) label.
    DuplicateTool,
    /// A template operation references a class with no resources.
    UnknownResourceClass,
    /// A template-referenced class contains a zero-capacity resource.
    ZeroCapacityResource,
    /// A routing template has no operations.
    EmptyTemplate,
    /// A fixed duration or setup that can never book.
    NonPositiveDuration,
    /// A concurrent-pair flag names a missing or self operation.
    InvalidJoin,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the full input of a scheduling run.
///
/// Checks:
/// 1. No duplicate order ids
/// 2. No duplicate resource names
/// 3. No duplicate tool instance labels
/// 4. Every template operation's class has at least one resource
/// 5. No referenced class contains a zero-capacity resource
/// 6. No template is empty
/// 7. Fixed durations are positive, setups non-negative
/// 8. Every concurrent-pair flag names another operation in its template
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(
    orders: &[Order],
    templates: &RoutingSet,
    pool: &ResourcePool,
    tools: &ToolInventory,
) -> ValidationResult {
    let mut errors = Vec::new();

    let mut order_ids = HashSet::new();
    for order in orders {
        if !order_ids.insert(order.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateOrderId,
                format!("duplicate order id `{}`", order.id),
            ));
        }
    }

    let mut resource_names = HashSet::new();
    for resource in pool.resources() {
        if !resource_names.insert(resource.name.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateResource,
                format!("duplicate resource name `{}`", resource.name),
            ));
        }
    }

    let mut tool_labels = HashSet::new();
    for instance in tools.instances() {
        if !tool_labels.insert(instance.label()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateTool,
                format!("duplicate tool instance `{}`", instance.label()),
            ));
        }
    }

    // Template checks run in variant order, so repeated runs report the
    // same defects in the same sequence.
    let mut referenced_classes = HashSet::new();
    for template in templates.templates() {
        if template.operations.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyTemplate,
                format!("routing template for `{}` has no operations", template.variant),
            ));
        }
        for op in &template.operations {
            if pool.in_class(&op.resource_class).next().is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownResourceClass,
                    format!(
                        "operation `{}` of `{}` references unknown class `{}`",
                        op.name, template.variant, op.resource_class
                    ),
                ));
            } else {
                referenced_classes.insert(op.resource_class.as_str());
            }

            if let OperationDuration::Fixed(minutes) = op.duration {
                if minutes <= 0 {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::NonPositiveDuration,
                        format!(
                            "operation `{}` of `{}` has non-positive duration {minutes}",
                            op.name, template.variant
                        ),
                    ));
                }
            }
            if op.setup_minutes < 0 {
                errors.push(ValidationError::new(
                    ValidationErrorKind::NonPositiveDuration,
                    format!(
                        "operation `{}` of `{}` has negative setup {}",
                        op.name, template.variant, op.setup_minutes
                    ),
                ));
            }

            if let Some(partner) = &op.concurrent_with {
                let resolves = *partner != op.name
                    && template.operations.iter().any(|o| o.name == *partner);
                if !resolves {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidJoin,
                        format!(
                            "operation `{}` of `{}` pairs with unresolvable `{partner}`",
                            op.name, template.variant
                        ),
                    ));
                }
            }
        }
    }

    for resource in pool.resources() {
        if resource.capacity == 0 && referenced_classes.contains(resource.class.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::ZeroCapacityResource,
                format!(
                    "resource `{}` in referenced class `{}` has zero capacity",
                    resource.name, resource.class
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperationSpec, Resource, RoutingTemplate};
    use chrono::NaiveDate;

    fn created() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn sample_orders() -> Vec<Order> {
        vec![
            Order::new("A", "widget", created()),
            Order::new("B", "widget", created()),
        ]
    }

    fn sample_templates() -> RoutingSet {
        RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("cut", "saw", 30))
                .with_operation(OperationSpec::fixed("mill", "mill", 60)),
        )
    }

    fn sample_pool() -> ResourcePool {
        ResourcePool::new()
            .with_resource(Resource::new("saw-1", "saw"))
            .with_resource(Resource::new("mill-1", "mill"))
    }

    fn sample_tools() -> ToolInventory {
        ToolInventory::new(60, 30).with_instance("T-9", "A")
    }

    #[test]
    fn test_valid_input() {
        let result = validate_input(
            &sample_orders(),
            &sample_templates(),
            &sample_pool(),
            &sample_tools(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_order_id() {
        let orders = vec![
            Order::new("A", "widget", created()),
            Order::new("A", "widget", created()),
        ];
        let errors = validate_input(&orders, &sample_templates(), &sample_pool(), &sample_tools())
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateOrderId));
    }

    #[test]
    fn test_duplicate_resource_name() {
        let pool = sample_pool().with_resource(Resource::new("saw-1", "saw"));
        let errors = validate_input(&sample_orders(), &sample_templates(), &pool, &sample_tools())
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateResource));
    }

    #[test]
    fn test_duplicate_tool_instance() {
        let tools = sample_tools().with_instance("T-9", "A");
        let errors = validate_input(&sample_orders(), &sample_templates(), &sample_pool(), &tools)
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateTool));
    }

    #[test]
    fn test_unknown_resource_class() {
        let templates = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("coat", "paint-line", 30)),
        );
        let errors = validate_input(&sample_orders(), &templates, &sample_pool(), &sample_tools())
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::UnknownResourceClass));
    }

    #[test]
    fn test_zero_capacity_in_referenced_class() {
        let pool = sample_pool().with_resource(Resource::new("saw-2", "saw").with_capacity(0));
        let errors = validate_input(&sample_orders(), &sample_templates(), &pool, &sample_tools())
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::ZeroCapacityResource));
    }

    #[test]
    fn test_zero_capacity_unreferenced_is_fine() {
        // Mothballed machine in a class no template uses.
        let pool = sample_pool().with_resource(Resource::new("lathe-1", "lathe").with_capacity(0));
        assert!(validate_input(&sample_orders(), &sample_templates(), &pool, &sample_tools()).is_ok());
    }

    #[test]
    fn test_empty_template() {
        let templates = sample_templates().with_template(RoutingTemplate::new("gadget"));
        let errors = validate_input(&sample_orders(), &templates, &sample_pool(), &sample_tools())
            .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::EmptyTemplate));
    }

    #[test]
    fn test_non_positive_durations() {
        let templates = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("cut", "saw", 0))
                .with_operation(OperationSpec::fixed("mill", "mill", 60).with_setup(-5)),
        );
        let errors = validate_input(&sample_orders(), &templates, &sample_pool(), &sample_tools())
            .unwrap_err();
        let count = errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::NonPositiveDuration)
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_invalid_join_flags() {
        let templates = RoutingSet::new().with_template(
            RoutingTemplate::new("widget")
                .with_operation(OperationSpec::fixed("cut", "saw", 30).concurrent_with("cut"))
                .with_operation(OperationSpec::fixed("mill", "mill", 60).concurrent_with("gone")),
        );
        let errors = validate_input(&sample_orders(), &templates, &sample_pool(), &sample_tools())
            .unwrap_err();
        let count = errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::InvalidJoin)
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_multiple_errors_collected() {
        let orders = vec![
            Order::new("A", "widget", created()),
            Order::new("A", "widget", created()),
        ];
        let templates = sample_templates().with_template(RoutingTemplate::new("gadget"));
        let errors =
            validate_input(&orders, &templates, &sample_pool(), &sample_tools()).unwrap_err();
        assert!(errors.len() >= 2);
    }
}
