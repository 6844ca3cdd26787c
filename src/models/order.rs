//! Production orders and expedite handling.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Priority tier of an order. Declaration order is urgency order:
/// earlier variants are scheduled first, FIFO within a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityTier {
    /// Expedited with no committed date; jumps everything.
    ExpediteImmediate,
    /// Expedited against a committed date; sorted by that date.
    ExpediteDated,
    /// Rework ahead of regular work.
    Rework,
    /// Regular production.
    Standard,
    /// Fill-in work behind everything else.
    Lowest,
}

impl Default for PriorityTier {
    fn default() -> Self {
        PriorityTier::Standard
    }
}

/// A production order for one item variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: String,
    /// Item variant; selects the routing template.
    pub variant: String,
    /// Order creation timestamp, used for FIFO tiebreaks.
    pub created_at: NaiveDateTime,
    /// Committed delivery date, if any.
    pub due: Option<NaiveDateTime>,
    /// Piece count.
    pub quantity: u32,
    /// Priority tier.
    pub tier: PriorityTier,
    /// Tooling number required by tool-bearing operations, if any.
    pub tool_number: Option<String>,
    /// Consumable tag driving changeover times, if any.
    pub consumable: Option<String>,
    /// Free-form attributes carried through to the result.
    pub attributes: HashMap<String, String>,
}

impl Order {
    /// Creates a standard-tier order with quantity 1.
    pub fn new(
        id: impl Into<String>,
        variant: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            variant: variant.into(),
            created_at,
            due: None,
            quantity: 1,
            tier: PriorityTier::Standard,
            tool_number: None,
            consumable: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets the committed delivery date.
    pub fn with_due(mut self, due: NaiveDateTime) -> Self {
        self.due = Some(due);
        self
    }

    /// Sets the piece count.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the priority tier.
    pub fn with_tier(mut self, tier: PriorityTier) -> Self {
        self.tier = tier;
        self
    }

    /// Sets the required tooling number.
    pub fn with_tool(mut self, tool_number: impl Into<String>) -> Self {
        self.tool_number = Some(tool_number.into());
        self
    }

    /// Sets the consumable tag.
    pub fn with_consumable(mut self, consumable: impl Into<String>) -> Self {
        self.consumable = Some(consumable.into());
        self
    }

    /// Adds a free-form attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Per-run expedite list.
///
/// Entries promote orders without touching stored order data. An entry
/// with no override date promotes to [`PriorityTier::ExpediteImmediate`];
/// an entry with one promotes to [`PriorityTier::ExpediteDated`] and the
/// override replaces the order's committed date for sequencing and for
/// delivery grading. Promotion never demotes: an order already in a
/// higher tier keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotList {
    entries: HashMap<String, Option<NaiveDateTime>>,
}

impl HotList {
    /// Creates an empty hot list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an order hot with no committed date.
    pub fn with_asap(mut self, order_id: impl Into<String>) -> Self {
        self.entries.insert(order_id.into(), None);
        self
    }

    /// Marks an order hot against an override date.
    pub fn with_dated(mut self, order_id: impl Into<String>, due: NaiveDateTime) -> Self {
        self.entries.insert(order_id.into(), Some(due));
        self
    }

    /// Whether an order is on the list.
    pub fn contains(&self, order_id: &str) -> bool {
        self.entries.contains_key(order_id)
    }

    /// Tier the order is sequenced under, after promotion.
    pub fn effective_tier(&self, order: &Order) -> PriorityTier {
        match self.entries.get(&order.id) {
            Some(None) => order.tier.min(PriorityTier::ExpediteImmediate),
            Some(Some(_)) => order.tier.min(PriorityTier::ExpediteDated),
            None => order.tier,
        }
    }

    /// Committed date the order is sequenced and graded against.
    pub fn effective_due(&self, order: &Order) -> Option<NaiveDateTime> {
        match self.entries.get(&order.id) {
            Some(Some(override_due)) => Some(*override_due),
            _ => order.due,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
