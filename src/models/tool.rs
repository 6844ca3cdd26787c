//! Tooling inventory and lifecycle.
//!
//! Orders that need mounted tooling reference a tool number; the
//! inventory holds the physical instances of each number. An instance
//! cycles Available → Heating → Ready → InUse → Cleaning → Available.
//! Heating and cleaning run on elapsed clock time: an oven keeps heating
//! outside working hours.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lifecycle state of a tool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolState {
    /// On the shelf, ready to be claimed.
    Available,
    /// Claimed and heating up for its holder.
    Heating,
    /// Heated, waiting for its holder's operation to start.
    Ready,
    /// Mounted on a running operation.
    InUse,
    /// Released, being cleaned.
    Cleaning,
}

/// One physical instance of a tool number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInstance {
    /// Tool number shared by interchangeable instances.
    pub number: String,
    /// Instance suffix distinguishing copies of one number.
    pub suffix: String,
    /// Current lifecycle state.
    pub state: ToolState,
    /// Order currently holding the instance, if any.
    pub holder: Option<String>,
    /// When the current timed state (heating, cleaning) completes.
    pub until: Option<NaiveDateTime>,
}

impl ToolInstance {
    /// Unique instance label, `number-suffix`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.number, self.suffix)
    }
}

/// Successful tool claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolGrant {
    /// Label of the granted instance.
    pub tool: String,
    /// Earliest instant the instance is heated and mountable.
    pub ready_at: NaiveDateTime,
}

/// Failed tool claim: every instance of the number is tied up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolShortage {
    /// Order that asked for the tool.
    pub order_id: String,
    /// Requested tool number.
    pub tool_number: String,
    /// Earliest projected instant an instance frees up. `None` when the
    /// number has no instance at all, or none with a known end.
    pub projected_available: Option<NaiveDateTime>,
}

/// All tool instances plus the plant-wide heating and cleaning times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInventory {
    instances: Vec<ToolInstance>,
    /// Heat-up minutes applied on every claim.
    pub heating_minutes: i64,
    /// Cleaning minutes applied on every release.
    pub cleaning_minutes: i64,
}

impl ToolInventory {
    /// Creates an empty inventory with the given cycle times.
    pub fn new(heating_minutes: i64, cleaning_minutes: i64) -> Self {
        Self {
            instances: Vec::new(),
            heating_minutes,
            cleaning_minutes,
        }
    }

    /// Adds an available instance.
    pub fn with_instance(mut self, number: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.add(number, suffix);
        self
    }

    /// Appends an available instance.
    pub fn add(&mut self, number: impl Into<String>, suffix: impl Into<String>) {
        self.instances.push(ToolInstance {
            number: number.into(),
            suffix: suffix.into(),
            state: ToolState::Available,
            holder: None,
            until: None,
        });
    }

    /// All instances, in declaration order.
    pub fn instances(&self) -> &[ToolInstance] {
        &self.instances
    }

    /// Instance by label.
    pub fn instance(&self, label: &str) -> Option<&ToolInstance> {
        self.instances.iter().find(|i| i.label() == label)
    }

    /// Whether any instance carries the number.
    pub fn has_number(&self, number: &str) -> bool {
        self.instances.iter().any(|i| i.number == number)
    }

    /// Number of instances carrying the number.
    pub fn count_for(&self, number: &str) -> usize {
        self.instances.iter().filter(|i| i.number == number).count()
    }

    /// Completes every timed transition due by `at`: heated instances
    /// become ready, cleaned ones return to the shelf.
    pub fn settle(&mut self, at: NaiveDateTime) {
        for inst in &mut self.instances {
            let due = matches!(inst.until, Some(until) if until <= at);
            if !due {
                continue;
            }
            match inst.state {
                ToolState::Heating => {
                    inst.state = ToolState::Ready;
                    inst.until = None;
                }
                ToolState::Cleaning => {
                    inst.state = ToolState::Available;
                    inst.holder = None;
                    inst.until = None;
                }
                _ => {}
            }
        }
    }

    /// Claims an instance of `tool_number` for an order, starting its
    /// heat-up at `not_before`. The first available instance in
    /// declaration order wins. When every instance is tied up, the
    /// shortage carries the earliest projected free-up instant.
    pub fn acquire(
        &mut self,
        tool_number: &str,
        not_before: NaiveDateTime,
        order_id: &str,
    ) -> Result<ToolGrant, ToolShortage> {
        self.settle(not_before);
        let candidate = self
            .instances
            .iter_mut()
            .find(|i| i.number == tool_number && i.state == ToolState::Available);
        if let Some(inst) = candidate {
            let ready_at = not_before + Duration::minutes(self.heating_minutes.max(0));
            inst.state = ToolState::Heating;
            inst.holder = Some(order_id.to_string());
            inst.until = Some(ready_at);
            return Ok(ToolGrant {
                tool: inst.label(),
                ready_at,
            });
        }
        let projected_available = self
            .instances
            .iter()
            .filter(|i| i.number == tool_number)
            .filter_map(|i| i.until)
            .min();
        Err(ToolShortage {
            order_id: order_id.to_string(),
            tool_number: tool_number.to_string(),
            projected_available,
        })
    }

    /// Marks a granted instance as mounted. Heated or still-heating
    /// instances both transition; anything else is left alone with a
    /// warning.
    pub fn begin_use(&mut self, label: &str) {
        match self.instances.iter_mut().find(|i| i.label() == label) {
            Some(inst) if matches!(inst.state, ToolState::Heating | ToolState::Ready) => {
                inst.state = ToolState::InUse;
                inst.until = None;
            }
            Some(inst) => {
                warn!(tool = label, state = ?inst.state, "begin_use on a tool not heating or ready");
            }
            None => warn!(tool = label, "begin_use on unknown tool instance"),
        }
    }

    /// Dismounts an instance at `at` and sends it to cleaning. Unknown
    /// labels and instances not in use are logged and ignored.
    pub fn release(&mut self, label: &str, at: NaiveDateTime) {
        match self.instances.iter_mut().find(|i| i.label() == label) {
            Some(inst) if inst.state == ToolState::InUse => {
                inst.state = ToolState::Cleaning;
                inst.holder = None;
                inst.until = Some(at + Duration::minutes(self.cleaning_minutes.max(0)));
            }
            Some(inst) => {
                warn!(tool = label, state = ?inst.state, "release on a tool not in use");
            }
            None => warn!(tool = label, "release on unknown tool instance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn inventory() -> ToolInventory {
        // 60 min heat-up, 30 min cleaning, two instances of T-9.
        ToolInventory::new(60, 30)
            .with_instance("T-9", "A")
            .with_instance("T-9", "B")
            .with_instance("T-4", "A")
    }

    #[test]
    fn test_acquire_heats_first_available() {
        let mut inv = inventory();
        let grant = inv.acquire("T-9", dt(1, 8, 0), "O-1").unwrap();
        assert_eq!(grant.tool, "T-9-A");
        assert_eq!(grant.ready_at, dt(1, 9, 0));
        let inst = inv.instance("T-9-A").unwrap();
        assert_eq!(inst.state, ToolState::Heating);
        assert_eq!(inst.holder.as_deref(), Some("O-1"));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut inv = inventory();
        let grant = inv.acquire("T-4", dt(1, 8, 0), "O-1").unwrap();

        inv.begin_use(&grant.tool);
        assert_eq!(inv.instance("T-4-A").unwrap().state, ToolState::InUse);

        inv.release(&grant.tool, dt(1, 12, 0));
        let inst = inv.instance("T-4-A").unwrap();
        assert_eq!(inst.state, ToolState::Cleaning);
        assert_eq!(inst.until, Some(dt(1, 12, 30)));

        // Cleaning done by 12:30; the instance can be claimed again.
        let again = inv.acquire("T-4", dt(1, 13, 0), "O-2").unwrap();
        assert_eq!(again.tool, "T-4-A");
        assert_eq!(again.ready_at, dt(1, 14, 0));
    }

    #[test]
    fn test_settle_promotes_heated_to_ready() {
        let mut inv = inventory();
        inv.acquire("T-4", dt(1, 8, 0), "O-1").unwrap();
        inv.settle(dt(1, 9, 0));
        let inst = inv.instance("T-4-A").unwrap();
        assert_eq!(inst.state, ToolState::Ready);
        // Still held, so another order cannot claim it.
        assert_eq!(inst.holder.as_deref(), Some("O-1"));
        assert!(inv.acquire("T-4", dt(1, 9, 0), "O-2").is_err());
    }

    #[test]
    fn test_shortage_projects_earliest_free() {
        let mut inv = inventory();
        let a = inv.acquire("T-9", dt(1, 8, 0), "O-1").unwrap();
        inv.begin_use(&a.tool);
        let b = inv.acquire("T-9", dt(1, 8, 0), "O-2").unwrap();
        inv.begin_use(&b.tool);
        inv.release(&b.tool, dt(1, 10, 0)); // cleaning until 10:30

        let shortage = inv.acquire("T-9", dt(1, 9, 0), "O-3").unwrap_err();
        assert_eq!(shortage.tool_number, "T-9");
        assert_eq!(shortage.order_id, "O-3");
        // O-1 is in use with no end; O-2's instance cleans until 10:30.
        assert_eq!(shortage.projected_available, Some(dt(1, 10, 30)));
    }

    #[test]
    fn test_shortage_for_unknown_number() {
        let mut inv = inventory();
        let shortage = inv.acquire("T-99", dt(1, 8, 0), "O-1").unwrap_err();
        assert_eq!(shortage.projected_available, None);
    }

    #[test]
    fn test_release_unknown_label_is_ignored() {
        let mut inv = inventory();
        inv.release("T-77-Z", dt(1, 8, 0));
        inv.begin_use("T-77-Z");
        assert_eq!(inv.instances().len(), 3);
    }

    #[test]
    fn test_count_and_lookup() {
        let inv = inventory();
        assert!(inv.has_number("T-9"));
        assert!(!inv.has_number("T-1"));
        assert_eq!(inv.count_for("T-9"), 2);
        assert_eq!(inv.count_for("T-4"), 1);
    }
}
