//! Finite-capacity resources and their booking ledgers.
//!
//! A resource belongs to a class (interchangeable machines) and holds a
//! capacity: how many bookings may overlap at any instant. Placement is
//! first-fit over time: [`Resource::find_slot`] walks forward from a
//! lower bound until the calendar-stretched interval fits under the
//! capacity limit. All intervals are half-open, so a booking ending at
//! `t` never collides with one starting at `t`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::WorkCalendar;

/// One reservation on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Reservation start (inclusive).
    pub start: NaiveDateTime,
    /// Reservation end (exclusive).
    pub end: NaiveDateTime,
    /// Order holding the reservation.
    pub order_id: String,
}

/// A bookable machine or station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource name.
    pub name: String,
    /// Class the resource is interchangeable within.
    pub class: String,
    /// Bookings that may overlap at one instant.
    pub capacity: u32,
    /// Ledger, kept sorted by (start, end).
    bookings: Vec<Booking>,
}

impl Resource {
    /// Creates a capacity-1 resource.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            capacity: 1,
            bookings: Vec::new(),
        }
    }

    /// Sets the capacity.
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// The booking ledger, sorted by start time.
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// Earliest slot of `minutes` working time starting at or after
    /// `not_before`. Returns the (start, end) pair, with the start
    /// snapped to working time and the end calendar-stretched. `None`
    /// only for a zero-capacity resource.
    pub fn find_slot(
        &self,
        calendar: &WorkCalendar,
        not_before: NaiveDateTime,
        minutes: i64,
        through_breaks: bool,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if self.capacity == 0 {
            return None;
        }
        let mut cursor = not_before;
        loop {
            let start = calendar.next_working_from(cursor, through_breaks);
            let end = calendar.advance_mode(start, minutes, through_breaks);
            match self.first_conflict_in(start, end) {
                None => return Some((start, end)),
                // Each retry moves past at least one booking end.
                Some(clear) => cursor = clear,
            }
        }
    }

    /// Whether [start, end) would exceed capacity. On conflict, returns
    /// the earliest instant a saturating booking ends, which is where a
    /// retry should resume. Zero-length intervals never conflict.
    pub fn first_conflict_in(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<NaiveDateTime> {
        if end <= start || self.bookings.is_empty() {
            return None;
        }
        if self.capacity == 0 {
            return Some(end);
        }
        let mut events: Vec<(NaiveDateTime, i32)> = Vec::new();
        for b in &self.bookings {
            if b.start < end && b.end > start {
                events.push((b.start.max(start), 1));
                events.push((b.end.min(end), -1));
            }
        }
        if events.is_empty() {
            return None;
        }
        // Ties sort the -1 first: an ending booking frees its slot to one
        // starting at the same instant.
        events.sort_unstable();
        let mut active = 0i64;
        for (time, delta) in events {
            active += i64::from(delta);
            if active >= i64::from(self.capacity) {
                return self
                    .bookings
                    .iter()
                    .filter(|b| b.start <= time && b.end > time)
                    .map(|b| b.end)
                    .min();
            }
        }
        None
    }

    /// Records a reservation. Zero-length intervals are dropped.
    pub fn book(&mut self, start: NaiveDateTime, end: NaiveDateTime, order_id: impl Into<String>) {
        if end <= start {
            return;
        }
        let booking = Booking {
            start,
            end,
            order_id: order_id.into(),
        };
        let at = self
            .bookings
            .partition_point(|b| (b.start, b.end) <= (booking.start, booking.end));
        self.bookings.insert(at, booking);
    }

    /// Booked minutes overlapping [from, to), summed across overlapping
    /// reservations.
    pub fn booked_minutes_in(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        if to <= from {
            return 0;
        }
        self.bookings
            .iter()
            .map(|b| {
                let overlap = b.end.min(to) - b.start.max(from);
                overlap.num_minutes().max(0)
            })
            .sum()
    }

    /// Booked share of the elapsed window [from, to). Calendar-blind;
    /// for a report over working time see `RunResult::utilization`.
    pub fn utilization(&self, from: NaiveDateTime, to: NaiveDateTime) -> f64 {
        let window = (to - from).num_minutes();
        if window <= 0 {
            return 0.0;
        }
        self.booked_minutes_in(from, to) as f64 / window as f64
    }
}

/// All plant resources, in declaration order.
///
/// Vec storage keeps candidate iteration deterministic: ties between
/// equally early slots resolve to the resource declared first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    resources: Vec<Resource>,
}

impl ResourcePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.add(resource);
        self
    }

    /// Appends a resource.
    pub fn add(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// Resource by name.
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Mutable resource by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.name == name)
    }

    /// Resources of a class, in declaration order.
    pub fn in_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources.iter().filter(move |r| r.class == class)
    }

    /// All resources, in declaration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_time(t(h, m))
    }

    fn cal() -> WorkCalendar {
        WorkCalendar::five_day(t(8, 0), t(16, 0)).unwrap()
    }

    #[test]
    fn test_book_keeps_ledger_sorted() {
        let mut r = Resource::new("saw-1", "saw");
        r.book(dt(1, 12, 0), dt(1, 13, 0), "B");
        r.book(dt(1, 8, 0), dt(1, 9, 0), "A");
        r.book(dt(1, 10, 0), dt(1, 11, 0), "C");
        let starts: Vec<_> = r.bookings().iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![dt(1, 8, 0), dt(1, 10, 0), dt(1, 12, 0)]);
    }

    #[test]
    fn test_conflict_capacity_one() {
        let mut r = Resource::new("saw-1", "saw");
        r.book(dt(1, 9, 0), dt(1, 11, 0), "A");
        assert_eq!(
            r.first_conflict_in(dt(1, 10, 0), dt(1, 12, 0)),
            Some(dt(1, 11, 0))
        );
        assert_eq!(r.first_conflict_in(dt(1, 11, 0), dt(1, 12, 0)), None);
    }

    #[test]
    fn test_half_open_adjacency() {
        let mut r = Resource::new("saw-1", "saw");
        r.book(dt(1, 8, 0), dt(1, 10, 0), "A");
        // Ends at 10:00, a booking starting 10:00 fits.
        assert_eq!(r.first_conflict_in(dt(1, 10, 0), dt(1, 11, 0)), None);
        // And one ending at 08:00 fits before it.
        assert_eq!(r.first_conflict_in(dt(1, 7, 0), dt(1, 8, 0)), None);
    }

    #[test]
    fn test_capacity_two_admits_pair() {
        let mut r = Resource::new("oven-1", "oven").with_capacity(2);
        r.book(dt(1, 9, 0), dt(1, 12, 0), "A");
        assert_eq!(r.first_conflict_in(dt(1, 10, 0), dt(1, 11, 0)), None);
        r.book(dt(1, 10, 0), dt(1, 11, 0), "B");
        // A third overlapping booking saturates; clears when B ends.
        assert_eq!(
            r.first_conflict_in(dt(1, 10, 30), dt(1, 11, 30)),
            Some(dt(1, 11, 0))
        );
    }

    #[test]
    fn test_zero_length_never_conflicts() {
        let mut r = Resource::new("saw-1", "saw");
        r.book(dt(1, 8, 0), dt(1, 16, 0), "A");
        assert_eq!(r.first_conflict_in(dt(1, 10, 0), dt(1, 10, 0)), None);
        r.book(dt(1, 10, 0), dt(1, 10, 0), "B");
        assert_eq!(r.bookings().len(), 1);
    }

    #[test]
    fn test_find_slot_first_fit() {
        let mut r = Resource::new("saw-1", "saw");
        r.book(dt(1, 8, 0), dt(1, 10, 0), "A");
        r.book(dt(1, 10, 30), dt(1, 12, 0), "B");
        // 30 minutes fit exactly in the gap.
        assert_eq!(
            r.find_slot(&cal(), dt(1, 8, 0), 30, false),
            Some((dt(1, 10, 0), dt(1, 10, 30)))
        );
        // 60 minutes must wait for B to clear.
        assert_eq!(
            r.find_slot(&cal(), dt(1, 8, 0), 60, false),
            Some((dt(1, 12, 0), dt(1, 13, 0)))
        );
    }

    #[test]
    fn test_find_slot_stretches_over_weekend() {
        let r = Resource::new("saw-1", "saw");
        // Friday the 5th, 15:00 + 120 working minutes ends Monday 09:00.
        assert_eq!(
            r.find_slot(&cal(), dt(5, 15, 0), 120, false),
            Some((dt(5, 15, 0), dt(8, 9, 0)))
        );
    }

    #[test]
    fn test_find_slot_zero_capacity() {
        let r = Resource::new("saw-1", "saw").with_capacity(0);
        assert_eq!(r.find_slot(&cal(), dt(1, 8, 0), 30, false), None);
    }

    #[test]
    fn test_booked_minutes_and_utilization() {
        let mut r = Resource::new("oven-1", "oven").with_capacity(2);
        r.book(dt(1, 8, 0), dt(1, 10, 0), "A");
        r.book(dt(1, 9, 0), dt(1, 10, 0), "B");
        // Overlap counts double under capacity 2.
        assert_eq!(r.booked_minutes_in(dt(1, 8, 0), dt(1, 10, 0)), 180);
        assert_eq!(r.booked_minutes_in(dt(1, 9, 30), dt(1, 12, 0)), 60);
        let u = r.utilization(dt(1, 8, 0), dt(1, 12, 0));
        assert!((u - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_pool_class_iteration_order() {
        let pool = ResourcePool::new()
            .with_resource(Resource::new("saw-2", "saw"))
            .with_resource(Resource::new("mill-1", "mill"))
            .with_resource(Resource::new("saw-1", "saw"));
        let names: Vec<_> = pool.in_class("saw").map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["saw-2", "saw-1"]);
        assert!(pool.get("mill-1").is_some());
        assert!(pool.get("lathe-1").is_none());
    }
}
