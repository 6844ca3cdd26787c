//! Working-time calendar.
//!
//! Defines when the plant is running: working weekdays, shift windows,
//! break intervals, and holiday dates. All duration arithmetic in the
//! scheduler goes through [`WorkCalendar::advance`], which consumes
//! working minutes only.
//!
//! # Time Model
//! Timestamps are `chrono::NaiveDateTime` at minute precision; durations
//! are integer minutes. Shift and break windows are times of day and
//! recur on every qualifying date.
//!
//! # Overnight Shifts
//! A shift window whose end is not after its start crosses midnight. The
//! spillover into the next day is attributed to the starting date: a
//! Thursday 17:00-05:00 shift is working time through Friday 04:59 even
//! when Friday itself is not a working day.

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ScheduleError;

/// A time-of-day interval [start, end).
///
/// When `end <= start` the window crosses midnight; equal endpoints span
/// a full day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockWindow {
    /// Window start (inclusive).
    pub start: NaiveTime,
    /// Window end (exclusive).
    pub end: NaiveTime,
}

impl ClockWindow {
    /// Creates a new clock window.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether this window wraps past midnight.
    #[inline]
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Whether a time of day falls within this window.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.crosses_midnight() {
            time >= self.start || time < self.end
        } else {
            time >= self.start && time < self.end
        }
    }

    /// Window length in minutes.
    pub fn length_minutes(&self) -> i64 {
        let start = minute_of_day(self.start);
        let end = minute_of_day(self.end);
        if self.crosses_midnight() {
            (1440 - start) + end
        } else {
            end - start
        }
    }
}

/// Minute-of-day index for a time (0..1440).
fn minute_of_day(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}

/// The plant working-time calendar.
///
/// Immutable once constructed. Construction fails with
/// [`ScheduleError::NoWorkingTime`] when the configuration can never
/// yield a working instant (no weekdays, no shifts, or every shift fully
/// covered by breaks); holidays are a finite set and cannot cause that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCalendar {
    weekdays: Vec<Weekday>,
    shifts: Vec<ClockWindow>,
    breaks: Vec<ClockWindow>,
    holidays: BTreeSet<NaiveDate>,
}

impl WorkCalendar {
    /// Creates a calendar from working weekdays and shift windows.
    pub fn new(
        weekdays: impl IntoIterator<Item = Weekday>,
        shifts: Vec<ClockWindow>,
    ) -> Result<Self, ScheduleError> {
        let cal = Self {
            weekdays: weekdays.into_iter().collect(),
            shifts,
            breaks: Vec::new(),
            holidays: BTreeSet::new(),
        };
        cal.ensure_working_time()?;
        Ok(cal)
    }

    /// Convenience: Monday through Friday, one shift, no breaks.
    pub fn five_day(shift_start: NaiveTime, shift_end: NaiveTime) -> Result<Self, ScheduleError> {
        Self::new(
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            vec![ClockWindow::new(shift_start, shift_end)],
        )
    }

    /// Adds a break interval.
    ///
    /// Fails when the added break leaves no working minute in any shift.
    pub fn with_break(mut self, start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        self.breaks.push(ClockWindow::new(start, end));
        self.ensure_working_time()?;
        Ok(self)
    }

    /// Adds a holiday date.
    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    /// Adds several holiday dates.
    pub fn with_holidays(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(dates);
        self
    }

    /// Whether a date is a working day (working weekday, not a holiday).
    pub fn is_working_date(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// Whether a timestamp is working time: on a working date, inside a
    /// shift window, and outside every break interval.
    pub fn is_working(&self, t: NaiveDateTime) -> bool {
        self.working_at(t, false)
    }

    /// The earliest working instant at or after `from`.
    pub fn next_working_instant(&self, from: NaiveDateTime) -> NaiveDateTime {
        self.next_working_from(from, false)
    }

    /// Advances `start` by `minutes` of working time, skipping breaks,
    /// off-shift hours, non-working weekdays, and holidays.
    ///
    /// A non-positive duration returns `start` unchanged, even on
    /// non-working time. A positive duration starting on non-working time
    /// first snaps to the next working instant, then consumes.
    pub fn advance(&self, start: NaiveDateTime, minutes: i64) -> NaiveDateTime {
        self.advance_mode(start, minutes, false)
    }

    /// Like [`advance`](Self::advance), but break intervals count as
    /// working time. Used for process steps that keep running through
    /// breaks (cures, quenches); shift ends and non-working days still
    /// pause the clock.
    pub fn advance_through_breaks(&self, start: NaiveDateTime, minutes: i64) -> NaiveDateTime {
        self.advance_mode(start, minutes, true)
    }

    /// Sum of working minutes within [from, to).
    pub fn working_minutes_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        if to <= from {
            return 0;
        }
        let mut total = 0i64;
        let mut t = self.next_working_from(from, false);
        while t < to {
            let boundary = match self.next_boundary(t) {
                Some(b) => b,
                None => break,
            };
            let segment_end = boundary.min(to);
            total += (segment_end - t).num_minutes();
            if boundary >= to {
                break;
            }
            t = self.next_working_from(boundary, false);
        }
        total
    }

    pub(crate) fn working_at(&self, t: NaiveDateTime, through_breaks: bool) -> bool {
        self.in_shift(t) && (through_breaks || !self.in_break(t.time()))
    }

    pub(crate) fn next_working_from(
        &self,
        from: NaiveDateTime,
        through_breaks: bool,
    ) -> NaiveDateTime {
        if self.working_at(from, through_breaks) {
            return from;
        }
        // Shift patterns recur weekly and holidays are finite, so a working
        // instant exists within one weekday cycle past the last holiday.
        let mut limit = from.date();
        if let Some(last_holiday) = self.holidays.iter().next_back() {
            limit = limit.max(*last_holiday);
        }
        let limit = match limit.checked_add_days(Days::new(9)) {
            Some(d) => d,
            None => return from,
        };

        let mut t = from;
        while t.date() <= limit {
            match self.next_boundary(t) {
                Some(b) => {
                    if self.working_at(b, through_breaks) {
                        return b;
                    }
                    t = b;
                }
                None => break,
            }
        }
        // Guarded by construction: ensure_working_time holds.
        from
    }

    pub(crate) fn advance_mode(
        &self,
        start: NaiveDateTime,
        minutes: i64,
        through_breaks: bool,
    ) -> NaiveDateTime {
        if minutes <= 0 {
            return start;
        }
        let mut t = self.next_working_from(start, through_breaks);
        let mut remaining = minutes;
        loop {
            // Working state is constant between consecutive boundaries, so
            // [t, boundary) is entirely consumable.
            let boundary = match self.next_boundary(t) {
                Some(b) => b,
                None => return t + Duration::minutes(remaining),
            };
            let span = (boundary - t).num_minutes();
            if span >= remaining {
                return t + Duration::minutes(remaining);
            }
            remaining -= span;
            t = self.next_working_from(boundary, through_breaks);
        }
    }

    /// Shift-context test, ignoring breaks. Handles overnight spillover.
    fn in_shift(&self, t: NaiveDateTime) -> bool {
        let time = t.time();
        if self.is_working_date(t.date()) {
            for s in &self.shifts {
                let hit = if s.crosses_midnight() {
                    time >= s.start
                } else {
                    time >= s.start && time < s.end
                };
                if hit {
                    return true;
                }
            }
        }
        if let Some(prev) = t.date().pred_opt() {
            if self.is_working_date(prev) {
                for s in &self.shifts {
                    if s.crosses_midnight() && time < s.end {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn in_break(&self, time: NaiveTime) -> bool {
        self.breaks.iter().any(|b| b.contains(time))
    }

    /// Earliest shift/break/midnight edge strictly after `t`. Boundaries
    /// recur daily, so the result is always within the next day.
    fn next_boundary(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut best: Option<NaiveDateTime> = None;
        let mut consider = |candidate: NaiveDateTime| {
            if candidate > t && best.map_or(true, |b| candidate < b) {
                best = Some(candidate);
            }
        };

        for offset in 0..2u64 {
            let date = t.date().checked_add_days(Days::new(offset))?;
            for w in self.shifts.iter().chain(self.breaks.iter()) {
                consider(date.and_time(w.start));
                if w.crosses_midnight() {
                    if let Some(next) = date.checked_add_days(Days::new(1)) {
                        consider(next.and_time(w.end));
                    }
                } else {
                    consider(date.and_time(w.end));
                }
            }
            if let Some(next) = date.checked_add_days(Days::new(1)) {
                consider(next.and_time(NaiveTime::MIN));
            }
        }
        best
    }

    /// Rejects configurations with no working time: empty weekday set,
    /// empty shift list, or breaks covering every shift minute.
    fn ensure_working_time(&self) -> Result<(), ScheduleError> {
        if self.weekdays.is_empty() || self.shifts.is_empty() {
            return Err(ScheduleError::NoWorkingTime);
        }
        // Project windows onto a two-day minute axis; breaks are merged
        // before subtraction so overlapping breaks are not double-counted.
        let mut break_segments: Vec<(i64, i64)> = Vec::new();
        for b in &self.breaks {
            let start = minute_of_day(b.start);
            let end = minute_of_day(b.end);
            if b.crosses_midnight() {
                break_segments.push((start, 1440));
                break_segments.push((0, end));
            } else {
                break_segments.push((start, end));
            }
        }
        // Duplicate one day later to catch overlap with shift spillover.
        let shifted: Vec<(i64, i64)> = break_segments
            .iter()
            .map(|&(s, e)| (s + 1440, e + 1440))
            .collect();
        break_segments.extend(shifted);
        break_segments.sort_unstable();
        let merged = merge_segments(&break_segments);

        for shift in &self.shifts {
            let start = minute_of_day(shift.start);
            let end = if shift.crosses_midnight() {
                minute_of_day(shift.end) + 1440
            } else {
                minute_of_day(shift.end)
            };
            if end <= start {
                continue;
            }
            let covered: i64 = merged
                .iter()
                .map(|&(bs, be)| (be.min(end) - bs.max(start)).max(0))
                .sum();
            if end - start - covered > 0 {
                return Ok(());
            }
        }
        Err(ScheduleError::NoWorkingTime)
    }
}

/// Merges sorted, possibly overlapping segments.
fn merge_segments(sorted: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut merged: Vec<(i64, i64)> = Vec::new();
    for &(start, end) in sorted {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        // January 2024: the 1st is a Monday.
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        d(day).and_time(t(h, m))
    }

    /// Mon-Fri 08:00-16:00, break 12:00-12:30.
    fn day_shift_cal() -> WorkCalendar {
        WorkCalendar::five_day(t(8, 0), t(16, 0))
            .unwrap()
            .with_break(t(12, 0), t(12, 30))
            .unwrap()
    }

    /// Mon-Thu, day shift 05:00-15:00 and overnight shift 17:00-05:00.
    fn two_shift_cal() -> WorkCalendar {
        WorkCalendar::new(
            [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
            vec![
                ClockWindow::new(t(5, 0), t(15, 0)),
                ClockWindow::new(t(17, 0), t(5, 0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_clock_window() {
        let w = ClockWindow::new(t(8, 0), t(16, 0));
        assert!(w.contains(t(8, 0)));
        assert!(w.contains(t(15, 59)));
        assert!(!w.contains(t(16, 0))); // exclusive end
        assert!(!w.contains(t(7, 59)));
        assert_eq!(w.length_minutes(), 480);
        assert!(!w.crosses_midnight());
    }

    #[test]
    fn test_clock_window_overnight() {
        let w = ClockWindow::new(t(17, 0), t(5, 0));
        assert!(w.crosses_midnight());
        assert!(w.contains(t(17, 0)));
        assert!(w.contains(t(23, 30)));
        assert!(w.contains(t(3, 0)));
        assert!(!w.contains(t(5, 0)));
        assert!(!w.contains(t(12, 0)));
        assert_eq!(w.length_minutes(), 720);
    }

    #[test]
    fn test_rejects_empty_configs() {
        let none: Vec<Weekday> = Vec::new();
        let err = WorkCalendar::new(none, vec![ClockWindow::new(t(8, 0), t(16, 0))]);
        assert_eq!(err.unwrap_err(), ScheduleError::NoWorkingTime);

        let err = WorkCalendar::new([Weekday::Mon], Vec::new());
        assert_eq!(err.unwrap_err(), ScheduleError::NoWorkingTime);
    }

    #[test]
    fn test_rejects_fully_covered_shift() {
        let err = WorkCalendar::new(
            [Weekday::Mon],
            vec![ClockWindow::new(t(8, 0), t(10, 0))],
        )
        .unwrap()
        .with_break(t(7, 0), t(11, 0));
        assert_eq!(err.unwrap_err(), ScheduleError::NoWorkingTime);
    }

    #[test]
    fn test_is_working_basic() {
        let cal = day_shift_cal();
        assert!(cal.is_working(dt(1, 8, 0))); // Monday shift start
        assert!(cal.is_working(dt(1, 15, 59)));
        assert!(!cal.is_working(dt(1, 16, 0))); // shift end, exclusive
        assert!(!cal.is_working(dt(1, 7, 59)));
        assert!(!cal.is_working(dt(1, 12, 15))); // break
        assert!(!cal.is_working(dt(6, 10, 0))); // Saturday
        assert!(!cal.is_working(dt(7, 10, 0))); // Sunday
    }

    #[test]
    fn test_holiday_not_working() {
        let cal = day_shift_cal().with_holiday(d(2)); // Tuesday off
        assert!(cal.is_working(dt(1, 10, 0)));
        assert!(!cal.is_working(dt(2, 10, 0)));
        assert!(cal.is_working(dt(3, 10, 0)));
    }

    #[test]
    fn test_overnight_spillover_attribution() {
        let cal = two_shift_cal();
        // Thursday night shift runs into Friday morning.
        assert!(cal.is_working(dt(4, 23, 0)));
        assert!(cal.is_working(dt(5, 3, 0))); // Friday 03:00, Thursday's shift
        assert!(!cal.is_working(dt(5, 5, 0))); // Friday day shift does not exist
        assert!(!cal.is_working(dt(5, 18, 0))); // no Friday night shift
        assert!(!cal.is_working(dt(6, 3, 0))); // Saturday 03:00, Friday not working
    }

    #[test]
    fn test_next_working_instant() {
        let cal = day_shift_cal();
        assert_eq!(cal.next_working_instant(dt(1, 10, 0)), dt(1, 10, 0));
        assert_eq!(cal.next_working_instant(dt(1, 6, 0)), dt(1, 8, 0));
        assert_eq!(cal.next_working_instant(dt(1, 12, 10)), dt(1, 12, 30));
        // Saturday rolls to Monday the 8th.
        assert_eq!(cal.next_working_instant(dt(6, 10, 0)), dt(8, 8, 0));
    }

    #[test]
    fn test_advance_zero_returns_input() {
        let cal = day_shift_cal();
        // Unchanged even on non-working time.
        assert_eq!(cal.advance(dt(6, 10, 0), 0), dt(6, 10, 0));
        assert_eq!(cal.advance(dt(1, 10, 0), 0), dt(1, 10, 0));
    }

    #[test]
    fn test_advance_within_shift() {
        let cal = day_shift_cal();
        assert_eq!(cal.advance(dt(1, 8, 0), 90), dt(1, 9, 30));
    }

    #[test]
    fn test_advance_skips_break() {
        let cal = day_shift_cal();
        // 60 min before the break, 60 after it.
        assert_eq!(cal.advance(dt(1, 11, 0), 120), dt(1, 13, 30));
    }

    #[test]
    fn test_advance_through_breaks() {
        let cal = day_shift_cal();
        assert_eq!(cal.advance_through_breaks(dt(1, 11, 0), 120), dt(1, 13, 0));
        // Shift end still pauses: 4h from 14:00 is 2h Monday + 2h Tuesday.
        assert_eq!(cal.advance_through_breaks(dt(1, 14, 0), 240), dt(2, 10, 0));
    }

    #[test]
    fn test_advance_rolls_to_next_day() {
        let cal = day_shift_cal();
        // 60 min left on Monday, 60 consumed Tuesday morning.
        assert_eq!(cal.advance(dt(1, 15, 0), 120), dt(2, 9, 0));
    }

    #[test]
    fn test_advance_from_nonworking_snaps_first() {
        let cal = day_shift_cal();
        assert_eq!(cal.advance(dt(6, 10, 0), 60), dt(8, 9, 0));
    }

    #[test]
    fn test_advance_over_weekend() {
        let cal = day_shift_cal();
        // Friday the 5th 15:00 + 120 min → Monday the 8th 09:00.
        assert_eq!(cal.advance(dt(5, 15, 0), 120), dt(8, 9, 0));
    }

    #[test]
    fn test_advance_over_holiday_pushes_by_one_day() {
        let plain = day_shift_cal();
        let with_holiday = day_shift_cal().with_holiday(d(2));
        let base = plain.advance(dt(1, 15, 0), 120);
        let pushed = with_holiday.advance(dt(1, 15, 0), 120);
        assert_eq!(base, dt(2, 9, 0));
        assert_eq!(pushed, dt(3, 9, 0));
        // Identical working duration, shifted by exactly the holiday.
        assert_eq!(pushed - base, Duration::days(1));
    }

    #[test]
    fn test_advance_overnight_shift() {
        let cal = two_shift_cal();
        // Monday 14:00: 60 min to 15:00, gap to 17:00, then 120 more.
        assert_eq!(cal.advance(dt(1, 14, 0), 180), dt(1, 19, 0));
        // Into the small hours: Monday 23:00 + 240 min → Tuesday 03:00.
        assert_eq!(cal.advance(dt(1, 23, 0), 240), dt(2, 3, 0));
    }

    #[test]
    fn test_advance_result_lands_on_working_minute() {
        let cal = two_shift_cal();
        let end = cal.advance(dt(1, 5, 0), 595);
        assert!(cal.is_working(end - Duration::minutes(1)));
    }

    #[test]
    fn test_working_minutes_between() {
        let cal = day_shift_cal();
        // One full day: 480 shift minutes minus 30 break.
        assert_eq!(cal.working_minutes_between(dt(1, 0, 0), dt(2, 0, 0)), 450);
        // Five-day week.
        assert_eq!(cal.working_minutes_between(dt(1, 0, 0), dt(8, 0, 0)), 2250);
        // Partial window clipped at both ends.
        assert_eq!(
            cal.working_minutes_between(dt(1, 11, 30), dt(1, 13, 0)),
            60
        );
        assert_eq!(cal.working_minutes_between(dt(1, 10, 0), dt(1, 10, 0)), 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let cal = day_shift_cal().with_holiday(d(2));
        let json = serde_json::to_string(&cal).unwrap();
        let back: WorkCalendar = serde_json::from_str(&json).unwrap();
        assert!(!back.is_working(dt(2, 10, 0)));
        assert_eq!(back.advance(dt(1, 11, 0), 120), cal.advance(dt(1, 11, 0), 120));
    }
}
