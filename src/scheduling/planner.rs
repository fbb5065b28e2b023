use chrono::NaiveTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::calendar::DayWindow;
use super::grid::{minute_of_day, slot_starts, slots_required, time_from_minutes};
use super::occupancy::OccupancyIndex;

/// Minimum lead before a slot still counts as bookable today.
pub const GRACE_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotUnavailableReason {
    Past,
    Conflict,
}

/// One candidate start on the day's grid.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotAvailability {
    /// Slot start, shop-local.
    #[serde(with = "crate::models::hhmm")]
    #[schema(value_type = String, example = "10:00")]
    pub start: NaiveTime,
    /// End of the grid footprint (duration rounded up to whole slots).
    #[serde(with = "crate::models::hhmm")]
    #[schema(value_type = String, example = "11:30")]
    pub end: NaiveTime,
    /// True end of the requested services, unrounded.
    #[serde(with = "crate::models::hhmm")]
    #[schema(value_type = String, example = "11:15")]
    pub service_end: NaiveTime,
    pub available: bool,
    pub is_past: bool,
    pub reason: Option<SlotUnavailableReason>,
}

/// Enumerate the day's grid and classify every start for a job of
/// `total_duration_minutes`.
///
/// `now_local` is the shop-local wall-clock time when the queried date is
/// today, `None` otherwise. Candidates whose footprint would run past closing
/// are dropped entirely; the rest are returned with availability flags so
/// callers can render disabled slots. Pure given its inputs.
pub fn available_starts(
    window: &DayWindow,
    slot_minutes: i64,
    total_duration_minutes: i64,
    occupancy: &OccupancyIndex,
    now_local: Option<NaiveTime>,
) -> Vec<SlotAvailability> {
    let (start, end) = match window {
        DayWindow::Open { start, end } => (*start, *end),
        DayWindow::Closed { .. } => return Vec::new(),
    };
    if total_duration_minutes < 1 || slot_minutes < 1 {
        return Vec::new();
    }

    let end_min = minute_of_day(end);
    let footprint = slots_required(total_duration_minutes, slot_minutes) * slot_minutes;
    let past_threshold = now_local.map(|now| minute_of_day(now) + GRACE_MINUTES);

    let mut out = Vec::new();
    for slot in slot_starts(start, end, slot_minutes) {
        let slot_min = minute_of_day(slot);
        if slot_min + footprint > end_min {
            // job cannot finish before closing, never bookable
            continue;
        }

        let is_past = past_threshold.is_some_and(|threshold| slot_min <= threshold);
        let (available, reason) = if is_past {
            (false, Some(SlotUnavailableReason::Past))
        } else if occupancy.overlaps(slot, total_duration_minutes) {
            (false, Some(SlotUnavailableReason::Conflict))
        } else {
            (true, None)
        };

        out.push(SlotAvailability {
            start: slot,
            end: time_from_minutes(slot_min + footprint),
            service_end: time_from_minutes(slot_min + total_duration_minutes),
            available,
            is_past,
            reason,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn open_9_to_12() -> DayWindow {
        DayWindow::Open {
            start: t(9, 0),
            end: t(12, 0),
        }
    }

    #[test]
    fn closed_day_yields_nothing() {
        let occ = OccupancyIndex::new(30, []);
        let window = DayWindow::Closed { reason: None };
        assert!(available_starts(&window, 30, 30, &occ, None).is_empty());
    }

    #[test]
    fn all_slots_open_on_empty_day() {
        let occ = OccupancyIndex::new(30, []);
        let slots = available_starts(&open_9_to_12(), 30, 30, &occ, None);
        assert_eq!(slots.len(), 6);
        assert!(slots.iter().all(|s| s.available && !s.is_past));
        assert_eq!(slots[0].start, t(9, 0));
        assert_eq!(slots[0].end, t(9, 30));
        assert_eq!(slots[0].service_end, t(9, 30));
    }

    #[test]
    fn partial_hour_job_reports_true_service_end() {
        let occ = OccupancyIndex::new(30, []);
        let slots = available_starts(&open_9_to_12(), 30, 45, &occ, None);
        let first = &slots[0];
        assert_eq!(first.end, t(10, 0));
        assert_eq!(first.service_end, t(9, 45));
    }

    // Spec scenario: services of 30m + 45m (75m total, 3 slots) booked at
    // 10:00 leave 09:00 as the only bookable start of a 09:00-12:00 Monday.
    #[test]
    fn multi_service_booking_blocks_surrounding_starts() {
        let occ = OccupancyIndex::new(30, [(t(10, 0), 75)]);
        let slots = available_starts(&open_9_to_12(), 30, 75, &occ, None);

        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();
        // the 10:30 footprint ends exactly at closing and stays on the grid
        // as a conflict; 11:00 and 11:30 would run past closing and are dropped
        assert_eq!(starts, vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30)]);

        let available: Vec<NaiveTime> = slots
            .iter()
            .filter(|s| s.available)
            .map(|s| s.start)
            .collect();
        assert_eq!(available, vec![t(9, 0)]);

        for s in slots.iter().filter(|s| !s.available) {
            assert_eq!(s.reason, Some(SlotUnavailableReason::Conflict));
        }
    }

    // Spec scenario: at 09:50 local with a 15-minute grace, 09:00, 09:30 and
    // 10:00 are past (threshold 10:05); 10:30 is the first bookable start.
    #[test]
    fn grace_window_marks_leading_slots_past() {
        let occ = OccupancyIndex::new(30, []);
        let slots = available_starts(&open_9_to_12(), 30, 30, &occ, Some(t(9, 50)));

        let past: Vec<NaiveTime> = slots
            .iter()
            .filter(|s| s.is_past)
            .map(|s| s.start)
            .collect();
        assert_eq!(past, vec![t(9, 0), t(9, 30), t(10, 0)]);

        let first_open = slots.iter().find(|s| s.available).unwrap();
        assert_eq!(first_open.start, t(10, 30));
        assert!(
            slots
                .iter()
                .filter(|s| s.is_past)
                .all(|s| s.reason == Some(SlotUnavailableReason::Past))
        );
    }

    #[test]
    fn now_on_other_dates_is_ignored() {
        let occ = OccupancyIndex::new(30, []);
        let slots = available_starts(&open_9_to_12(), 30, 30, &occ, None);
        assert!(slots.iter().all(|s| !s.is_past));
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let occ = OccupancyIndex::new(30, [(t(9, 30), 45)]);
        let a = available_starts(&open_9_to_12(), 30, 45, &occ, Some(t(8, 0)));
        let b = available_starts(&open_9_to_12(), 30, 45, &occ, Some(t(8, 0)));
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.start, y.start);
            assert_eq!(x.available, y.available);
            assert_eq!(x.reason, y.reason);
        }
    }
}
