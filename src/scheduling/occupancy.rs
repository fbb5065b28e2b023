use chrono::NaiveTime;

use super::grid::{minute_of_day, slots_required};

/// Which slots of a (shop, date) are already taken.
///
/// Built from the shop's non-terminal bookings for the date. Footprints are
/// grid slots, not raw minutes: every booking's duration is rounded up to
/// whole slots, so a 45-minute job on a 30-minute grid blocks 60 minutes.
/// Stored as a sorted list of half-open minute intervals.
#[derive(Debug, Clone)]
pub struct OccupancyIndex {
    slot_minutes: i64,
    intervals: Vec<(i64, i64)>,
}

impl OccupancyIndex {
    /// `bookings` are (start, total_duration_minutes) pairs.
    pub fn new(
        slot_minutes: i64,
        bookings: impl IntoIterator<Item = (NaiveTime, i64)>,
    ) -> Self {
        let mut intervals: Vec<(i64, i64)> = bookings
            .into_iter()
            .map(|(start, duration)| {
                let start_min = minute_of_day(start);
                let footprint = slots_required(duration, slot_minutes) * slot_minutes;
                (start_min, start_min + footprint)
            })
            .collect();
        intervals.sort_unstable();
        Self {
            slot_minutes,
            intervals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Is the single slot starting at `slot_start` taken?
    pub fn is_occupied(&self, slot_start: NaiveTime) -> bool {
        self.overlaps(slot_start, self.slot_minutes)
    }

    /// True iff the grid footprint of a job `[start, start + ceil(d/slot)*slot)`
    /// shares any minute with an existing booking footprint.
    pub fn overlaps(&self, start: NaiveTime, duration_minutes: i64) -> bool {
        let start_min = minute_of_day(start);
        let end_min =
            start_min + slots_required(duration_minutes, self.slot_minutes) * self.slot_minutes;

        // First interval that ends after our start; intervals are sorted, so
        // only that one can intersect the candidate range first.
        let idx = self.intervals.partition_point(|&(_, e)| e <= start_min);
        self.intervals
            .get(idx)
            .is_some_and(|&(s, _)| s < end_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn empty_index_never_overlaps() {
        let idx = OccupancyIndex::new(30, []);
        assert!(!idx.overlaps(t(9, 0), 30));
        assert!(!idx.is_occupied(t(9, 0)));
    }

    #[test]
    fn exact_slot_collision() {
        let idx = OccupancyIndex::new(30, [(t(10, 0), 30)]);
        assert!(idx.is_occupied(t(10, 0)));
        assert!(!idx.is_occupied(t(9, 30)));
        assert!(!idx.is_occupied(t(10, 30)));
    }

    #[test]
    fn partial_hour_booking_blocks_whole_slots() {
        // 45 minutes on a 30-minute grid occupies 10:00..11:00
        let idx = OccupancyIndex::new(30, [(t(10, 0), 45)]);
        assert!(idx.is_occupied(t(10, 0)));
        assert!(idx.is_occupied(t(10, 30)));
        assert!(!idx.is_occupied(t(11, 0)));
    }

    #[test]
    fn multi_slot_candidate_overlaps_tail() {
        let idx = OccupancyIndex::new(30, [(t(11, 0), 30)]);
        // 75-minute job from 10:00 rounds to 10:00..11:30 and hits 11:00
        assert!(idx.overlaps(t(10, 0), 75));
        assert!(!idx.overlaps(t(10, 0), 45));
    }

    #[test]
    fn abutting_footprints_do_not_overlap() {
        let idx = OccupancyIndex::new(30, [(t(9, 0), 60)]);
        assert!(!idx.overlaps(t(10, 0), 60));
        assert!(idx.overlaps(t(9, 30), 30));
    }

    #[test]
    fn candidate_spanning_multiple_bookings() {
        let idx = OccupancyIndex::new(30, [(t(9, 0), 30), (t(11, 0), 30)]);
        assert!(idx.overlaps(t(8, 30), 180));
        assert!(!idx.overlaps(t(9, 30), 90));
        assert!(idx.overlaps(t(9, 30), 120));
    }
}
