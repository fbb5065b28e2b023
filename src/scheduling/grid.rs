use chrono::{NaiveTime, Timelike};

/// Minutes since midnight for a wall-clock time. Seconds are ignored; the
/// grid works in whole minutes.
pub fn minute_of_day(time: NaiveTime) -> i64 {
    (time.hour() * 60 + time.minute()) as i64
}

pub fn time_from_minutes(minutes: i64) -> NaiveTime {
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
        .unwrap_or(NaiveTime::MIN)
}

/// How many grid slots a job of `duration_minutes` occupies. Both arguments
/// are positive by the time they get here.
pub fn slots_required(duration_minutes: i64, slot_minutes: i64) -> i64 {
    (duration_minutes + slot_minutes - 1) / slot_minutes
}

/// Enumerate slot starts for an open interval: `s0 = start`,
/// `s(i) = s0 + i * slot_minutes` while the slot still fits before `end`.
/// Strictly increasing and finite.
pub fn slot_starts(start: NaiveTime, end: NaiveTime, slot_minutes: i64) -> Vec<NaiveTime> {
    if slot_minutes < 1 {
        return Vec::new();
    }
    let start_min = minute_of_day(start);
    let end_min = minute_of_day(end);

    let mut starts = Vec::new();
    let mut cursor = start_min;
    while cursor + slot_minutes <= end_min {
        starts.push(time_from_minutes(cursor));
        cursor += slot_minutes;
    }
    starts
}
