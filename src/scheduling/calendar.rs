use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

/// Opening hours for a single weekday as configured per shop.
#[derive(Debug, Clone)]
pub struct DayHours {
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
    pub is_closed: bool,
}

/// The shop's open interval on a concrete date, in shop-local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayWindow {
    Open { start: NaiveTime, end: NaiveTime },
    Closed { reason: Option<String> },
}

impl DayWindow {
    pub fn is_open(&self) -> bool {
        matches!(self, DayWindow::Open { .. })
    }
}

/// A shop's calendar: timezone, weekly hours and special closing days.
///
/// Built from store rows by the service layer; every query on it is pure.
/// Weekdays are keyed 0..=6 with 0 = Monday.
#[derive(Debug, Clone)]
pub struct ShopCalendar {
    tz: Tz,
    hours: HashMap<u8, DayHours>,
    closings: HashMap<NaiveDate, Option<String>>,
}

impl ShopCalendar {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            hours: HashMap::new(),
            closings: HashMap::new(),
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn set_hours(&mut self, weekday: u8, hours: DayHours) {
        self.hours.insert(weekday, hours);
    }

    pub fn add_closing(&mut self, date: NaiveDate, reason: Option<String>) {
        self.closings.insert(date, reason);
    }

    /// Resolve the open interval for `date`. A special closing day overrides
    /// the weekly hours; a missing or closed weekday row means closed, and so
    /// does a degenerate interval (`opening >= closing`). Windows never span
    /// midnight.
    pub fn open_interval(&self, date: NaiveDate) -> DayWindow {
        if let Some(reason) = self.closings.get(&date) {
            return DayWindow::Closed {
                reason: reason.clone(),
            };
        }

        let weekday = date.weekday().num_days_from_monday() as u8;
        match self.hours.get(&weekday) {
            Some(hours) if !hours.is_closed => match (hours.opening_time, hours.closing_time) {
                (Some(start), Some(end)) if start < end => DayWindow::Open { start, end },
                _ => DayWindow::Closed { reason: None },
            },
            _ => DayWindow::Closed { reason: None },
        }
    }

    /// Shop-local date and wall-clock time for a UTC instant.
    pub fn local_now(&self, now: DateTime<Utc>) -> (NaiveDate, NaiveTime) {
        let local = now.with_timezone(&self.tz).naive_local();
        (local.date(), local.time())
    }

    /// The UTC instant of a shop-local (date, time) pair. Ambiguous local
    /// times around DST transitions resolve to the earlier instant.
    pub fn instant(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        date.and_time(time)
            .and_local_timezone(self.tz)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday_shop() -> ShopCalendar {
        let mut cal = ShopCalendar::new(chrono_tz::Asia::Kolkata);
        cal.set_hours(
            0,
            DayHours {
                opening_time: Some(t(9, 0)),
                closing_time: Some(t(12, 0)),
                is_closed: false,
            },
        );
        cal
    }

    #[test]
    fn open_on_configured_weekday() {
        let cal = monday_shop();
        // 2025-03-17 is a Monday
        let date = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        assert_eq!(
            cal.open_interval(date),
            DayWindow::Open {
                start: t(9, 0),
                end: t(12, 0)
            }
        );
    }

    #[test]
    fn closed_without_weekday_row() {
        let cal = monday_shop();
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        assert!(!cal.open_interval(tuesday).is_open());
    }

    #[test]
    fn special_closing_overrides_hours() {
        let mut cal = monday_shop();
        let date = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        cal.add_closing(date, Some("holiday".into()));
        assert_eq!(
            cal.open_interval(date),
            DayWindow::Closed {
                reason: Some("holiday".into())
            }
        );
    }

    #[test]
    fn degenerate_interval_is_closed() {
        let mut cal = ShopCalendar::new(chrono_tz::UTC);
        cal.set_hours(
            0,
            DayHours {
                opening_time: Some(t(9, 0)),
                closing_time: Some(t(9, 0)),
                is_closed: false,
            },
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        assert!(!cal.open_interval(date).is_open());
    }

    #[test]
    fn closed_flag_wins_over_times() {
        let mut cal = ShopCalendar::new(chrono_tz::UTC);
        cal.set_hours(
            0,
            DayHours {
                opening_time: Some(t(9, 0)),
                closing_time: Some(t(17, 0)),
                is_closed: true,
            },
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        assert!(!cal.open_interval(date).is_open());
    }

    #[test]
    fn local_now_uses_shop_timezone() {
        let cal = monday_shop();
        let utc = DateTime::parse_from_rfc3339("2025-03-17T04:20:00Z")
            .unwrap()
            .with_timezone(&Utc);
        // 04:20 UTC is 09:50 IST
        let (date, time) = cal.local_now(utc);
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 17).unwrap());
        assert_eq!(time, t(9, 50));
    }
}
