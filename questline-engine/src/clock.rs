//! Date source for the day-boundary state machine.
//!
//! Everything in the reset engine is date-driven, so the clock is injected
//! rather than read from ambient global state. Production wires
//! [`SystemClock`]; tests and the CLI `--today` override wire [`FixedClock`].

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Provider of the current calendar day and instant.
pub trait Clock {
    /// Current local calendar day.
    fn today(&self) -> NaiveDate;

    /// Current instant, used for completion and prestige timestamps.
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall-clock provider using the host's local timezone for day boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock pinned to a single day; can be advanced manually.
#[derive(Debug, Clone)]
pub struct FixedClock {
    today: Cell<NaiveDate>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(today: NaiveDate) -> Self {
        Self {
            today: Cell::new(today),
        }
    }

    /// Move the pinned day to `date`.
    pub fn set(&self, date: NaiveDate) {
        self.today.set(date);
    }

    /// Advance the pinned day by `days`, saturating at the calendar maximum.
    pub fn advance_days(&self, days: u64) {
        let current = self.today.get();
        let next = current.checked_add_days(Days::new(days)).unwrap_or(current);
        self.today.set(next);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today.get()
    }

    fn now(&self) -> DateTime<Utc> {
        self.today.get().and_time(NaiveTime::MIN).and_utc()
    }
}

/// The calendar day before `date`, or `date` itself at the calendar minimum.
#[must_use]
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fixed_clock_advances_across_month_boundary() {
        let clock = FixedClock::new(day(2024, 1, 31));
        assert_eq!(clock.today(), day(2024, 1, 31));
        clock.advance_days(1);
        assert_eq!(clock.today(), day(2024, 2, 1));
        assert_eq!(clock.now().date_naive(), day(2024, 2, 1));
    }

    #[test]
    fn borrowed_clock_delegates() {
        fn read<C: Clock>(clock: C) -> NaiveDate {
            clock.today()
        }

        let clock = FixedClock::new(day(2024, 3, 10));
        assert_eq!(read(&clock), day(2024, 3, 10));
        assert_eq!(read(Rc::new(clock)), day(2024, 3, 10));
        assert_eq!(previous_day(day(2024, 3, 1)), day(2024, 2, 29));
    }
}
