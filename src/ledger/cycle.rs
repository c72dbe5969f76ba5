use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::models::Account;

/// key: ledger-cycle -> calendar month window, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Cycle {
    /// The calendar month starting at `start`, which must be the first instant of a month.
    fn starting_at(start: DateTime<Utc>) -> Self {
        let next_start = start + Months::new(1);
        Self {
            start,
            end: next_start - Duration::nanoseconds(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn previous(&self) -> Self {
        Self::starting_at(self.start - Months::new(1))
    }

    pub fn next(&self) -> Self {
        Self::starting_at(self.start + Months::new(1))
    }
}

pub fn current_cycle(now: DateTime<Utc>) -> Cycle {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first day of a calendar month is a valid UTC instant");
    Cycle::starting_at(start)
}

pub fn previous_cycle(now: DateTime<Utc>) -> Cycle {
    current_cycle(now).previous()
}

pub fn next_cycle(now: DateTime<Utc>) -> Cycle {
    current_cycle(now).next()
}

/// True when the account existed before the previous cycle began, which makes it eligible for
/// rollover into the current cycle.
pub fn had_prior_cycle(account: &Account, now: DateTime<Utc>) -> bool {
    account.created_at < previous_cycle(now).start
}
