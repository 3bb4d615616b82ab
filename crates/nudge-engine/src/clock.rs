//! Time source abstraction and local-time helpers.
//!
//! The engine never reads the system clock directly. Everything goes through
//! [`Clock`] so timing logic can be driven by a [`ManualClock`] in tests.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};

/// Source of "now" and of the user's local UTC offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn local_offset(&self) -> FixedOffset;
}

/// Wall clock of the host, in the host's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    /// A manual clock whose local time is UTC.
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn local_offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Convert a local wall-clock reading into UTC.
pub fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Midnight of the local day containing `at`, expressed in UTC.
pub fn start_of_local_day(at: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let local_date = at.with_timezone(&offset).date_naive();
    local_to_utc(local_date.and_hms_opt(0, 0, 0)?, offset)
}
