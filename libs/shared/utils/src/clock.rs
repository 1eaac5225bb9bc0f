use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Utc};

/// Source of "now" for business rules. Appointment dates and times are clinic-local,
/// so rules compare against `local_now()`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&self.offset()).naive_local()
    }

    /// Converts a clinic-local wall-clock instant to UTC.
    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(self.offset().local_minus_utc() as i64)).and_utc()
    }
}

fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| {
        tracing::warn!("UTC offset of {} minutes is out of range, using UTC", minutes);
        Utc.fix()
    })
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset_minutes: i32) -> Self {
        Self { offset: offset_from_minutes(offset_minutes) }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset_minutes: i32) -> Self {
        Self { now: RwLock::new(now), offset: offset_from_minutes(offset_minutes) }
    }

    /// Builds a clock whose clinic-local time is `local`.
    pub fn at_local(local: NaiveDateTime, offset_minutes: i32) -> Self {
        let utc = (local - Duration::minutes(offset_minutes as i64)).and_utc();
        Self::new(utc, offset_minutes)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn set_local(&self, local: NaiveDateTime) {
        self.set(self.to_utc(local));
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|guard| *guard).unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
