//! Wall-clock access, injectable so day boundaries can be tested.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Local calendar date as `YYYY-MM-DD`.
    fn today(&self) -> String {
        self.now().format("%Y-%m-%d").to_string()
    }

    /// Epoch millis of local midnight at the start of today.
    fn start_of_today_millis(&self) -> i64 {
        local_midnight(self.now().date_naive())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| self.now_millis().div_euclid(86_400_000) * 86_400_000)
    }
}

/// First instant of `date` in local time. DST gaps at midnight resolve to
/// the earliest valid instant.
pub fn local_midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// Time until the next local midnight.
pub fn until_next_midnight(now: DateTime<Local>) -> std::time::Duration {
    let tomorrow = now.date_naive().succ_opt().and_then(local_midnight);
    match tomorrow {
        Some(next) => (next - now).to_std().unwrap_or_default(),
        None => std::time::Duration::from_secs(24 * 60 * 60),
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for tests and replays.
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Clock at `hour:00` local time on the given date.
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
        let now = Local.from_local_datetime(&naive).earliest()?;
        Some(Self::new(now))
    }

    pub fn set(&self, now: DateTime<Local>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
