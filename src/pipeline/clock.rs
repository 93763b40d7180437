use chrono::{Local, NaiveDateTime};
use std::time::{Duration, Instant};

/// Time source for attendance stamps, polling deadlines and sampling delays.
pub trait Clock: Send + Sync {
    /// Local wall-clock time; the attendance date is taken from this.
    fn local_now(&self) -> NaiveDateTime;
    /// Monotonic time since an arbitrary fixed origin.
    fn monotonic(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly.
#[cfg(test)]
pub struct ManualClock {
    state: parking_lot::Mutex<(NaiveDateTime, Duration)>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self { state: parking_lot::Mutex::new((start, Duration::ZERO)) }
    }

    pub fn advance(&self, d: Duration) {
        let mut s = self.state.lock();
        s.0 += chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());
        s.1 += d;
    }

    pub fn set_local(&self, now: NaiveDateTime) {
        self.state.lock().0 = now;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn local_now(&self) -> NaiveDateTime {
        self.state.lock().0
    }

    fn monotonic(&self) -> Duration {
        self.state.lock().1
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn manual_clock_advances_on_sleep() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(23, 59, 59).unwrap();
        let clock = ManualClock::new(start);
        clock.sleep(Duration::from_secs(2));
        assert_eq!(clock.monotonic(), Duration::from_secs(2));
        assert_eq!(clock.local_now().date(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }
}
