use chrono::{DateTime, Duration, Utc};

/// Time source for quiz services.
///
/// Deadlines and per-question timings are always computed against a `Clock`
/// rather than `Utc::now()`, so tests can pin time without real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Whole seconds elapsed from `earlier` to `later`, floored at zero.
///
/// Used for per-question timing, where a clock that appears to run backwards
/// (NTP adjustment) must never produce a negative duration.
#[must_use]
pub fn elapsed_seconds(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u32 {
    let seconds = (later - earlier).num_seconds();
    u32::try_from(seconds).unwrap_or(0)
}

/// Deterministic timestamp for tests and examples (2025-06-15T15:06:40Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_750_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        let before = clock.now();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now() - before, Duration::seconds(90));
    }

    #[test]
    fn elapsed_seconds_floors_at_zero() {
        let now = fixed_now();
        assert_eq!(elapsed_seconds(now, now + Duration::seconds(42)), 42);
        assert_eq!(elapsed_seconds(now + Duration::seconds(5), now), 0);
    }

    #[test]
    fn elapsed_seconds_truncates_subsecond_remainder() {
        let now = fixed_now();
        assert_eq!(elapsed_seconds(now, now + Duration::milliseconds(1_900)), 1);
    }
}
