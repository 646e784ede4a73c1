use chrono::DateTime;
use chrono::Utc;

/// Source of wall-clock time for expiry decisions.
///
/// Token expiry and key set expiry are both judged against this clock, so a
/// verifier can be driven with a fixed time in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
