use chrono::{DateTime, Utc};

/// Represents an entity responsible for providing the current moment across
/// the application. Stores use it to stamp writes and sessions use it to
/// resolve "today", which lets both be driven with a pinned time in tests.
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
