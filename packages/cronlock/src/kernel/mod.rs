//! The scheduler core: job manager, execution pipeline, heartbeat driver,
//! and the reaper that reclaims state abandoned by crashed instances.

pub mod manager;

mod executor;
mod heartbeat;
mod reaper;

pub use manager::JobManager;

use std::time::Duration;

use chrono::{DateTime, Utc};

/// `now - age`, saturating to the distant past so an unrepresentable age can
/// never produce a cutoff that matches live rows.
pub(crate) fn age_cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_cutoff_subtracts() {
        let now = Utc::now();
        let cutoff = age_cutoff(now, Duration::from_secs(600));
        assert_eq!(now - cutoff, chrono::Duration::seconds(600));
    }

    #[test]
    fn age_cutoff_saturates_on_huge_age() {
        let now = Utc::now();
        let cutoff = age_cutoff(now, Duration::from_secs(u64::MAX));
        assert_eq!(cutoff, DateTime::<Utc>::MIN_UTC);
    }
}
