//! Shared constants for history event identifiers and task timeouts.

/// Sentinel event id meaning "event not yet written" (e.g. an activity that
/// has been scheduled but not started).
pub const EMPTY_EVENT_ID: i64 = -23;

/// Event id of the first event in any workflow history.
pub const FIRST_EVENT_ID: i64 = 1;

/// Upper bound applied to every schedule-to-start timeout handed to matching.
pub const MAX_TASK_TIMEOUT_SECS: i32 = 366 * 24 * 60 * 60;

/// Conversion factor for domain retention, which is configured in days but
/// persisted in seconds.
pub const SECONDS_IN_DAY: i64 = 86_400;

/// Domain name recorded when the domain cache has no entry for a domain id.
pub const DEFAULT_DOMAIN_NAME: &str = "default-domain";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_ids_do_not_collide_with_real_events() {
        assert!(EMPTY_EVENT_ID < 0);
        assert!(FIRST_EVENT_ID > EMPTY_EVENT_ID);
    }
}
