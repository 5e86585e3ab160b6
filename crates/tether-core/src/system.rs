use std::{sync::OnceLock, time::Instant};

static INSTANCE_ID: OnceLock<String> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record process start time.
pub fn init_uptime() {
    START_TIME.get_or_init(Instant::now);
}

/// Process uptime in seconds.
pub fn uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_secs()
}

/// Process-stable identity of this instance.
///
/// The hostname when it is readable, otherwise a random UUID generated once.
pub fn instance_id() -> &'static str {
    INSTANCE_ID.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_is_stable() {
        let a = instance_id();
        let b = instance_id();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn uptime_is_monotonic() {
        init_uptime();
        let a = uptime_seconds();
        let b = uptime_seconds();
        assert!(b >= a);
    }
}
