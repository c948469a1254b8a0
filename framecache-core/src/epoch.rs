use std::time::{Duration, SystemTime};

/// The single expiration instant shared by every entry of a timed cache.
///
/// With no lifetime the epoch never ends. Neither does it when the end would lie
/// beyond what `SystemTime` can represent.
///
/// # Examples
///
/// ```
/// use framecache_core::CacheEpoch;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let start = UNIX_EPOCH;
/// let mut epoch = CacheEpoch::new(Some(Duration::from_secs(60)), start);
///
/// assert!(!epoch.roll(start + Duration::from_secs(59)));
/// assert!(epoch.roll(start + Duration::from_secs(60)));
/// assert_eq!(epoch.expiration(), Some(start + Duration::from_secs(120)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheEpoch {
    lifetime: Option<Duration>,
    expiration: Option<SystemTime>,
}

impl CacheEpoch {
    /// Starts the first epoch at `now`.
    pub fn new(lifetime: Option<Duration>, now: SystemTime) -> Self {
        Self {
            lifetime,
            expiration: lifetime.and_then(|lifetime| now.checked_add(lifetime)),
        }
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    pub fn expiration(&self) -> Option<SystemTime> {
        self.expiration
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiration.map_or(false, |expiration| now >= expiration)
    }

    /// Starts a new epoch at `now` if the current one has ended.
    ///
    /// Returns `true` when it did; the caller must then drop every entry.
    pub fn roll(&mut self, now: SystemTime) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        self.restart(now);
        true
    }

    /// Starts a new epoch at `now` unconditionally.
    pub fn restart(&mut self, now: SystemTime) {
        let next = self.lifetime.and_then(|lifetime| now.checked_add(lifetime));
        // Never move the boundary backwards, even if the clock did.
        self.expiration = match (self.expiration, next) {
            (Some(current), Some(next)) => Some(current.max(next)),
            (_, next) => next,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    const LIFETIME: Duration = Duration::from_secs(100);

    #[test]
    fn test_no_lifetime_never_expires() {
        let mut epoch = CacheEpoch::new(None, UNIX_EPOCH);
        let far = UNIX_EPOCH + Duration::from_secs(10_000_000);
        assert!(!epoch.is_expired(far));
        assert!(!epoch.roll(far));
        assert_eq!(epoch.expiration(), None);
    }

    #[test]
    fn test_expiration_is_inclusive() {
        let epoch = CacheEpoch::new(Some(LIFETIME), UNIX_EPOCH);
        assert!(!epoch.is_expired(UNIX_EPOCH + LIFETIME - Duration::from_millis(1)));
        assert!(epoch.is_expired(UNIX_EPOCH + LIFETIME));
    }

    #[test]
    fn test_roll_recomputes_from_now() {
        let mut epoch = CacheEpoch::new(Some(LIFETIME), UNIX_EPOCH);
        let late = UNIX_EPOCH + Duration::from_secs(250);
        assert!(epoch.roll(late));
        assert_eq!(epoch.expiration(), Some(late + LIFETIME));
        assert!(!epoch.roll(late + Duration::from_secs(1)));
    }

    #[test]
    fn test_expiration_is_monotonic() {
        let mut epoch = CacheEpoch::new(Some(LIFETIME), UNIX_EPOCH + Duration::from_secs(500));
        let before = epoch.expiration();
        epoch.restart(UNIX_EPOCH);
        assert_eq!(epoch.expiration(), before);
    }

    #[test]
    fn test_unrepresentable_end_never_expires() {
        let mut epoch = CacheEpoch::new(Some(Duration::MAX), UNIX_EPOCH);
        assert_eq!(epoch.lifetime(), Some(Duration::MAX));
        assert_eq!(epoch.expiration(), None);

        let far = UNIX_EPOCH + Duration::from_secs(10_000_000_000);
        assert!(!epoch.roll(far));
        epoch.restart(far);
        assert_eq!(epoch.expiration(), None);
    }

    #[test]
    fn test_zero_lifetime_always_expired() {
        let mut epoch = CacheEpoch::new(Some(Duration::ZERO), UNIX_EPOCH);
        assert!(epoch.roll(UNIX_EPOCH));
        assert!(epoch.roll(UNIX_EPOCH));
    }
}
