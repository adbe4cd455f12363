use std::collections::HashMap;

use log::trace;

use crate::otp::{self, OtpError, OtpResult};

/// Memoizes one [`OtpResult`] per secret for the current window.
///
/// An entry is keyed by `(secret, window)`. Observing a newer window for a
/// secret replaces its older entry, so the cache never holds more entries
/// than there are distinct secrets.
#[derive(Debug, Default)]
pub struct OtpCache {
    entries: HashMap<(String, u64), OtpResult>,
    misses: u64,
}

impl OtpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the code for `key` at `now`, computing it only on the first
    /// access within a window. `time_remaining` is always fresh for `now`.
    pub fn get(&mut self, key: &str, now: u64) -> Result<OtpResult, OtpError> {
        let window = otp::window_index(now);
        let slot = (key.to_string(), window);

        if !self.entries.contains_key(&slot) {
            let result = otp::compute(key, now)?;
            self.misses += 1;
            trace!("otp cache miss for window {window}");

            self.entries
                .retain(|(k, w), _| !(k.as_str() == key && *w != window));
            self.entries.insert(slot.clone(), result);
        }

        let mut result = self.entries[&slot].clone();
        result.time_remaining = otp::time_remaining(now);
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of times the underlying TOTP primitive was invoked.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "JBSWY3DPEHPK3PXP";
    const B: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn hits_within_window_refresh_countdown() {
        let mut cache = OtpCache::new();
        let first = cache.get(A, 1_700_000_000).unwrap();
        let second = cache.get(A, 1_700_000_005).unwrap();

        assert_eq!(cache.misses(), 1);
        assert_eq!(first.current_otp, second.current_otp);
        assert_eq!(first.period_start, second.period_start);
        assert_eq!(first.time_remaining, 10);
        assert_eq!(second.time_remaining, 5);
    }

    #[test]
    fn new_window_evicts_old_entry() {
        let mut cache = OtpCache::new();
        cache.get(A, 1_700_000_000).unwrap();
        let next = cache.get(A, 1_700_000_010).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 2);
        assert_eq!(next.current_otp, "367665");
        assert_eq!(next.time_remaining, 30);
    }

    #[test]
    fn bounded_by_distinct_secrets() {
        let mut cache = OtpCache::new();
        for tick in 0..400u64 {
            let now = 1_700_000_000 + tick / 2;
            cache.get(A, now).unwrap();
            cache.get(B, now).unwrap();
            assert!(cache.len() <= 2);
        }
        assert_eq!(cache.len(), 2);
        // 200 seconds starting 10 s before a boundary touch 8 windows
        assert_eq!(cache.misses(), 16);
    }

    #[test]
    fn invalid_secret_is_not_cached() {
        let mut cache = OtpCache::new();
        assert!(matches!(
            cache.get("", 1_700_000_000),
            Err(OtpError::InvalidSecret(_))
        ));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.misses(), 0);
    }
}
