use crate::axpert::inverter::Reading;
use std::sync::{Arc, Mutex, PoisonError};

/// Latest good reading, shared between the poll loop (sole writer) and any
/// number of readers. Readings are swapped whole, never edited in place.
#[derive(Clone, Debug, Default)]
pub struct StatusCache {
    latest: Arc<Mutex<Option<Arc<Reading>>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, reading: Reading) {
        let reading = Arc::new(reading);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(reading);
    }

    pub fn latest(&self) -> Option<Arc<Reading>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.latest().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn starts_empty() {
        assert!(StatusCache::new().is_empty());
    }

    #[test]
    fn store_replaces_whole_reading() {
        let cache = StatusCache::new();
        let reader = cache.clone();

        cache.store(Reading::Raw(Bytes::from_static(b"(first")));
        let first = reader.latest().unwrap();
        cache.store(Reading::Raw(Bytes::from_static(b"(second")));

        assert_eq!(*first, Reading::Raw(Bytes::from_static(b"(first")));
        assert_eq!(*reader.latest().unwrap(), Reading::Raw(Bytes::from_static(b"(second")));
    }
}
