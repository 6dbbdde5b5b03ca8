//! Cached demo session record.
//!
//! The demo sign-in flow persists one record under a fixed storage key so a
//! reviewer reloading the page keeps their demo identity for a day. A record
//! older than 24 hours is treated as absent and purged on the read that
//! discovers it. Malformed content reads as "no demo session".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use talentforge_core::KeyValueStorage;

/// Fixed durable-storage key for the demo session record.
pub const DEMO_SESSION_KEY: &str = "talentforge.demo_session";

const TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoSessionRecord {
    pub identity_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl DemoSessionRecord {
    pub fn new(identity_id: impl Into<String>, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            identity_id: identity_id.into(),
            email: email.into(),
            created_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(TTL_HOURS)
    }
}

/// Read the cached record, purging it if expired.
///
/// A valid read does not touch storage; only expiry deletes.
pub fn read(storage: &dyn KeyValueStorage, now: DateTime<Utc>) -> Option<DemoSessionRecord> {
    let raw = storage.get(DEMO_SESSION_KEY)?;
    let record: DemoSessionRecord = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(err) => {
            warn!(%err, "malformed demo session record; treating as absent");
            return None;
        }
    };
    if record.is_expired(now) {
        debug!(identity_id = %record.identity_id, "demo session expired; purging");
        storage.remove(DEMO_SESSION_KEY);
        return None;
    }
    Some(record)
}

pub fn write(storage: &dyn KeyValueStorage, record: &DemoSessionRecord) {
    match serde_json::to_string(record) {
        Ok(raw) => storage.set(DEMO_SESSION_KEY, &raw),
        Err(err) => warn!(%err, "failed to serialize demo session record"),
    }
}

pub fn clear(storage: &dyn KeyValueStorage) {
    storage.remove(DEMO_SESSION_KEY);
}

#[cfg(test)]
mod tests {
    use talentforge_core::InMemoryStorage;

    use super::*;

    #[test]
    fn valid_record_reads_back_unmodified() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        let record = DemoSessionRecord::new("u1", "demo-agency@talentforge.dev", now);
        write(&storage, &record);

        assert_eq!(read(&storage, now), Some(record.clone()));
        // No mutation on a valid read.
        assert_eq!(read(&storage, now), Some(record));
    }

    #[test]
    fn record_older_than_24h_is_purged_on_read() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        let record = DemoSessionRecord::new("u1", "x@y.z", now - Duration::hours(25));
        write(&storage, &record);

        assert_eq!(read(&storage, now), None);
        assert_eq!(storage.get(DEMO_SESSION_KEY), None);
    }

    #[test]
    fn record_exactly_at_24h_is_still_valid() {
        let now = Utc::now();
        let record = DemoSessionRecord::new("u1", "x@y.z", now - Duration::hours(24));
        assert!(!record.is_expired(now));
    }

    #[test]
    fn malformed_record_reads_as_absent() {
        let storage = InMemoryStorage::new();
        storage.set(DEMO_SESSION_KEY, "{not json");
        assert_eq!(read(&storage, Utc::now()), None);
    }

    #[test]
    fn clear_removes_the_record() {
        let storage = InMemoryStorage::new();
        write(&storage, &DemoSessionRecord::new("u1", "x@y.z", Utc::now()));
        clear(&storage);
        assert_eq!(storage.get(DEMO_SESSION_KEY), None);
    }
}
