use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// An opaque login token bound to one user until `expires_at`.
#[derive(Clone, Serialize, Debug)]
pub struct Session {
    pub token: String,
    pub uid: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn issue(uid: i32, ttl: Duration) -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
            uid,
            expires_at: OffsetDateTime::now_utc() + ttl,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}
