/// Opaque per-connection identifier (UUID v4 string).
pub type SessionId = String;

/// Opaque per-job identifier (UUID v4 string).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh opaque identifier for a session or job.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
