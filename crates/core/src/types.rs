/// Jobs are identified by random (v4) UUIDs generated at submission time.
pub type JobId = uuid::Uuid;

/// Requester identity as supplied by the front-end (chat user id).
pub type UserId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
