//! Aliases shared by every layer that touches the database.

/// Primary-key type; every table uses BIGSERIAL, which maps to `i64`.
pub type DbId = i64;

/// Wall-clock instant as stored in TIMESTAMPTZ columns, always UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
