//! Small shared utilities.

mod timestamps;
mod uuid_utils;

pub use timestamps::{iso_timestamp, now_utc, unix_time_ms, Timestamp};
pub use uuid_utils::generate_uuid;
