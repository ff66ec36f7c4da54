//! The persisted pull cursor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server timestamp (fractional epoch seconds) the last successful pull reached.
///
/// Zero means the store has never completed a pull, so the next one must be full.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncCursor(f64);

impl SyncCursor {
    pub const INITIAL: Self = Self(0.0);

    pub const fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    pub const fn get(self) -> f64 {
        self.0
    }

    pub fn is_initial(self) -> bool {
        self.0 <= 0.0
    }

    /// Value of the `modified` query parameter for incremental listings.
    pub fn to_query(self) -> String {
        format!("{:.6}", self.0)
    }

    /// The cursor as a UTC time, for display.
    pub fn as_datetime(self) -> Option<chrono::DateTime<chrono::Utc>> {
        if self.is_initial() {
            return None;
        }
        chrono::DateTime::from_timestamp_millis(crate::util::seconds_to_millis(self.0))
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_datetime() {
            Some(time) => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S UTC")),
            None => f.write_str("never"),
        }
    }
}
