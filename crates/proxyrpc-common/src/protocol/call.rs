//! Call identifiers.
//!
//! Every logical call gets an id when its thunk is captured. The id is carried
//! through every retry of that call so log lines from different attempts can
//! be correlated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static CALL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier of one logical call (shared by all of its attempts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(u64);

impl CallId {
    /// Generates a fresh, process-unique call id.
    pub fn next() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let counter = CALL_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

        // Upper 32 bits from the clock, lower 32 bits from the counter
        CallId((timestamp & 0xFFFF_FFFF_0000_0000) | (counter & 0xFFFF_FFFF))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
