//! Registration record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema version of the persisted document.
pub const DATA_VERSION: u32 = 1;

/// A cached push registration token and the app version that obtained it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Token issued by the push service. Empty means no registration.
    pub token: String,
    /// Application version code at the time of registration.
    pub app_version: i32,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
}

impl RegistrationRecord {
    /// Create a record stamped with the current time.
    pub fn new(token: impl Into<String>, app_version: i32) -> Self {
        Self {
            token: token.into(),
            app_version,
            saved_at: Utc::now(),
        }
    }

    /// A record is only usable by the exact version that registered it.
    pub fn is_valid_for(&self, current_version: i32) -> bool {
        !self.token.is_empty() && self.app_version == current_version
    }
}

/// Persisted document: one record per application identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreData {
    /// Schema version for migrations.
    pub version: u32,
    /// Records indexed by application id.
    #[serde(default)]
    pub records: HashMap<String, RegistrationRecord>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            records: HashMap::new(),
        }
    }
}
