//! Document bookkeeping shared by stored records
//!
//! Every participant document carries creation/update stamps and a
//! soft-delete flag. Admin removal flips the flag so the row drops out of
//! listings and exports without destroying captured session data.

use bson::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// Soft-deleted records are excluded from every find
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,
}

impl Metadata {
    /// Fresh metadata, both stamps set to now
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            created_at: Some(now),
            updated_at: Some(now),
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Restamp `updated_at` on write
    pub fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}
