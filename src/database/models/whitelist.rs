//! Chat allow-list entry.

use serde::{Deserialize, Serialize};

/// A chat the owner allowed the bot to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistedChat {
    pub chat_id: i64,
    /// Owner who added it
    pub added_by: u64,
    /// Unix seconds
    pub added_at: i64,
}
