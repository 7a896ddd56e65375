//! Records returned by the store.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

use crate::model::Font;
use serde::{Deserialize, Serialize};

/// A résumé or cover letter with its extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: i64,
    pub name: String,
    pub content: String,
}

/// One completed generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub content: String,
    pub font: Font,
    pub filename: String,
}

/// History row before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub timestamp: i64,
    pub content: String,
    pub font: Font,
    pub filename: String,
}
