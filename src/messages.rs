//! Cross-context message contract.
//!
//! Every message travels as `{"type": ..., "payload": {...}}`. Delivery is
//! best effort: the receiving context may not exist yet, or may already be
//! gone. Callers log and drop [`DeliveryError`]s.
use crate::model::{JobSource, PageId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Page scraper (or selection capturer) to coordinator.
    ScrapedJobDescription { text: String },
    /// Coordinator to UI surface.
    JobDescriptionText { text: String, source: JobSource },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ScrapedJobDescription { .. } => "SCRAPED_JOB_DESCRIPTION",
            Message::JobDescriptionText { .. } => "JOB_DESCRIPTION_TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Received,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub status: AckStatus,
}

impl Ack {
    pub fn received() -> Self {
        Self {
            status: AckStatus::Received,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no listener for message")]
    NoListener,
    #[error("{0} is closed")]
    PageClosed(PageId),
    #[error("delivery failed: {0}")]
    Other(String),
}

/// Sending side of a page context's runtime channel to the coordinator.
#[async_trait]
pub trait MessagePort: Send + Sync {
    async fn send(&self, message: Message) -> Result<Ack, DeliveryError>;
}
