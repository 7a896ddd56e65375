//! Session-scoped snapshot shared by the coordinator and UI surfaces.
//!
//! The snapshot is the only state every context can reach: it is written to
//! `session.json` on each change and read back by whoever starts up next.
//! Ending the session removes the file.
use crate::model::{DocumentKind, JobSource, Tone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Captured job description text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptionSnapshot {
    pub text: String,
    pub source: JobSource,
}

impl JobDescriptionSnapshot {
    /// Highlights always win; a scrape only fills an empty slot.
    pub fn accepts(current: Option<&JobDescriptionSnapshot>, incoming_source: JobSource) -> bool {
        match incoming_source {
            JobSource::Highlight => true,
            JobSource::Scrape => current.map_or(true, |c| c.text.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    pub job_description_text: Option<String>,
    pub job_description_source: Option<JobSource>,
    pub selected_cover_letter_id: Option<i64>,
    pub selected_resume_id: Option<i64>,
    pub additional_context: Option<String>,
    pub tone: Option<Tone>,
}

impl SessionSnapshot {
    pub fn job_description(&self) -> Option<JobDescriptionSnapshot> {
        let text = self.job_description_text.as_ref()?;
        if text.is_empty() {
            return None;
        }
        Some(JobDescriptionSnapshot {
            text: text.clone(),
            // Older files may lack the source key.
            source: self.job_description_source.unwrap_or(JobSource::Scrape),
        })
    }

    pub fn selected(&self, kind: DocumentKind) -> Option<i64> {
        match kind {
            DocumentKind::CoverLetter => self.selected_cover_letter_id,
            DocumentKind::Resume => self.selected_resume_id,
        }
    }

    pub fn select(&mut self, kind: DocumentKind, id: Option<i64>) {
        match kind {
            DocumentKind::CoverLetter => self.selected_cover_letter_id = id,
            DocumentKind::Resume => self.selected_resume_id = id,
        }
    }
}

/// Single-cell session store. Every mutation holds the lock across the
/// read-modify-write and the file write.
pub struct SessionStore {
    path: Option<PathBuf>,
    cell: Mutex<SessionSnapshot>,
}

impl SessionStore {
    /// Open the store backed by `path`, loading whatever an earlier context left.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SessionSnapshot::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path: Some(path),
            cell: Mutex::new(snapshot),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            cell: Mutex::new(SessionSnapshot::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.cell.lock().await.clone()
    }

    pub async fn job_description(&self) -> Option<JobDescriptionSnapshot> {
        self.cell.lock().await.job_description()
    }

    /// Apply the precedence rule and persist. Returns whether the text was stored.
    pub async fn offer_job_description(
        &self,
        text: &str,
        source: JobSource,
    ) -> Result<bool, SessionError> {
        let mut cell = self.cell.lock().await;
        let current = cell.job_description();
        if !JobDescriptionSnapshot::accepts(current.as_ref(), source) {
            debug!(source = source.as_str(), "job description kept; slot occupied");
            return Ok(false);
        }
        cell.job_description_text = Some(text.to_string());
        cell.job_description_source = Some(source);
        self.persist(&cell).await?;
        Ok(true)
    }

    /// Arbitrary change to the snapshot, persisted before returning.
    pub async fn update<F>(&self, f: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let mut cell = self.cell.lock().await;
        f(&mut cell);
        self.persist(&cell).await?;
        Ok(cell.clone())
    }

    /// End of session.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let mut cell = self.cell.lock().await;
        *cell = SessionSnapshot::default();
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn persist(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
