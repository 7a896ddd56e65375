//! Assembling generation inputs and recording results.
//!
//! Inputs come from three places: the session snapshot (job description,
//! selected documents, tone, extra notes), the document store (document
//! text) and durable settings (provider, credential, defaults). A selected
//! id whose document has since been deleted counts as "nothing selected".
pub mod prompts;
pub mod provider;

use crate::db::{DocumentStore, HistoryEntry, NewHistoryEntry, StoreError};
use crate::model::{DocumentKind, Tone};
use crate::session::SessionSnapshot;
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use provider::{GenerationProvider, ProviderError, ProviderKind};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no job description captured yet")]
    MissingJobDescription,
    #[error("no résumé selected")]
    MissingResume,
    #[error("no API key configured for {0}")]
    MissingCredential(ProviderKind),
    #[error("API key for {0} does not look valid")]
    InvalidCredential(ProviderKind),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInputs {
    pub job_description: String,
    pub resume: String,
    /// Earlier letter to reuse as a template.
    pub cover_letter: Option<String>,
    pub additional_context: Option<String>,
    pub tone: Tone,
    pub word_count_target: u32,
}

async fn selected_content(
    store: &DocumentStore,
    session: &SessionSnapshot,
    kind: DocumentKind,
) -> Result<Option<String>, StoreError> {
    let Some(id) = session.selected(kind) else {
        return Ok(None);
    };
    let content = store.get_content(kind, id).await?;
    if content.is_none() {
        warn!(%kind, id, "selected document no longer exists");
    }
    Ok(content)
}

#[instrument(skip_all)]
pub async fn assemble(
    store: &DocumentStore,
    session: &SessionSnapshot,
    settings: &Settings,
) -> Result<GenerationInputs, GenerationError> {
    let job_description = session
        .job_description()
        .map(|jd| jd.text)
        .ok_or(GenerationError::MissingJobDescription)?;
    let resume = selected_content(store, session, DocumentKind::Resume)
        .await?
        .ok_or(GenerationError::MissingResume)?;
    let cover_letter = selected_content(store, session, DocumentKind::CoverLetter).await?;
    let additional_context = session
        .additional_context
        .as_ref()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(GenerationInputs {
        job_description,
        resume,
        cover_letter,
        additional_context,
        tone: session.tone.unwrap_or(settings.default_tone),
        word_count_target: settings.word_count_target,
    })
}

/// Call the provider once and store the result as a history entry.
/// Nothing is written when the provider fails.
#[instrument(skip_all, fields(provider = %provider.kind()))]
pub async fn generate_and_record(
    store: &DocumentStore,
    provider: &dyn GenerationProvider,
    settings: &Settings,
    inputs: &GenerationInputs,
    now: DateTime<Utc>,
) -> Result<HistoryEntry, GenerationError> {
    let kind = provider.kind();
    let credential = settings
        .api_key(kind)
        .ok_or(GenerationError::MissingCredential(kind))?;
    if !provider.validate_credential(credential) {
        return Err(GenerationError::InvalidCredential(kind));
    }

    let model = if settings.provider == kind {
        settings.model_for_provider()
    } else {
        kind.default_model()
    };
    let (system, prompt) = prompts::build(inputs);
    let text = provider.generate(&system, &prompt, credential, model).await?;

    let entry = NewHistoryEntry {
        timestamp: now.timestamp_millis(),
        content: text.trim().to_string(),
        font: settings.default_font,
        filename: settings.filename_for(DocumentKind::CoverLetter, now.date_naive()),
    };
    let id = store.add_entry(&entry).await?;
    info!(id, model, chars = entry.content.len(), "generation recorded");
    Ok(HistoryEntry {
        id,
        timestamp: entry.timestamp,
        content: entry.content,
        font: entry.font,
        filename: entry.filename,
    })
}
