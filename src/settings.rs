//! Durable user preferences, kept in `settings.json` next to the store.
use crate::generation::provider::ProviderKind;
use crate::model::{DocumentKind, Font, Tone};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_keys: BTreeMap<ProviderKind, String>,
    pub provider: ProviderKind,
    /// Empty means the provider's default model.
    pub model: String,
    pub default_tone: Tone,
    pub default_font: Font,
    /// `{date}` and `{kind}` are substituted.
    pub filename_pattern: String,
    pub word_count_target: u32,
    pub auto_copy: bool,
    pub auto_download: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: BTreeMap::new(),
            provider: ProviderKind::Anthropic,
            model: String::new(),
            default_tone: Tone::Professional,
            default_font: Font::Helvetica,
            filename_pattern: "cover_letter_{date}.pdf".to_string(),
            word_count_target: 350,
            auto_copy: false,
            auto_download: false,
        }
    }
}

impl Settings {
    /// Missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read(path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, raw)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        self.api_keys
            .get(&kind)
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    pub fn model_for_provider(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    pub fn filename_for(&self, kind: DocumentKind, date: NaiveDate) -> String {
        let kind = match kind {
            DocumentKind::CoverLetter => "cover_letter",
            DocumentKind::Resume => "resume",
        };
        self.filename_pattern
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
            .replace("{kind}", kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_is_default() {
        let dir = tempdir().unwrap();
        let s = Settings::load(&dir.path().join("settings.json")).await.unwrap();
        assert_eq!(s, Settings::default());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings::default();
        s.api_keys
            .insert(ProviderKind::OpenAi, "sk-test-123".to_string());
        s.provider = ProviderKind::OpenAi;
        s.default_font = Font::Times;
        s.auto_copy = true;
        s.save(&path).await.unwrap();

        let loaded = Settings::load(&path).await.unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.api_key(ProviderKind::OpenAi), Some("sk-test-123"));
        assert_eq!(loaded.api_key(ProviderKind::Gemini), None);
        assert_eq!(loaded.model_for_provider(), ProviderKind::OpenAi.default_model());
    }

    #[test]
    fn filename_pattern_substitution() {
        let s = Settings {
            filename_pattern: "{kind}-{date}.pdf".into(),
            ..Settings::default()
        };
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(
            s.filename_for(DocumentKind::CoverLetter, date),
            "cover_letter-2026-03-09.pdf"
        );
    }
}
