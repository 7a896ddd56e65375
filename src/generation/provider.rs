//! Text-generation providers.
//!
//! Each provider is a thin JSON client behind [`GenerationProvider`]. Calls
//! are made once; failures go straight back to the caller.
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_BASE: &str = "https://api.openai.com/";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(ProviderKind::Anthropic),
            "openai" => Some(ProviderKind::OpenAi),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-5",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("provider returned no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Bad or revoked credential, as opposed to every other failure.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, ProviderError::Http { status: 401 | 403, .. })
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Local shape check; does not contact the provider.
    fn validate_credential(&self, key: &str) -> bool;

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        credential: &str,
        model: &str,
    ) -> Result<String, ProviderError>;
}

/// Provider for `kind` against its public endpoint.
pub fn provider_for(kind: ProviderKind) -> Result<Box<dyn GenerationProvider>, ProviderError> {
    let base = match kind {
        ProviderKind::Anthropic => ANTHROPIC_API_BASE,
        ProviderKind::OpenAi => OPENAI_API_BASE,
        ProviderKind::Gemini => GEMINI_API_BASE,
    };
    provider_with_base_url(kind, Url::parse(base)?)
}

pub fn provider_with_base_url(
    kind: ProviderKind,
    base_url: Url,
) -> Result<Box<dyn GenerationProvider>, ProviderError> {
    let http = Client::builder()
        .user_agent(concat!("jobscribe/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(120))
        .build()?;
    Ok(match kind {
        ProviderKind::Anthropic => Box::new(AnthropicProvider { http, base_url }),
        ProviderKind::OpenAi => Box::new(OpenAiProvider { http, base_url }),
        ProviderKind::Gemini => Box::new(GeminiProvider { http, base_url }),
    })
}

fn plausible_key(key: &str, prefix: &str) -> bool {
    key.starts_with(prefix)
        && key.len() > prefix.len() + 8
        && !key.chars().any(char::is_whitespace)
}

/// Map non-2xx responses to `ProviderError::Http`, pulling the provider's
/// `error.message` when the body has one.
async fn json_or_error(res: Response) -> Result<Value, ProviderError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(ProviderError::Http {
            status: status.as_u16(),
            message,
        });
    }
    Ok(res.json().await?)
}

fn non_empty(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(text)
    }
}

pub struct AnthropicProvider {
    http: Client,
    base_url: Url,
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn validate_credential(&self, key: &str) -> bool {
        plausible_key(key, "sk-ant-")
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        credential: &str,
        model: &str,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{"role": "user", "content": prompt}],
        });
        let res = self
            .http
            .post(self.base_url.join("v1/messages")?)
            .header("x-api-key", credential)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let payload = json_or_error(res).await?;
        debug!(usage = %payload["usage"], "anthropic call succeeded");
        let text = payload["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<String>();
        non_empty(text)
    }
}

pub struct OpenAiProvider {
    http: Client,
    base_url: Url,
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn validate_credential(&self, key: &str) -> bool {
        plausible_key(key, "sk-")
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        credential: &str,
        model: &str,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
        });
        let res = self
            .http
            .post(self.base_url.join("v1/chat/completions")?)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;
        let payload = json_or_error(res).await?;
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        non_empty(text)
    }
}

pub struct GeminiProvider {
    http: Client,
    base_url: Url,
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn validate_credential(&self, key: &str) -> bool {
        plausible_key(key, "AIza")
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        credential: &str,
        model: &str,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        });
        let url = self
            .base_url
            .join(&format!("v1beta/models/{model}:generateContent"))?;
        let res = self
            .http
            .post(url)
            .query(&[("key", credential)])
            .json(&body)
            .send()
            .await?;
        let payload = json_or_error(res).await?;
        let text = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|p| p["text"].as_str())
            .collect::<String>();
        non_empty(text)
    }
}
