use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use jobscribe::db::DocumentStore;
use jobscribe::extract::{Blob, DefaultExtractor};
use jobscribe::generation::provider::{
    provider_with_base_url, GenerationProvider, ProviderError, ProviderKind,
};
use jobscribe::generation::{assemble, generate_and_record, GenerationError, GenerationInputs};
use jobscribe::model::{DocumentKind, Font, JobSource, Tone};
use jobscribe::session::SessionSnapshot;
use jobscribe::settings::Settings;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANTHROPIC_KEY: &str = "sk-ant-api03-test-key-0001";

fn store() -> (tempfile::TempDir, DocumentStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("store.db").display());
    let store = DocumentStore::new(&url, 2, Arc::new(DefaultExtractor));
    (dir, store)
}

fn settings() -> Settings {
    let mut s = Settings::default();
    s.api_keys.insert(ProviderKind::Anthropic, ANTHROPIC_KEY.into());
    s.default_font = Font::Times;
    s
}

fn inputs() -> GenerationInputs {
    GenerationInputs {
        job_description: "Build storage engines in Rust.".into(),
        resume: "Ten years of databases.".into(),
        cover_letter: None,
        additional_context: None,
        tone: Tone::Confident,
        word_count_target: 300,
    }
}

fn june_first() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
}

/// Records prompts and replays a fixed result.
struct ScriptedProvider {
    reply: Mutex<Option<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    fn replying(reply: Result<String, ProviderError>) -> Self {
        Self {
            reply: Mutex::new(Some(reply)),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn validate_credential(&self, key: &str) -> bool {
        key.starts_with("sk-ant-")
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        _credential: &str,
        _model: &str,
    ) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .await
            .push((system.to_string(), prompt.to_string()));
        self.reply
            .lock()
            .await
            .take()
            .unwrap_or(Err(ProviderError::EmptyResponse))
    }
}

#[tokio::test]
async fn assemble_uses_session_selection_and_settings() {
    let (_dir, store) = store();
    let resume = store
        .add(DocumentKind::Resume, &Blob::new("cv.txt", "Ten years of databases.\n"))
        .await
        .unwrap();
    let letter = store
        .add(DocumentKind::CoverLetter, &Blob::new("old.txt", "Dear hiring team"))
        .await
        .unwrap();

    let mut session = SessionSnapshot {
        job_description_text: Some("Build storage engines in Rust.".into()),
        job_description_source: Some(JobSource::Highlight),
        additional_context: Some("   ".into()),
        ..Default::default()
    };
    session.select(DocumentKind::Resume, Some(resume));
    session.select(DocumentKind::CoverLetter, Some(letter));

    let got = assemble(&store, &session, &settings()).await.unwrap();
    assert_eq!(got.resume, "Ten years of databases.");
    assert_eq!(got.cover_letter.as_deref(), Some("Dear hiring team"));
    assert_eq!(got.additional_context, None);
    assert_eq!(got.tone, Tone::Professional);
    assert_eq!(got.word_count_target, 350);

    // A selection pointing at a deleted document reads as "none".
    store.delete(DocumentKind::CoverLetter, letter).await.unwrap();
    session.tone = Some(Tone::Friendly);
    let got = assemble(&store, &session, &settings()).await.unwrap();
    assert_eq!(got.cover_letter, None);
    assert_eq!(got.tone, Tone::Friendly);

    store.delete(DocumentKind::Resume, resume).await.unwrap();
    let err = assemble(&store, &session, &settings()).await.unwrap_err();
    assert!(matches!(err, GenerationError::MissingResume));
}

#[tokio::test]
async fn assemble_requires_a_job_description() {
    let (_dir, store) = store();
    let err = assemble(&store, &SessionSnapshot::default(), &settings())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingJobDescription));
}

#[tokio::test]
async fn successful_generation_is_recorded() {
    let (_dir, store) = store();
    let provider = ScriptedProvider::replying(Ok("  Dear Acme,\nI build databases.\n".into()));

    let entry = generate_and_record(&store, &provider, &settings(), &inputs(), june_first())
        .await
        .unwrap();
    assert_eq!(entry.content, "Dear Acme,\nI build databases.");
    assert_eq!(entry.filename, "cover_letter_2026-06-01.pdf");
    assert_eq!(entry.font, Font::Times);
    assert_eq!(entry.timestamp, june_first().timestamp_millis());
    assert_eq!(store.list_entries().await.unwrap(), vec![entry]);

    let prompts = provider.prompts.lock().await;
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].0.contains("confident"));
    assert!(prompts[0].1.contains("Build storage engines in Rust."));
}

#[tokio::test]
async fn failed_generation_records_nothing() {
    let (_dir, store) = store();
    let provider = ScriptedProvider::replying(Err(ProviderError::Http {
        status: 500,
        message: "upstream".into(),
    }));
    let err = generate_and_record(&store, &provider, &settings(), &inputs(), june_first())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Provider(ProviderError::Http { status: 500, .. })));
    assert!(store.list_entries().await.unwrap().is_empty());
    assert_eq!(provider.prompts.lock().await.len(), 1);
}

#[tokio::test]
async fn credential_checked_before_calling_out() {
    let (_dir, store) = store();
    let provider = ScriptedProvider::replying(Ok("unused".into()));

    let err = generate_and_record(&store, &provider, &Settings::default(), &inputs(), june_first())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingCredential(ProviderKind::Anthropic)));

    let mut bad = settings();
    bad.api_keys.insert(ProviderKind::Anthropic, "not-a-key".into());
    let err = generate_and_record(&store, &provider, &bad, &inputs(), june_first())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidCredential(ProviderKind::Anthropic)));
    assert!(provider.prompts.lock().await.is_empty());
}

#[tokio::test]
async fn anthropic_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", ANTHROPIC_KEY))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-sonnet-4-5", "system": "sys"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Dear Acme, "},
                {"type": "text", "text": "hire me."}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        provider_with_base_url(ProviderKind::Anthropic, Url::parse(&server.uri()).unwrap()).unwrap();
    let text = provider
        .generate("sys", "prompt", ANTHROPIC_KEY, "claude-sonnet-4-5")
        .await
        .unwrap();
    assert_eq!(text, "Dear Acme, hire me.");
}

#[tokio::test]
async fn rejected_key_is_an_authorization_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        provider_with_base_url(ProviderKind::OpenAi, Url::parse(&server.uri()).unwrap()).unwrap();
    let err = provider
        .generate("sys", "prompt", "sk-proj-revoked-000000", "gpt-4o-mini")
        .await
        .unwrap_err();
    assert!(err.is_authorization_failure());
    match err {
        ProviderError::Http { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn gemini_passes_key_as_query_and_rejects_empty_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "AIzaSyTest-0123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "   "}]}}]
        })))
        .mount(&server)
        .await;

    let provider =
        provider_with_base_url(ProviderKind::Gemini, Url::parse(&server.uri()).unwrap()).unwrap();
    let err = provider
        .generate("sys", "prompt", "AIzaSyTest-0123456789", "gemini-1.5-flash")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::EmptyResponse));
    assert!(!err.is_authorization_failure());
}
