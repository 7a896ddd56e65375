use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use jobscribe::config::{self, Config};
use jobscribe::coordinator::badge::{BadgeAppearance, BadgeSink, JobPatterns};
use jobscribe::coordinator::{Coordinator, UiSurface};
use jobscribe::db::{DocumentStore, StoreError};
use jobscribe::extract::{Blob, DefaultExtractor};
use jobscribe::generation::{self, provider};
use jobscribe::messages::{DeliveryError, Message};
use jobscribe::model::{DocumentKind, PageId, Tone};
use jobscribe::scrape::{ScrapeOutcome, ScrapeSession, ScrapeTiming, Scraper};
use jobscribe::selection::SelectionCapture;
use jobscribe::session::SessionStore;
use jobscribe::settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about = "Capture job descriptions and draft cover letters")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage stored résumés and cover letters
    #[command(subcommand)]
    Docs(DocsCommand),
    /// Inspect generated letters
    #[command(subcommand)]
    History(HistoryCommand),
    /// Inspect or edit the session snapshot
    #[command(subcommand)]
    Session(SessionCommand),
    /// Run the page scraper over a saved page as if it were loaded at URL
    Capture { url: String, html: PathBuf },
    /// Use highlighted text as the job description
    Highlight { text: String },
    /// Open the UI surface for a page at URL
    Open { url: String },
    /// Generate a cover letter from the current session
    Generate,
    /// Delete and recreate the document store
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DocsCommand {
    Add {
        #[arg(long, value_parser = parse_kind)]
        kind: DocumentKind,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    List {
        #[arg(long, value_parser = parse_kind)]
        kind: DocumentKind,
    },
    Show {
        #[arg(long, value_parser = parse_kind)]
        kind: DocumentKind,
        #[arg(long)]
        id: i64,
    },
    Rename {
        #[arg(long, value_parser = parse_kind)]
        kind: DocumentKind,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
    },
    Delete {
        #[arg(long, value_parser = parse_kind)]
        kind: DocumentKind,
        #[arg(long)]
        id: i64,
    },
    /// Clear one collection, or both when none is given
    Clear {
        #[arg(long)]
        collection: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List,
    Delete {
        #[arg(long)]
        id: i64,
    },
    Clear,
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    Show,
    Select {
        #[arg(long, value_parser = parse_kind)]
        kind: DocumentKind,
        /// Omit to unselect
        #[arg(long)]
        id: Option<i64>,
    },
    Context { text: String },
    Tone { tone: String },
    /// End the session
    Clear,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    Reset,
}

fn parse_kind(s: &str) -> Result<DocumentKind, String> {
    DocumentKind::from_collection(s)
        .ok_or_else(|| format!("expected 'resumes' or 'coverLetters', got '{s}'"))
}

/// Stand-in UI surface that prints what it receives.
struct ConsoleSurface;

#[async_trait]
impl UiSurface for ConsoleSurface {
    async fn open(&self) -> Result<(), DeliveryError> {
        println!("[ui] surface opened");
        Ok(())
    }

    async fn post(&self, message: Message) -> Result<(), DeliveryError> {
        let raw = serde_json::to_string(&message).map_err(|e| DeliveryError::Other(e.to_string()))?;
        println!("[ui] {raw}");
        Ok(())
    }
}

struct LogBadgeSink;

#[async_trait]
impl BadgeSink for LogBadgeSink {
    async fn apply(&self, page: PageId, appearance: &BadgeAppearance) -> Result<(), DeliveryError> {
        info!(%page, text = appearance.text, background = appearance.background, "badge");
        Ok(())
    }
}

const PAGE: PageId = PageId(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(args.config.as_path()))?;
    cfg.ensure_dirs()?;

    let store = DocumentStore::new(
        &cfg.database_url(),
        cfg.store.schema_version,
        Arc::new(DefaultExtractor),
    );
    let session = Arc::new(SessionStore::open(cfg.session_path()).await?);

    let res = run(args.command, &cfg, &store, session).await;
    store.close().await;
    if let Err(err) = &res {
        if let Some(StoreError::VersionConflict { .. }) = err.downcast_ref::<StoreError>() {
            error!("the document store was written by a newer version; run `jobscribe db reset` to delete and recreate it");
        }
    }
    res
}

fn coordinator(cfg: &Config, session: Arc<SessionStore>) -> Result<Coordinator> {
    let patterns = JobPatterns::new(&cfg.coordinator.job_patterns)?;
    Ok(Coordinator::new(
        session,
        patterns,
        Arc::new(LogBadgeSink),
        Arc::new(ConsoleSurface),
        cfg.coordinator.relay_delay(),
    ))
}

async fn run(
    command: Command,
    cfg: &Config,
    store: &DocumentStore,
    session: Arc<SessionStore>,
) -> Result<()> {
    match command {
        Command::Docs(cmd) => docs(cmd, store).await,
        Command::History(cmd) => history(cmd, store).await,
        Command::Session(cmd) => session_cmd(cmd, &session).await,
        Command::Capture { url, html } => {
            let html = tokio::fs::read_to_string(&html)
                .await
                .with_context(|| format!("failed to read {}", html.display()))?;
            let scraper = Arc::new(Scraper::new(&cfg.scraper.selectors)?);
            let (handle, task) = coordinator(cfg, session)?.spawn();
            handle.address_changed(PAGE, &url).await?;

            // A saved page never mutates; close the observer right away.
            let (_, mutations) = mpsc::channel(1);
            let outcome = ScrapeSession::new(PAGE, scraper)
                .run(
                    &html,
                    mutations,
                    &handle.port(PAGE),
                    ScrapeTiming::from_config(&cfg.coordinator),
                )
                .await;
            drop(handle);
            task.await?;
            match outcome {
                ScrapeOutcome::Relayed { text, .. } => {
                    println!("captured {} characters", text.chars().count())
                }
                ScrapeOutcome::NotFound => println!("no job description found"),
            }
            Ok(())
        }
        Command::Highlight { text } => {
            let capture = SelectionCapture::from_selection(PAGE, Some(&text))
                .ok_or_else(|| anyhow!("selection is empty"))?;
            let mut c = coordinator(cfg, session)?;
            c.highlight(capture.page(), capture.text()).await;
            Ok(())
        }
        Command::Open { url } => {
            let mut c = coordinator(cfg, session)?;
            c.address_changed(PAGE, &url).await;
            if let Some(relay) = c.open(Some(PAGE)).await {
                relay.await?;
            }
            Ok(())
        }
        Command::Generate => {
            let settings = Settings::load(&cfg.settings_path()).await?;
            let snapshot = session.snapshot().await;
            let inputs = generation::assemble(store, &snapshot, &settings).await?;
            let provider = provider::provider_for(settings.provider)?;
            match generation::generate_and_record(
                store,
                provider.as_ref(),
                &settings,
                &inputs,
                chrono::Utc::now(),
            )
            .await
            {
                Ok(entry) => {
                    println!("{}\n\n(saved as history #{} → {})", entry.content, entry.id, entry.filename);
                    Ok(())
                }
                Err(generation::GenerationError::Provider(err)) if err.is_authorization_failure() => {
                    Err(anyhow!("{} rejected the API key; update settings.json", settings.provider))
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Db(DbCommand::Reset) => {
            store.delete_and_recreate().await?;
            println!("document store recreated at schema version {}", store.schema_version());
            Ok(())
        }
    }
}

async fn docs(cmd: DocsCommand, store: &DocumentStore) -> Result<()> {
    match cmd {
        DocsCommand::Add { kind, files } => {
            let adds = files.iter().map(|path| async move {
                let blob = Blob::from_path(path).await?;
                let id = store.add(kind, &blob).await?;
                anyhow::Ok(id)
            });
            // Each file stands alone: one bad file does not stop the others.
            let results = futures::future::join_all(adds).await;
            report_adds(kind, files.iter().zip(results))?;
        }
        DocsCommand::List { kind } => {
            for doc in store.list(kind).await? {
                println!("{:>4}  {}  ({} chars)", doc.id, doc.name, doc.content.chars().count());
            }
        }
        DocsCommand::Show { kind, id } => match store.get_content(kind, id).await? {
            Some(content) => println!("{content}"),
            None => println!("no {kind} document #{id}"),
        },
        DocsCommand::Rename { kind, id, name } => store.rename(kind, id, &name).await?,
        DocsCommand::Delete { kind, id } => store.delete(kind, id).await?,
        DocsCommand::Clear { collection } => store.clear(collection.as_deref()).await?,
    }
    Ok(())
}

/// Print each added file; any failure fails the whole command.
fn report_adds<'a>(
    kind: DocumentKind,
    results: impl IntoIterator<Item = (&'a PathBuf, Result<i64>)>,
) -> Result<()> {
    let mut failed = 0;
    for (path, res) in results {
        match res {
            Ok(id) => println!("added {} as {kind} #{id}", path.display()),
            Err(err) => {
                error!(path = %path.display(), ?err, "failed to add file");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} file(s) could not be added");
    }
    Ok(())
}

async fn history(cmd: HistoryCommand, store: &DocumentStore) -> Result<()> {
    match cmd {
        HistoryCommand::List => {
            for entry in store.list_entries().await? {
                let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{:>4}  {when}  {}  [{}]", entry.id, entry.filename, entry.font.as_str());
            }
        }
        HistoryCommand::Delete { id } => store.delete_entry(id).await?,
        HistoryCommand::Clear => store.clear_history().await?,
    }
    Ok(())
}

async fn session_cmd(cmd: SessionCommand, session: &SessionStore) -> Result<()> {
    match cmd {
        SessionCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&session.snapshot().await)?);
        }
        SessionCommand::Select { kind, id } => {
            session.update(|s| s.select(kind, id)).await?;
        }
        SessionCommand::Context { text } => {
            session
                .update(|s| s.additional_context = Some(text))
                .await?;
        }
        SessionCommand::Tone { tone } => {
            let tone = Tone::parse(&tone).ok_or_else(|| anyhow!("unknown tone '{tone}'"))?;
            session.update(|s| s.tone = Some(tone)).await?;
        }
        SessionCommand::Clear => session.clear().await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failed_file_fails_the_add() {
        let good = PathBuf::from("cv.pdf");
        let bad = PathBuf::from("scan.pdf");
        let err = report_adds(
            DocumentKind::Resume,
            [(&good, Ok(1)), (&bad, Err(anyhow!("could not parse PDF")))],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "1 file(s) could not be added");

        assert!(report_adds(DocumentKind::Resume, [(&good, Ok(2))]).is_ok());
    }
}
