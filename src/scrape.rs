//! Page scraper: finds the job description in a loaded page and reports it once.
//!
//! A [`ScrapeSession`] lives as long as one page instance. It waits for the
//! page to settle, tries the configured selectors in order, and retries
//! after DOM mutations (at most once per settle delay) until either something
//! is found or the observation window closes. After the first hit the latch stays shut.
use crate::messages::{Message, MessagePort};
use crate::model::PageId;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Default content locations, most specific first.
pub const DEFAULT_SELECTORS: &[&str] = &[
    ".jobs-description__content",
    ".jobs-box__html-content",
    "#job-details",
    "#jobDescriptionText",
    "[data-automation-id='jobPostingDescription']",
    "#content .job__description",
    ".posting-page .section-wrapper",
    ".job-description",
];

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid CSS selector {0:?}")]
    InvalidSelector(String),
}

/// Read access to the current DOM of a page instance.
pub trait PageDocument: Send + Sync {
    fn html(&self) -> String;
}

impl PageDocument for String {
    fn html(&self) -> String {
        self.clone()
    }
}

/// Ordered selector candidates.
#[derive(Debug, Clone)]
pub struct Scraper {
    candidates: Vec<(String, Selector)>,
}

impl Scraper {
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Result<Self, ScrapeError> {
        let candidates = selectors
            .iter()
            .map(|s| {
                let raw = s.as_ref();
                Selector::parse(raw)
                    .map(|sel| (raw.to_string(), sel))
                    .map_err(|_| ScrapeError::InvalidSelector(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { candidates })
    }

    pub fn with_defaults() -> Result<Self, ScrapeError> {
        Self::new(DEFAULT_SELECTORS)
    }

    /// Text of the first candidate whose element has non-blank text.
    pub fn extract(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        for (raw, sel) in &self.candidates {
            for node in doc.select(sel) {
                let text = node.text().collect::<String>();
                let text = text.trim();
                if !text.is_empty() {
                    debug!(selector = %raw, chars = text.len(), "job description located");
                    return Some(text.to_string());
                }
            }
        }
        None
    }
}

/// Fires at most once.
#[derive(Debug, Default)]
pub struct OneShotLatch {
    fired: bool,
}

impl OneShotLatch {
    pub fn is_fired(&self) -> bool {
        self.fired
    }

    /// Returns true only for the call that closes the latch.
    pub fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeTiming {
    /// Wait after load, and between a mutation and the re-attempt it triggers.
    pub settle_delay: Duration,
    /// Mutation observation stops this long after load.
    pub observation_window: Duration,
}

impl ScrapeTiming {
    pub fn from_config(cfg: &crate::config::Coordinator) -> Self {
        Self {
            settle_delay: cfg.settle_delay(),
            observation_window: cfg.observation_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Relayed { text: String, delivered: bool },
    NotFound,
}

pub struct ScrapeSession {
    page: PageId,
    scraper: Arc<Scraper>,
    latch: OneShotLatch,
}

impl ScrapeSession {
    pub fn new(page: PageId, scraper: Arc<Scraper>) -> Self {
        Self {
            page,
            scraper,
            latch: OneShotLatch::default(),
        }
    }

    /// One extraction attempt; `None` once the latch has fired.
    pub fn attempt(&mut self, html: &str) -> Option<String> {
        if self.latch.is_fired() {
            return None;
        }
        let text = self.scraper.extract(html)?;
        self.latch.fire();
        Some(text)
    }

    /// Drive the session for one page instance. Each unit received on
    /// `mutations` is one child-list mutation somewhere under the document
    /// root. The receiver is dropped on return, which ends observation.
    pub async fn run<D, P>(
        mut self,
        doc: &D,
        mut mutations: mpsc::Receiver<()>,
        port: &P,
        timing: ScrapeTiming,
    ) -> ScrapeOutcome
    where
        D: PageDocument + ?Sized,
        P: MessagePort + ?Sized,
    {
        let window = sleep(timing.observation_window);
        tokio::pin!(window);
        let settle = sleep(timing.settle_delay);
        tokio::pin!(settle);
        let mut attempt_pending = true;
        let mut observing = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut settle, if attempt_pending => {
                    attempt_pending = false;
                    if let Some(text) = self.attempt(&doc.html()) {
                        return self.relay(text, port).await;
                    }
                    if !observing {
                        break;
                    }
                }
                _ = &mut window => {
                    debug!(page = %self.page, "observation window closed");
                    break;
                }
                mutation = mutations.recv(), if observing => match mutation {
                    // A scheduled attempt is never pushed back, so a page that
                    // keeps changing is still looked at once per settle delay.
                    Some(()) if attempt_pending => {}
                    Some(()) => {
                        settle.as_mut().reset(Instant::now() + timing.settle_delay);
                        attempt_pending = true;
                    }
                    None => {
                        observing = false;
                        if !attempt_pending {
                            break;
                        }
                    }
                },
            }
        }
        debug!(page = %self.page, "no job description found");
        ScrapeOutcome::NotFound
    }

    async fn relay<P: MessagePort + ?Sized>(&self, text: String, port: &P) -> ScrapeOutcome {
        let message = Message::ScrapedJobDescription { text: text.clone() };
        let delivered = match port.send(message).await {
            Ok(ack) => {
                info!(page = %self.page, ?ack, "job description relayed");
                true
            }
            Err(err) => {
                warn!(page = %self.page, ?err, "job description relay failed; not retrying");
                false
            }
        };
        ScrapeOutcome::Relayed { text, delivered }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINKEDIN: &str = r#"<html><body>
        <div class="jobs-description__content">
          <h2>About the job</h2>
          <p>We are hiring a <b>Rust</b> engineer.</p>
        </div>
        <div id="jobDescriptionText">ignored, lower priority</div>
    </body></html>"#;

    #[test]
    fn first_candidate_wins() {
        let scraper = Scraper::with_defaults().unwrap();
        let text = scraper.extract(LINKEDIN).unwrap();
        assert!(text.starts_with("About the job"));
        assert!(text.contains("hiring a Rust engineer."));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn blank_match_falls_through() {
        let html = r#"<div class="jobs-description__content">   </div>
                      <div class="job-description">  Backend role  </div>"#;
        let scraper = Scraper::with_defaults().unwrap();
        assert_eq!(scraper.extract(html).as_deref(), Some("Backend role"));
    }

    #[test]
    fn nothing_matches() {
        let scraper = Scraper::with_defaults().unwrap();
        assert_eq!(scraper.extract("<p>news article</p>"), None);
    }

    #[test]
    fn invalid_selector_rejected() {
        assert!(matches!(
            Scraper::new(&["div["]),
            Err(ScrapeError::InvalidSelector(_))
        ));
    }

    #[test]
    fn latch_fires_once() {
        let mut latch = OneShotLatch::default();
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(latch.is_fired());
    }

    #[test]
    fn attempt_succeeds_once_per_session() {
        let mut session = ScrapeSession::new(PageId(1), Arc::new(Scraper::with_defaults().unwrap()));
        assert_eq!(session.attempt("<p>nothing</p>"), None);
        assert!(session.attempt(LINKEDIN).is_some());
        assert_eq!(session.attempt(LINKEDIN), None);
    }
}
