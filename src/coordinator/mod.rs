//! Long-lived coordinator between page instances and UI surfaces.
//!
//! It owns the badge state of every page, is the only writer of the job
//! description in the session snapshot, and relays changes to the UI surface
//! when one is listening. Nothing it sends is retried: a UI that was not open
//! reads the snapshot when it starts.
pub mod badge;

use crate::messages::{Ack, DeliveryError, Message, MessagePort};
use crate::model::{JobSource, PageId};
use crate::session::SessionStore;
use async_trait::async_trait;
use badge::{BadgeSink, BadgeState, BadgeTracker, JobPatterns};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// The extension's UI (popup or side panel), as seen from the coordinator.
#[async_trait]
pub trait UiSurface: Send + Sync {
    /// Make the surface visible. Completes once it can receive messages.
    async fn open(&self) -> Result<(), DeliveryError>;
    async fn post(&self, message: Message) -> Result<(), DeliveryError>;
}

/// Everything the coordinator reacts to.
#[derive(Debug)]
pub enum Event {
    Message {
        from: PageId,
        message: Message,
        reply: Option<oneshot::Sender<Ack>>,
    },
    AddressChanged {
        page: PageId,
        url: String,
    },
    PageClosed {
        page: PageId,
    },
    /// Context-menu "generate from selection".
    Highlight {
        page: PageId,
        text: String,
    },
    /// Toolbar button.
    Open {
        page: Option<PageId>,
    },
}

pub struct Coordinator {
    session: Arc<SessionStore>,
    patterns: JobPatterns,
    badge_sink: Arc<dyn BadgeSink>,
    surface: Arc<dyn UiSurface>,
    relay_delay: Duration,
    badges: BadgeTracker,
    addresses: HashMap<PageId, String>,
}

impl Coordinator {
    pub fn new(
        session: Arc<SessionStore>,
        patterns: JobPatterns,
        badge_sink: Arc<dyn BadgeSink>,
        surface: Arc<dyn UiSurface>,
        relay_delay: Duration,
    ) -> Self {
        Self {
            session,
            patterns,
            badge_sink,
            surface,
            relay_delay,
            badges: BadgeTracker::default(),
            addresses: HashMap::new(),
        }
    }

    pub fn badge_state(&self, page: PageId) -> BadgeState {
        self.badges.state(page)
    }

    pub async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Message {
                from,
                message,
                reply,
            } => {
                let ack = self.handle_message(from, message).await;
                if let (Some(reply), Some(ack)) = (reply, ack) {
                    // Sender may have gone away; that is fine.
                    let _ = reply.send(ack);
                }
            }
            Event::AddressChanged { page, url } => self.address_changed(page, &url).await,
            Event::PageClosed { page } => self.page_closed(page).await,
            Event::Highlight { page, text } => self.highlight(page, &text).await,
            Event::Open { page } => {
                self.open(page).await;
            }
        }
    }

    #[instrument(skip(self, message), fields(kind = message.kind()))]
    pub async fn handle_message(&mut self, from: PageId, message: Message) -> Option<Ack> {
        match message {
            Message::ScrapedJobDescription { text } => {
                self.accept_job_description(&text, JobSource::Scrape).await;
                self.set_badge(from, BadgeState::Alert).await;
                Some(Ack::received())
            }
            Message::JobDescriptionText { .. } => {
                warn!(page = %from, "ignoring coordinator-bound copy of a UI message");
                None
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn address_changed(&mut self, page: PageId, url: &str) {
        self.addresses.insert(page, url.to_string());
        let state = self.badges.on_address(page, self.patterns.matches(url));
        self.paint(page, state).await;
    }

    #[instrument(skip(self))]
    pub async fn page_closed(&mut self, page: PageId) {
        self.addresses.remove(&page);
        let was = self.badges.on_close(page);
        debug!(%page, ?was, "page closed; clearing badge");
        self.paint(page, BadgeState::Hidden).await;
    }

    /// Open the surface first so a listener exists, then store and relay.
    #[instrument(skip(self, text))]
    pub async fn highlight(&mut self, page: PageId, text: &str) {
        if let Err(err) = self.surface.open().await {
            warn!(%page, ?err, "failed to open UI surface");
        }
        self.accept_job_description(text, JobSource::Highlight).await;
    }

    /// Open the surface. If the page is a job posting and a scraped
    /// description is stored, relay it after `relay_delay` so the surface has
    /// time to register its listener. Highlighted text is left for the
    /// surface to read from the snapshot.
    #[instrument(skip(self))]
    pub async fn open(&mut self, page: Option<PageId>) -> Option<JoinHandle<()>> {
        if let Err(err) = self.surface.open().await {
            warn!(?err, "failed to open UI surface");
        }
        let url = page.and_then(|p| self.addresses.get(&p))?;
        if !self.patterns.matches(url) {
            return None;
        }
        let jd = self
            .session
            .job_description()
            .await
            .filter(|jd| jd.source == JobSource::Scrape)?;
        let surface = Arc::clone(&self.surface);
        let delay = self.relay_delay;
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let message = Message::JobDescriptionText {
                text: jd.text,
                source: jd.source,
            };
            if let Err(err) = surface.post(message).await {
                debug!(?err, "delayed relay dropped");
            }
        }))
    }

    async fn accept_job_description(&mut self, text: &str, source: JobSource) {
        match self.session.offer_job_description(text, source).await {
            Ok(true) => {
                info!(source = source.as_str(), chars = text.len(), "job description stored");
                let message = Message::JobDescriptionText {
                    text: text.to_string(),
                    source,
                };
                if let Err(err) = self.surface.post(message).await {
                    debug!(?err, "no UI surface listening; snapshot holds the update");
                }
            }
            Ok(false) => {
                debug!(source = source.as_str(), "job description already present; kept");
            }
            Err(err) => {
                warn!(?err, "failed to persist job description");
            }
        }
    }

    async fn set_badge(&mut self, page: PageId, state: BadgeState) {
        self.badges.set(page, state);
        self.paint(page, state).await;
    }

    async fn paint(&self, page: PageId, state: BadgeState) {
        if let Err(err) = self.badge_sink.apply(page, state.appearance()).await {
            debug!(%page, ?state, ?err, "badge update dropped");
        }
    }

    /// Run on its own task; events are handled one at a time in arrival order.
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(self.run(rx));
        (CoordinatorHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Event>) {
        while let Some(event) = rx.recv().await {
            self.dispatch(event).await;
        }
        debug!("coordinator stopped");
    }
}

/// Cloneable sender into a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Event>,
}

impl CoordinatorHandle {
    pub fn port(&self, page: PageId) -> PagePort {
        PagePort {
            page,
            tx: self.tx.clone(),
        }
    }

    pub async fn send(&self, event: Event) -> Result<(), DeliveryError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| DeliveryError::NoListener)
    }

    pub async fn address_changed(&self, page: PageId, url: &str) -> Result<(), DeliveryError> {
        self.send(Event::AddressChanged {
            page,
            url: url.to_string(),
        })
        .await
    }

    pub async fn page_closed(&self, page: PageId) -> Result<(), DeliveryError> {
        self.send(Event::PageClosed { page }).await
    }

    pub async fn highlight(&self, page: PageId, text: &str) -> Result<(), DeliveryError> {
        self.send(Event::Highlight {
            page,
            text: text.to_string(),
        })
        .await
    }

    pub async fn open(&self, page: Option<PageId>) -> Result<(), DeliveryError> {
        self.send(Event::Open { page }).await
    }
}

/// A page instance's runtime port to the coordinator.
pub struct PagePort {
    page: PageId,
    tx: mpsc::Sender<Event>,
}

#[async_trait]
impl MessagePort for PagePort {
    async fn send(&self, message: Message) -> Result<Ack, DeliveryError> {
        let (reply, ack) = oneshot::channel();
        self.tx
            .send(Event::Message {
                from: self.page,
                message,
                reply: Some(reply),
            })
            .await
            .map_err(|_| DeliveryError::NoListener)?;
        ack.await.map_err(|_| DeliveryError::NoListener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        badges: Mutex<Vec<(PageId, &'static str)>>,
        posted: Mutex<Vec<Message>>,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl BadgeSink for Recorder {
        async fn apply(
            &self,
            page: PageId,
            appearance: &badge::BadgeAppearance,
        ) -> Result<(), DeliveryError> {
            self.badges.lock().await.push((page, appearance.text));
            Ok(())
        }
    }

    #[async_trait]
    impl UiSurface for Recorder {
        async fn open(&self) -> Result<(), DeliveryError> {
            self.calls.lock().await.push("open");
            Ok(())
        }

        async fn post(&self, message: Message) -> Result<(), DeliveryError> {
            self.calls.lock().await.push("post");
            self.posted.lock().await.push(message);
            Ok(())
        }
    }

    fn coordinator(rec: &Arc<Recorder>) -> Coordinator {
        Coordinator::new(
            Arc::new(SessionStore::in_memory()),
            JobPatterns::defaults().clone(),
            rec.clone(),
            rec.clone(),
            Duration::from_millis(300),
        )
    }

    #[tokio::test]
    async fn scraped_message_acks_and_alerts_sender() {
        let rec = Arc::new(Recorder::default());
        let mut c = coordinator(&rec);
        let ack = c
            .handle_message(
                PageId(9),
                Message::ScrapedJobDescription {
                    text: "Rust dev".into(),
                },
            )
            .await;
        assert_eq!(ack, Some(Ack::received()));
        assert_eq!(c.badge_state(PageId(9)), BadgeState::Alert);
        assert_eq!(*rec.badges.lock().await, vec![(PageId(9), "!")]);
        assert_eq!(
            *rec.posted.lock().await,
            vec![Message::JobDescriptionText {
                text: "Rust dev".into(),
                source: JobSource::Scrape
            }]
        );
    }

    #[tokio::test]
    async fn highlight_opens_surface_before_relay() {
        let rec = Arc::new(Recorder::default());
        let mut c = coordinator(&rec);
        c.highlight(PageId(1), "picked text").await;
        assert_eq!(*rec.calls.lock().await, vec!["open", "post"]);
        assert_eq!(c.session.job_description().await.unwrap().text, "picked text");
    }

    #[tokio::test]
    async fn ui_bound_message_is_ignored() {
        let rec = Arc::new(Recorder::default());
        let mut c = coordinator(&rec);
        let ack = c
            .handle_message(
                PageId(1),
                Message::JobDescriptionText {
                    text: "x".into(),
                    source: JobSource::Scrape,
                },
            )
            .await;
        assert_eq!(ack, None);
        assert!(c.session.job_description().await.is_none());
    }
}
