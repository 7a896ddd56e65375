//! Per-page toolbar badge: `Alert` while the page shows a job posting.
use crate::messages::DeliveryError;
use crate::model::PageId;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::RegexSet;
use std::collections::HashMap;

pub const DEFAULT_JOB_PATTERNS: &[&str] = &[
    r"^https?://(www\.)?linkedin\.com/jobs/",
    r"^https?://([a-z]+\.)?indeed\.com/(viewjob|jobs|rc/clk)",
    r"^https?://(boards|job-boards)\.greenhouse\.io/",
    r"^https?://jobs\.lever\.co/",
    r"^https?://[^/]+\.myworkdayjobs\.com/",
];

static DEFAULT_PATTERNS: Lazy<JobPatterns> = Lazy::new(|| JobPatterns {
    set: RegexSet::new(DEFAULT_JOB_PATTERNS).unwrap_or_else(|_| RegexSet::empty()),
});

/// Address patterns of known job-posting pages.
#[derive(Debug, Clone)]
pub struct JobPatterns {
    set: RegexSet,
}

impl JobPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        Ok(Self {
            set: RegexSet::new(patterns.iter().map(|p| p.as_ref()))?,
        })
    }

    pub fn defaults() -> &'static JobPatterns {
        &DEFAULT_PATTERNS
    }

    pub fn matches(&self, url: &str) -> bool {
        self.set.is_match(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeState {
    #[default]
    Hidden,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeAppearance {
    pub text: &'static str,
    pub background: &'static str,
    pub foreground: &'static str,
}

const ALERT: BadgeAppearance = BadgeAppearance {
    text: "!",
    background: "#F59E0B",
    foreground: "#FFFFFF",
};

const CLEARED: BadgeAppearance = BadgeAppearance {
    text: "",
    background: "",
    foreground: "",
};

impl BadgeState {
    pub fn appearance(&self) -> &'static BadgeAppearance {
        match self {
            BadgeState::Alert => &ALERT,
            BadgeState::Hidden => &CLEARED,
        }
    }
}

/// Platform side of the badge: paints it on a page's toolbar icon.
#[async_trait]
pub trait BadgeSink: Send + Sync {
    async fn apply(&self, page: PageId, appearance: &BadgeAppearance) -> Result<(), DeliveryError>;
}

/// Current badge state of every live page instance.
#[derive(Debug, Default)]
pub struct BadgeTracker {
    states: HashMap<PageId, BadgeState>,
}

impl BadgeTracker {
    pub fn state(&self, page: PageId) -> BadgeState {
        self.states.get(&page).copied().unwrap_or_default()
    }

    /// Recompute from the new address alone.
    pub fn on_address(&mut self, page: PageId, is_job_posting: bool) -> BadgeState {
        let next = if is_job_posting {
            BadgeState::Alert
        } else {
            BadgeState::Hidden
        };
        self.set(page, next)
    }

    pub fn set(&mut self, page: PageId, state: BadgeState) -> BadgeState {
        self.states.insert(page, state);
        state
    }

    /// Forget the page; returns what it was showing.
    pub fn on_close(&mut self, page: PageId) -> BadgeState {
        self.states.remove(&page).unwrap_or_default()
    }
}
