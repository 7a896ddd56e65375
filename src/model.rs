use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one loaded browsing context (a tab, in browser terms).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// The two document collections held by the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    #[serde(rename = "coverLetters")]
    CoverLetter,
    #[serde(rename = "resumes")]
    Resume,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::CoverLetter, DocumentKind::Resume];

    /// Collection name as exposed at the store boundary.
    pub fn collection(&self) -> &'static str {
        match self {
            DocumentKind::CoverLetter => "coverLetters",
            DocumentKind::Resume => "resumes",
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        match name {
            "coverLetters" => Some(DocumentKind::CoverLetter),
            "resumes" => Some(DocumentKind::Resume),
            _ => None,
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            DocumentKind::CoverLetter => "cover_letters",
            DocumentKind::Resume => "resumes",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Where a job description fragment came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    /// Passive capture by the page scraper.
    Scrape,
    /// Explicit user selection.
    Highlight,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::Scrape => "scrape",
            JobSource::Highlight => "highlight",
        }
    }
}

/// Font recorded alongside a generated letter; used by the PDF renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Font {
    #[default]
    Helvetica,
    Times,
}

impl Font {
    pub fn as_str(&self) -> &'static str {
        match self {
            Font::Helvetica => "helvetica",
            Font::Times => "times",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "helvetica" => Some(Font::Helvetica),
            "times" => Some(Font::Times),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Enthusiastic,
    Confident,
    Friendly,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Enthusiastic => "enthusiastic",
            Tone::Confident => "confident",
            Tone::Friendly => "friendly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" => Some(Tone::Professional),
            "enthusiastic" => Some(Tone::Enthusiastic),
            "confident" => Some(Tone::Confident),
            "friendly" => Some(Tone::Friendly),
            _ => None,
        }
    }
}
