//! Data models for Lesson Prefetch
//!
//! This module defines the content descriptors produced by the catalog and
//! the selection filter used to query it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language a content chunk is published in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Bangla,
    English,
}

impl Language {
    /// Wire representation used in catalog queries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bangla => "bangla",
            Self::English => "english",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bangla" | "bn" => Ok(Self::Bangla),
            "english" | "en" => Ok(Self::English),
            other => Err(format!(
                "unknown language '{}', expected 'bangla' or 'english'",
                other
            )),
        }
    }
}

/// Immutable descriptor of one downloadable content chunk
///
/// Produced only by the content catalog; the queue never alters it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadableContent {
    /// Unique content identifier
    pub id: String,
    /// Subject name (e.g., "physics")
    pub subject: String,
    /// School grade
    pub grade: u32,
    /// Chapter number within the textbook
    pub chapter: u32,
    /// Topic within the chapter
    pub topic: String,
    /// Display title
    pub title: String,
    /// Size of the chunk in bytes
    pub size: u64,
    /// Publication language
    pub language: Language,
    /// Name of the source textbook
    pub textbook_name: String,
    /// Page in the textbook where the chunk starts
    pub page_number: u32,
}

/// Filter sent to the catalog when listing available content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSelection {
    pub subject: String,
    pub grade: u32,
    pub language: Language,
    pub chapter: Option<u32>,
    pub topic: Option<String>,
}

impl ContentSelection {
    /// Create a selection for a subject, grade and language
    pub fn new(subject: impl Into<String>, grade: u32, language: Language) -> Self {
        Self {
            subject: subject.into(),
            grade,
            language,
            chapter: None,
            topic: None,
        }
    }

    /// Narrow the selection to one chapter
    pub fn with_chapter(mut self, chapter: u32) -> Self {
        self.chapter = Some(chapter);
        self
    }

    /// Narrow the selection to one topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Query parameters in catalog order; optional filters are omitted when unset
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("subject", self.subject.clone()),
            ("grade", self.grade.to_string()),
            ("language", self.language.to_string()),
        ];
        if let Some(chapter) = self.chapter {
            pairs.push(("chapter", chapter.to_string()));
        }
        if let Some(topic) = &self.topic {
            pairs.push(("topic", topic.clone()));
        }
        pairs
    }
}

/// Catalog response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub content: Vec<DownloadableContent>,
}
