//! Core domain model for the DSA problem aggregator: platforms, normalized
//! problem records, the tag codec and the problem URL identifier.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const CRATE_NAME: &str = "dsa-core";

/// Separator used when a tag list is flattened into a single text column.
pub const TAG_DELIMITER: char = ',';

pub const DEFAULT_DIFFICULTY: &str = "Unknown";
pub const DEFAULT_POINTS: &str = "0";

pub const LEETCODE_BASE_URL: &str = "https://leetcode.com";
pub const CODEFORCES_BASE_URL: &str = "https://codeforces.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LeetCode,
    Codeforces,
    GeeksforGeeks,
    InterviewBit,
}

impl Platform {
    /// Registration order used by every ingestion run.
    pub const ALL: [Platform; 4] = [
        Platform::LeetCode,
        Platform::Codeforces,
        Platform::GeeksforGeeks,
        Platform::InterviewBit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeetCode => "leetcode",
            Self::Codeforces => "codeforces",
            Self::GeeksforGeeks => "geeksforgeeks",
            Self::InterviewBit => "interviewbit",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported platform: {0}")]
pub struct PlatformParseError(pub String);

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PlatformParseError(wanted.to_string()))
    }
}

/// Unvalidated record as yielded by a platform fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDraft {
    pub platform: Platform,
    pub title: String,
    pub url: String,
    pub difficulty: Option<String>,
    pub points: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProblemDraft {
    pub fn new(platform: Platform, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform,
            title: title.into(),
            url: url.into(),
            difficulty: None,
            points: None,
            tags: Vec::new(),
        }
    }

    /// Apply field defaults and reject drafts that cannot be reconciled.
    pub fn normalize(self, expected: Platform) -> Result<NewProblem, DraftError> {
        if self.platform != expected {
            return Err(DraftError::PlatformMismatch {
                expected,
                actual: self.platform,
            });
        }
        if self.title.trim().is_empty() {
            return Err(DraftError::MissingTitle);
        }
        Ok(NewProblem {
            title: self.title,
            platform: self.platform,
            difficulty: self
                .difficulty
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
            url: self.url,
            points: self.points.unwrap_or_else(|| DEFAULT_POINTS.to_string()),
            tags: self.tags,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("record has no title")]
    MissingTitle,
    #[error("record platform {actual} does not match fetcher platform {expected}")]
    PlatformMismatch { expected: Platform, actual: Platform },
}

/// Normalized record ready to be written; `(platform, title)` is its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProblem {
    pub title: String,
    pub platform: Platform,
    pub difficulty: String,
    pub url: String,
    pub points: String,
    pub tags: Vec<String>,
}

/// Persisted problem row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: i64,
    pub title: String,
    pub platform: Platform,
    pub difficulty: String,
    pub url: String,
    pub points: String,
    pub tags: Vec<String>,
}

/// Flatten tags into the stored column. A delimiter inside a tag becomes `;`
/// and blank tags are dropped so that `decode_tags` reproduces the list.
pub fn encode_tags(tags: &[String]) -> String {
    let separator = TAG_DELIMITER.to_string();
    tags.iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.replace(TAG_DELIMITER, ";"))
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

pub fn decode_tags(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    stored.split(TAG_DELIMITER).map(ToString::to_string).collect()
}

/// Platform-native identifier extracted from a problem URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemIdentifier {
    pub platform: Platform,
    pub id: String,
}

impl ProblemIdentifier {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }

    /// URL in the exact form fetchers store it, used for exact-match lookup.
    pub fn canonical_url(&self) -> Option<String> {
        match self.platform {
            Platform::LeetCode => Some(leetcode_problem_url(&self.id)),
            Platform::Codeforces => {
                let (contest, index) = self.id.split_once('/')?;
                Some(codeforces_problem_url(contest, index))
            }
            Platform::GeeksforGeeks | Platform::InterviewBit => None,
        }
    }
}

pub fn leetcode_problem_url(slug: &str) -> String {
    format!("{LEETCODE_BASE_URL}/problems/{slug}/")
}

pub fn codeforces_problem_url(contest_id: impl fmt::Display, index: &str) -> String {
    format!("{CODEFORCES_BASE_URL}/problemset/problem/{contest_id}/{index}")
}

/// Classify a problem URL. Anything unparseable or unrecognized yields `None`.
pub fn identify_problem_url(input: &str) -> Option<ProblemIdentifier> {
    let cleaned = input.trim().trim_end_matches('/');
    let parsed = Url::parse(cleaned).ok()?;
    let host = parsed.host_str()?;
    let path = parsed.path();

    if host.contains("leetcode.com") {
        let (_, rest) = path.split_once("/problems/")?;
        let slug = rest.split('/').next().filter(|s| !s.is_empty())?;
        return Some(ProblemIdentifier::new(Platform::LeetCode, slug));
    }

    if host.contains("codeforces.com") {
        let (_, rest) = path.split_once("/problemset/problem/")?;
        let mut segments = rest.split('/');
        let contest = segments.next().filter(|s| !s.is_empty())?;
        let letter = segments.next().filter(|s| !s.is_empty())?;
        return Some(ProblemIdentifier::new(
            Platform::Codeforces,
            format!("{contest}/{letter}"),
        ));
    }

    None
}

/// Per-platform ingestion outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub total: usize,
    pub new: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

impl PlatformOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub platforms: BTreeMap<Platform, PlatformOutcome>,
}
