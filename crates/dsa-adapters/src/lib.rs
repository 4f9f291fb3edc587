//! Platform adapter contracts + the four problem-listing fetchers.
//!
//! Each adapter splits its work into an async `list_problems` that does the
//! network round trips and a set of pure `parse_*` functions that turn a
//! response body into drafts. The parse functions are what the tests drive.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dsa_core::{
    codeforces_problem_url, leetcode_problem_url, Platform, ProblemDraft, DEFAULT_DIFFICULTY,
    DEFAULT_POINTS,
};
use dsa_storage::{FetchError, HttpFetcher};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "dsa-adapters";

pub const LEETCODE_API_URL: &str = "https://leetcode.com/api/problems/all/";
pub const CODEFORCES_API_URL: &str = "https://codeforces.com/api/problemset.problems";
pub const GFG_BASE_URL: &str = "https://practice.geeksforgeeks.org";
pub const INTERVIEWBIT_BASE_URL: &str = "https://www.interviewbit.com";
pub const INTERVIEWBIT_ARRAYS_PATH: &str = "/courses/programming/arrays/";

/// Every InterviewBit problem comes from the arrays track.
pub const INTERVIEWBIT_DEFAULT_TAG: &str = "Arrays";

const JSON_HEADERS: &[(&str, &str)] = &[("Accept", "application/json")];
const HTML_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crawlability {
    Api,
    PublicHtml,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

impl AdapterContext {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            fetched_at: Utc::now(),
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.fetched_at).num_milliseconds()
    }
}

/// Extra fields scraped from a single problem page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub difficulty: Option<String>,
    pub points: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("decoding response body: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;
    fn crawlability(&self) -> Crawlability;

    /// Fetch the platform's listing. An unreachable site yields an empty
    /// sequence; only structural failures come back as `Err`.
    async fn list_problems(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<ProblemDraft>, AdapterError>;

    async fn problem_details(
        &self,
        http: &HttpFetcher,
        url: &str,
    ) -> Result<ProblemDetails, AdapterError>;
}

/// Pacing knobs for the HTML scrapers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    pub gfg_max_pages: u32,
    pub gfg_problem_delay: Duration,
    pub gfg_page_delay: Duration,
    pub interviewbit_problem_delay: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            gfg_max_pages: 5,
            gfg_problem_delay: Duration::from_secs(2),
            gfg_page_delay: Duration::from_secs(3),
            interviewbit_problem_delay: Duration::from_secs(1),
        }
    }
}

pub fn adapter_for_platform(
    platform: Platform,
    settings: &AdapterSettings,
) -> Box<dyn PlatformAdapter> {
    match platform {
        Platform::LeetCode => Box::new(LeetCodeAdapter::default()),
        Platform::Codeforces => Box::new(CodeforcesAdapter::default()),
        Platform::GeeksforGeeks => Box::new(GeeksforGeeksAdapter::new(
            settings.gfg_max_pages,
            settings.gfg_problem_delay,
            settings.gfg_page_delay,
        )),
        Platform::InterviewBit => Box::new(InterviewBitAdapter::new(
            settings.interviewbit_problem_delay,
        )),
    }
}

/// All adapters in registration order.
pub fn default_adapters(settings: &AdapterSettings) -> Vec<Box<dyn PlatformAdapter>> {
    Platform::ALL
        .into_iter()
        .map(|platform| adapter_for_platform(platform, settings))
        .collect()
}

// ---------------------------------------------------------------------------
// selector helpers

fn parse_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn text_or_none(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn select_first_text(document: &Html, selector: &str) -> Result<Option<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|n| text_or_none(element_text(n))))
}

fn select_all_texts(document: &Html, selector: &str) -> Result<Vec<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(document
        .select(&sel)
        .filter_map(|n| text_or_none(element_text(n)))
        .collect())
}

/// First run of ASCII digits in `text`, e.g. `"Solved by 1,204"` gives `"1"`.
pub fn first_integer(text: &str) -> Option<String> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    Some(
        text[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect(),
    )
}

/// Ordered fallback selectors. The first selector that matches any element
/// wins, whatever that element's text turns out to be.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    pub fn parse(selectors: &[&str]) -> Result<Self, AdapterError> {
        let selectors = selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors
            .iter()
            .find_map(|selector| scope.select(selector).next())
    }

    /// Trimmed text of the first match. `Some("")` means an element matched
    /// but carried no text; `None` means nothing matched.
    pub fn first_text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.first(scope).map(element_text)
    }

    /// Every element matched by the first selector that matches anything.
    pub fn all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.selectors
            .iter()
            .map(|selector| scope.select(selector).collect::<Vec<_>>())
            .find(|matches| !matches.is_empty())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// LeetCode

#[derive(Debug, Deserialize)]
struct LeetCodeListing {
    #[serde(default)]
    stat_status_pairs: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct LeetCodeEntry {
    stat: LeetCodeStat,
    difficulty: LeetCodeLevel,
    #[serde(default)]
    paid_only: bool,
}

#[derive(Debug, Deserialize)]
struct LeetCodeStat {
    #[serde(rename = "question__title")]
    title: String,
    #[serde(rename = "question__title_slug")]
    slug: String,
}

#[derive(Debug, Deserialize)]
struct LeetCodeLevel {
    level: i64,
}

pub fn leetcode_difficulty(level: i64) -> &'static str {
    match level {
        1 => "Easy",
        2 => "Medium",
        3 => "Hard",
        _ => DEFAULT_DIFFICULTY,
    }
}

/// Free problems from the `api/problems/all` payload. Entries that fail to
/// decode are logged and skipped.
pub fn parse_leetcode_listing(body: &str) -> Result<Vec<ProblemDraft>, AdapterError> {
    let listing: LeetCodeListing = serde_json::from_str(body)?;
    let mut drafts = Vec::with_capacity(listing.stat_status_pairs.len());
    for (position, raw) in listing.stat_status_pairs.into_iter().enumerate() {
        let entry: LeetCodeEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(platform = "leetcode", position, error = %err, "skipping malformed entry");
                continue;
            }
        };
        if entry.paid_only {
            continue;
        }
        let mut draft = ProblemDraft::new(
            Platform::LeetCode,
            entry.stat.title,
            leetcode_problem_url(&entry.stat.slug),
        );
        draft.difficulty = Some(leetcode_difficulty(entry.difficulty.level).to_string());
        drafts.push(draft);
    }
    Ok(drafts)
}

#[derive(Debug, Clone)]
pub struct LeetCodeAdapter {
    api_url: String,
}

impl LeetCodeAdapter {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

impl Default for LeetCodeAdapter {
    fn default() -> Self {
        Self::new(LEETCODE_API_URL)
    }
}

#[async_trait]
impl PlatformAdapter for LeetCodeAdapter {
    fn platform(&self) -> Platform {
        Platform::LeetCode
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Api
    }

    async fn list_problems(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<ProblemDraft>, AdapterError> {
        let body = match http.fetch_text(&self.api_url, &[]).await {
            Ok(resp) => resp.body,
            Err(err) => {
                warn!(platform = "leetcode", run_id = %ctx.run_id, error = %err, "listing unavailable");
                return Ok(Vec::new());
            }
        };
        match parse_leetcode_listing(&body) {
            Ok(drafts) => {
                info!(platform = "leetcode", run_id = %ctx.run_id, count = drafts.len(), "parsed listing");
                Ok(drafts)
            }
            Err(err) => {
                warn!(platform = "leetcode", error = %err, "listing body could not be decoded");
                Ok(Vec::new())
            }
        }
    }

    async fn problem_details(
        &self,
        _http: &HttpFetcher,
        url: &str,
    ) -> Result<ProblemDetails, AdapterError> {
        debug!(platform = "leetcode", url, "no detail enrichment for this platform");
        Ok(ProblemDetails::default())
    }
}

// ---------------------------------------------------------------------------
// Codeforces

#[derive(Debug, Deserialize)]
struct CodeforcesEnvelope {
    status: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    result: Option<CodeforcesProblemset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeforcesProblemset {
    #[serde(default)]
    problems: Vec<JsonValue>,
    #[serde(default)]
    problem_statistics: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeforcesProblem {
    contest_id: i64,
    index: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rating: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeforcesStatistic {
    contest_id: i64,
    index: String,
    solved_count: i64,
}

/// Problems from `problemset.problems`, with each problem's solved count
/// looked up from the parallel statistics array.
pub fn parse_codeforces_listing(body: &str) -> Result<Vec<ProblemDraft>, AdapterError> {
    let envelope: CodeforcesEnvelope = serde_json::from_str(body)?;
    if envelope.status != "OK" {
        return Err(AdapterError::Message(format!(
            "codeforces api returned status {}: {}",
            envelope.status,
            envelope.comment.unwrap_or_default()
        )));
    }
    let Some(problemset) = envelope.result else {
        return Err(AdapterError::Message(
            "codeforces api response has no result".to_string(),
        ));
    };

    let mut solved_counts: HashMap<(i64, String), i64> = HashMap::new();
    for raw in problemset.problem_statistics {
        match serde_json::from_value::<CodeforcesStatistic>(raw) {
            Ok(stat) => {
                solved_counts
                    .entry((stat.contest_id, stat.index))
                    .or_insert(stat.solved_count);
            }
            Err(err) => {
                warn!(platform = "codeforces", error = %err, "skipping malformed statistic");
            }
        }
    }

    let mut drafts = Vec::with_capacity(problemset.problems.len());
    for (position, raw) in problemset.problems.into_iter().enumerate() {
        let problem: CodeforcesProblem = match serde_json::from_value(raw) {
            Ok(problem) => problem,
            Err(err) => {
                warn!(platform = "codeforces", position, error = %err, "skipping malformed problem");
                continue;
            }
        };
        let Some(name) = problem.name.filter(|n| !n.trim().is_empty()) else {
            debug!(platform = "codeforces", contest_id = problem.contest_id, index = %problem.index, "skipping nameless problem");
            continue;
        };

        let points = solved_counts
            .get(&(problem.contest_id, problem.index.clone()))
            .map(|count| count.to_string());
        let mut draft = ProblemDraft::new(
            Platform::Codeforces,
            format!("{}{} - {}", problem.contest_id, problem.index, name),
            codeforces_problem_url(problem.contest_id, &problem.index),
        );
        draft.difficulty = Some(
            problem
                .rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        );
        draft.points = Some(points.unwrap_or_else(|| DEFAULT_POINTS.to_string()));
        draft.tags = problem.tags;
        drafts.push(draft);
    }
    Ok(drafts)
}

/// Tags and statement text from a problem page.
pub fn parse_codeforces_problem_page(html: &str) -> Result<ProblemDetails, AdapterError> {
    let document = Html::parse_document(html);
    Ok(ProblemDetails {
        tags: select_all_texts(&document, "span.tag-box")?,
        description: select_first_text(&document, "div.problem-statement div:not([class])")?,
        ..ProblemDetails::default()
    })
}

#[derive(Debug, Clone)]
pub struct CodeforcesAdapter {
    api_url: String,
}

impl CodeforcesAdapter {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

impl Default for CodeforcesAdapter {
    fn default() -> Self {
        Self::new(CODEFORCES_API_URL)
    }
}

#[async_trait]
impl PlatformAdapter for CodeforcesAdapter {
    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Api
    }

    async fn list_problems(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<ProblemDraft>, AdapterError> {
        let body = match http.fetch_text(&self.api_url, JSON_HEADERS).await {
            Ok(resp) => resp.body,
            Err(err) => {
                warn!(platform = "codeforces", run_id = %ctx.run_id, error = %err, "listing unavailable");
                return Ok(Vec::new());
            }
        };
        match parse_codeforces_listing(&body) {
            Ok(drafts) => {
                info!(platform = "codeforces", run_id = %ctx.run_id, count = drafts.len(), "parsed listing");
                Ok(drafts)
            }
            Err(err) => {
                warn!(platform = "codeforces", error = %err, "listing rejected");
                Ok(Vec::new())
            }
        }
    }

    async fn problem_details(
        &self,
        http: &HttpFetcher,
        url: &str,
    ) -> Result<ProblemDetails, AdapterError> {
        match http.fetch_text(url, HTML_HEADERS).await {
            Ok(resp) => parse_codeforces_problem_page(&resp.body),
            Err(err) => {
                warn!(platform = "codeforces", url, error = %err, "problem page unavailable");
                Ok(ProblemDetails::default())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GeeksforGeeks

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub title: String,
    pub url: String,
}

/// Problem links on one `explore` page. Anchors without `href` are skipped.
pub fn parse_gfg_listing_page(html: &str, base_url: &str) -> Result<Vec<ListingLink>, AdapterError> {
    let document = Html::parse_document(html);
    let selector = parse_selector("a.problem-title")?;
    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        let title = element_text(anchor);
        let Some(href) = anchor.value().attr("href") else {
            warn!(platform = "geeksforgeeks", title = %title, "problem link has no href; skipping");
            continue;
        };
        links.push(ListingLink {
            title,
            url: format!("{base_url}{href}"),
        });
    }
    Ok(links)
}

pub fn parse_gfg_problem_page(html: &str) -> Result<ProblemDetails, AdapterError> {
    let document = Html::parse_document(html);
    let points = select_first_text(&document, "div.solved-count")?
        .and_then(|text| first_integer(&text));
    Ok(ProblemDetails {
        difficulty: select_first_text(&document, "span.problem-difficulty")?,
        points,
        tags: select_all_texts(&document, "div.problem-tags a")?,
        description: None,
    })
}

#[derive(Debug, Clone)]
pub struct GeeksforGeeksAdapter {
    base_url: String,
    explore_url: String,
    max_pages: u32,
    problem_delay: Duration,
    page_delay: Duration,
}

impl GeeksforGeeksAdapter {
    pub fn new(max_pages: u32, problem_delay: Duration, page_delay: Duration) -> Self {
        Self {
            base_url: GFG_BASE_URL.to_string(),
            explore_url: format!("{GFG_BASE_URL}/explore"),
            max_pages,
            problem_delay,
            page_delay,
        }
    }

    /// Point listing and problem links at another host, e.g. a mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        self.explore_url = format!("{base_url}/explore");
        self.base_url = base_url;
        self
    }
}

impl Default for GeeksforGeeksAdapter {
    fn default() -> Self {
        let settings = AdapterSettings::default();
        Self::new(
            settings.gfg_max_pages,
            settings.gfg_problem_delay,
            settings.gfg_page_delay,
        )
    }
}

#[async_trait]
impl PlatformAdapter for GeeksforGeeksAdapter {
    fn platform(&self) -> Platform {
        Platform::GeeksforGeeks
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::PublicHtml
    }

    async fn list_problems(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<ProblemDraft>, AdapterError> {
        let mut drafts = Vec::new();
        for page in 1..=self.max_pages {
            let url = format!("{}?page={page}", self.explore_url);
            let body = match http.fetch_text(&url, HTML_HEADERS).await {
                Ok(resp) => resp.body,
                Err(err) => {
                    warn!(platform = "geeksforgeeks", run_id = %ctx.run_id, page, error = %err, "listing page unavailable; stopping");
                    break;
                }
            };
            let links = parse_gfg_listing_page(&body, &self.base_url)?;
            if links.is_empty() {
                info!(platform = "geeksforgeeks", run_id = %ctx.run_id, page, "no problems on page; stopping");
                break;
            }

            for link in links {
                let details = self.problem_details(http, &link.url).await?;
                debug!(platform = "geeksforgeeks", title = %link.title, "found problem");
                drafts.push(ProblemDraft {
                    platform: Platform::GeeksforGeeks,
                    title: link.title,
                    url: link.url,
                    difficulty: details.difficulty,
                    points: details.points,
                    tags: details.tags,
                });
                tokio::time::sleep(self.problem_delay).await;
            }
            tokio::time::sleep(self.page_delay).await;
        }
        info!(
            platform = "geeksforgeeks",
            run_id = %ctx.run_id,
            count = drafts.len(),
            elapsed_ms = ctx.elapsed_ms(),
            "listing complete"
        );
        Ok(drafts)
    }

    async fn problem_details(
        &self,
        http: &HttpFetcher,
        url: &str,
    ) -> Result<ProblemDetails, AdapterError> {
        match http.fetch_text(url, HTML_HEADERS).await {
            Ok(resp) => parse_gfg_problem_page(&resp.body),
            Err(err) => {
                warn!(platform = "geeksforgeeks", url, error = %err, "problem page unavailable");
                Ok(ProblemDetails::default())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// InterviewBit

/// The page markup has shifted over time, so every field is looked up
/// through a fallback chain.
#[derive(Debug, Clone)]
pub struct InterviewBitSelectors {
    pub sections: SelectorChain,
    pub title: SelectorChain,
    pub difficulty: SelectorChain,
    pub points: SelectorChain,
    pub detail_tags: SelectorChain,
    pub description: SelectorChain,
}

impl InterviewBitSelectors {
    pub fn new() -> Result<Self, AdapterError> {
        Ok(Self {
            sections: SelectorChain::parse(&["div.problem-section", "div.problem", "div.question"])?,
            title: SelectorChain::parse(&["a.problem-title", "a.question-title", "h3"])?,
            difficulty: SelectorChain::parse(&["span.difficulty", "span.level", "div.difficulty"])?,
            points: SelectorChain::parse(&["span.points", "span.score", "div.points"])?,
            detail_tags: SelectorChain::parse(&["div.problem-tags", "div.question-tags", "div.tags"])?,
            description: SelectorChain::parse(&[
                "div.problem-description",
                "div.question-description",
                "div.content",
            ])?,
        })
    }
}

pub fn parse_interviewbit_listing(
    html: &str,
    base_url: &str,
) -> Result<Vec<ProblemDraft>, AdapterError> {
    let selectors = InterviewBitSelectors::new()?;
    let document = Html::parse_document(html);
    let sections = selectors.sections.all(document.root_element());
    if sections.is_empty() {
        warn!(platform = "interviewbit", "no problem sections on page");
    }

    let mut drafts = Vec::with_capacity(sections.len());
    for (position, section) in sections.into_iter().enumerate() {
        let Some(title_element) = selectors.title.first(section) else {
            warn!(platform = "interviewbit", position, "section has no title element; skipping");
            continue;
        };
        let href = title_element.value().attr("href").unwrap_or_default();
        let mut draft = ProblemDraft::new(
            Platform::InterviewBit,
            element_text(title_element),
            format!("{base_url}{href}"),
        );
        draft.difficulty = Some(
            selectors
                .difficulty
                .first_text(section)
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        );
        draft.points = Some(
            selectors
                .points
                .first_text(section)
                .unwrap_or_else(|| DEFAULT_POINTS.to_string()),
        );
        draft.tags = vec![INTERVIEWBIT_DEFAULT_TAG.to_string()];
        drafts.push(draft);
    }
    Ok(drafts)
}

/// Detail tags always start with the arrays default.
pub fn parse_interviewbit_problem_page(html: &str) -> Result<ProblemDetails, AdapterError> {
    let selectors = InterviewBitSelectors::new()?;
    let anchors = parse_selector("a")?;
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut tags = vec![INTERVIEWBIT_DEFAULT_TAG.to_string()];
    if let Some(container) = selectors.detail_tags.first(root) {
        tags.extend(
            container
                .select(&anchors)
                .filter_map(|a| text_or_none(element_text(a))),
        );
    }
    Ok(ProblemDetails {
        tags,
        description: selectors.description.first_text(root).and_then(text_or_none),
        ..ProblemDetails::default()
    })
}

#[derive(Debug, Clone)]
pub struct InterviewBitAdapter {
    base_url: String,
    arrays_url: String,
    problem_delay: Duration,
}

impl InterviewBitAdapter {
    pub fn new(problem_delay: Duration) -> Self {
        Self::default().with_problem_delay(problem_delay)
    }

    pub fn with_problem_delay(mut self, problem_delay: Duration) -> Self {
        self.problem_delay = problem_delay;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        self.arrays_url = format!("{base_url}{INTERVIEWBIT_ARRAYS_PATH}");
        self.base_url = base_url;
        self
    }
}

impl Default for InterviewBitAdapter {
    fn default() -> Self {
        Self {
            base_url: INTERVIEWBIT_BASE_URL.to_string(),
            arrays_url: format!("{INTERVIEWBIT_BASE_URL}{INTERVIEWBIT_ARRAYS_PATH}"),
            problem_delay: AdapterSettings::default().interviewbit_problem_delay,
        }
    }
}

#[async_trait]
impl PlatformAdapter for InterviewBitAdapter {
    fn platform(&self) -> Platform {
        Platform::InterviewBit
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::PublicHtml
    }

    async fn list_problems(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<Vec<ProblemDraft>, AdapterError> {
        let body = match http.fetch_text(&self.arrays_url, HTML_HEADERS).await {
            Ok(resp) => resp.body,
            Err(err) => {
                warn!(platform = "interviewbit", run_id = %ctx.run_id, error = %err, "listing unavailable");
                return Ok(Vec::new());
            }
        };
        let mut drafts = parse_interviewbit_listing(&body, &self.base_url)?;

        for draft in &mut drafts {
            // Entries without a link point at the site root; nothing to enrich.
            if draft.url != self.base_url {
                let details = self.problem_details(http, &draft.url).await?;
                draft.tags = details.tags;
            }
            tokio::time::sleep(self.problem_delay).await;
        }
        info!(
            platform = "interviewbit",
            run_id = %ctx.run_id,
            count = drafts.len(),
            elapsed_ms = ctx.elapsed_ms(),
            "listing complete"
        );
        Ok(drafts)
    }

    async fn problem_details(
        &self,
        http: &HttpFetcher,
        url: &str,
    ) -> Result<ProblemDetails, AdapterError> {
        match http.fetch_text(url, HTML_HEADERS).await {
            Ok(resp) => parse_interviewbit_problem_page(&resp.body),
            Err(err) => {
                warn!(platform = "interviewbit", url, error = %err, "problem page unavailable");
                Ok(ProblemDetails {
                    tags: vec![INTERVIEWBIT_DEFAULT_TAG.to_string()],
                    ..ProblemDetails::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leetcode_levels_map_to_labels() {
        assert_eq!(leetcode_difficulty(1), "Easy");
        assert_eq!(leetcode_difficulty(2), "Medium");
        assert_eq!(leetcode_difficulty(3), "Hard");
        assert_eq!(leetcode_difficulty(0), "Unknown");
        assert_eq!(leetcode_difficulty(4), "Unknown");
    }

    #[test]
    fn leetcode_undecodable_body_is_an_error() {
        assert!(matches!(
            parse_leetcode_listing("<html>rate limited</html>"),
            Err(AdapterError::Json(_))
        ));
    }

    #[test]
    fn leetcode_empty_listing_yields_no_drafts() {
        let drafts = parse_leetcode_listing(r#"{"stat_status_pairs": []}"#).expect("parse");
        assert!(drafts.is_empty());
    }

    #[test]
    fn codeforces_failed_status_is_rejected() {
        let err = parse_codeforces_listing(r#"{"status":"FAILED","comment":"Call limit exceeded"}"#)
            .expect_err("failed status");
        assert!(err.to_string().contains("Call limit exceeded"));
    }

    #[test]
    fn codeforces_problem_without_statistic_defaults_points() {
        let body = r#"{"status":"OK","result":{"problems":[
            {"contestId":1,"index":"A","name":"Theatre Square","rating":1000,"tags":["math"]}
        ],"problemStatistics":[]}}"#;
        let drafts = parse_codeforces_listing(body).expect("parse");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "1A - Theatre Square");
        assert_eq!(drafts[0].points.as_deref(), Some("0"));
        assert_eq!(drafts[0].difficulty.as_deref(), Some("1000"));
    }

    #[test]
    fn first_integer_takes_leading_digit_run() {
        assert_eq!(first_integer("Solved by 1,204 users"), Some("1".to_string()));
        assert_eq!(first_integer("42 today"), Some("42".to_string()));
        assert_eq!(first_integer("no digits"), None);
    }

    #[test]
    fn selector_chain_prefers_earlier_selector_even_when_empty() {
        let document = Html::parse_document(
            r#"<div><span class="difficulty"></span><span class="level">Hard</span></div>"#,
        );
        let chain = SelectorChain::parse(&["span.difficulty", "span.level"]).expect("chain");
        assert_eq!(chain.first_text(document.root_element()), Some(String::new()));
    }

    #[test]
    fn selector_chain_falls_through_to_later_selector() {
        let document = Html::parse_document(r#"<div><span class="level">Hard</span></div>"#);
        let chain = SelectorChain::parse(&["span.difficulty", "span.level"]).expect("chain");
        assert_eq!(chain.first_text(document.root_element()), Some("Hard".to_string()));

        let missing = SelectorChain::parse(&["span.points"]).expect("chain");
        assert_eq!(missing.first_text(document.root_element()), None);
    }

    #[test]
    fn selector_chain_rejects_invalid_selector() {
        assert!(matches!(
            SelectorChain::parse(&["div..broken"]),
            Err(AdapterError::Selector { .. })
        ));
    }

    #[test]
    fn interviewbit_detail_without_tags_keeps_default() {
        let details = parse_interviewbit_problem_page("<html><body><p>nothing</p></body></html>")
            .expect("parse");
        assert_eq!(details.tags, vec!["Arrays".to_string()]);
        assert_eq!(details.description, None);
    }

    #[test]
    fn gfg_detail_without_markup_leaves_fields_unset() {
        let details = parse_gfg_problem_page("<html><body></body></html>").expect("parse");
        assert_eq!(details, ProblemDetails::default());
    }

    #[test]
    fn context_elapsed_counts_from_creation() {
        let ctx = AdapterContext {
            run_id: Uuid::new_v4(),
            fetched_at: Utc::now() - chrono::Duration::milliseconds(250),
        };
        assert!(ctx.elapsed_ms() >= 250);
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let adapter = InterviewBitAdapter::default().with_base_url("http://127.0.0.1:8080/");
        assert_eq!(adapter.base_url, "http://127.0.0.1:8080");
        assert_eq!(
            adapter.arrays_url,
            "http://127.0.0.1:8080/courses/programming/arrays/"
        );
    }

    #[test]
    fn default_adapters_follow_registration_order() {
        let adapters = default_adapters(&AdapterSettings::default());
        let platforms: Vec<Platform> = adapters.iter().map(|a| a.platform()).collect();
        assert_eq!(platforms, Platform::ALL.to_vec());
        assert_eq!(adapters[0].crawlability(), Crawlability::Api);
        assert_eq!(adapters[3].crawlability(), Crawlability::PublicHtml);
    }
}
