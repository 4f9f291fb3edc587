//! HTTP fetch client + relational problem store for the DSA aggregator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use dsa_core::{decode_tags, encode_tags, NewProblem, Platform, PlatformParseError, ProblemRecord};
use reqwest::StatusCode;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

pub const CRATE_NAME: &str = "dsa-storage";

/// Identity header sent with every platform request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: Some(BROWSER_USER_AGENT.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    /// Single GET with no retry. Any transport error or non-2xx status comes
    /// back as a `FetchError`; callers treat it as "no data".
    pub async fn fetch_text(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", url);
        async move {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let resp = request.send().await.inspect_err(|err| {
                warn!(error = %err, "request failed");
            })?;
            let status = resp.status();
            let final_url = resp.url().to_string();

            if !status.is_success() {
                warn!(status = status.as_u16(), "non-success status");
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.text().await?;
            debug!(bytes = body.len(), "fetched");
            Ok(FetchedResponse {
                status,
                final_url,
                body,
            })
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("row {id} has an invalid platform: {source}")]
    CorruptRow {
        id: i64,
        source: PlatformParseError,
    },
    #[error("batch already committed or rolled back")]
    BatchClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_problems: i64,
    pub problems_by_platform: BTreeMap<String, i64>,
    pub problems_by_difficulty: BTreeMap<String, i64>,
    pub tables: Vec<String>,
    pub problem_table_columns: Vec<String>,
}

/// Read side of the store plus the entry point for write batches.
#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn begin_batch(&self) -> Result<Box<dyn ProblemBatch>, StoreError>;

    async fn list_problems(&self, platform: Option<Platform>) -> Result<Vec<ProblemRecord>, StoreError>;

    async fn find_by_url(&self, platform: Platform, url: &str) -> Result<Option<ProblemRecord>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Backing file, when the store lives on disk.
    fn database_path(&self) -> Option<&Path>;
}

/// One all-or-nothing unit of writes.
///
/// Natural-key lookups only see rows that existed when the batch began, so
/// two drafts with the same title in one batch are both inserted.
#[async_trait]
pub trait ProblemBatch: Send {
    async fn find_by_natural_key(&mut self, platform: Platform, title: &str) -> Result<Option<i64>, StoreError>;

    async fn insert(&mut self, problem: &NewProblem) -> Result<i64, StoreError>;

    /// Overwrite difficulty, url, points and tags. Title and platform never change.
    async fn update(&mut self, id: i64, problem: &NewProblem) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;

    async fn upsert(&mut self, problem: &NewProblem) -> Result<UpsertOutcome, StoreError> {
        match self.find_by_natural_key(problem.platform, &problem.title).await? {
            Some(id) => {
                self.update(id, problem).await?;
                Ok(UpsertOutcome::Updated(id))
            }
            None => Ok(UpsertOutcome::Inserted(self.insert(problem).await?)),
        }
    }
}

#[derive(Debug, FromRow)]
struct ProblemRow {
    id: i64,
    title: String,
    platform: String,
    difficulty: Option<String>,
    url: Option<String>,
    points: Option<String>,
    tags: Option<String>,
}

impl ProblemRow {
    fn into_record(self) -> Result<ProblemRecord, StoreError> {
        let platform = Platform::from_str(&self.platform).map_err(|source| StoreError::CorruptRow {
            id: self.id,
            source,
        })?;
        Ok(ProblemRecord {
            id: self.id,
            title: self.title,
            platform,
            difficulty: self.difficulty.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            points: self.points.unwrap_or_default(),
            tags: decode_tags(self.tags.as_deref().unwrap_or_default()),
        })
    }
}

const SELECT_PROBLEM: &str = "SELECT id, title, platform, difficulty, url, points, tags FROM problem";

#[derive(Debug, Clone)]
pub struct SqliteProblemStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl SqliteProblemStore {
    /// Open (creating if needed) the database behind `database_url` and apply
    /// the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let path = sqlite_file_path(database_url);
        if let Some(parent) = path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { pool, path };
        store.migrate().await?;
        info!(path = ?store.path, "problem store ready");
        Ok(store)
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool, path: None };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let rest = rest.split('?').next().unwrap_or_default();
    if rest.is_empty() || rest == ":memory:" {
        None
    } else {
        Some(PathBuf::from(rest))
    }
}

#[async_trait]
impl ProblemStore for SqliteProblemStore {
    async fn begin_batch(&self) -> Result<Box<dyn ProblemBatch>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let baseline_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM problem")
            .fetch_one(&mut *tx)
            .await?;
        debug!(baseline_id, "batch started");
        Ok(Box::new(SqliteBatch {
            tx: Some(tx),
            baseline_id,
        }))
    }

    async fn list_problems(&self, platform: Option<Platform>) -> Result<Vec<ProblemRecord>, StoreError> {
        let rows: Vec<ProblemRow> = match platform {
            Some(platform) => {
                sqlx::query_as(&format!("{SELECT_PROBLEM} WHERE platform = ? ORDER BY id"))
                    .bind(platform.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as(&format!("{SELECT_PROBLEM} ORDER BY id"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(ProblemRow::into_record).collect()
    }

    async fn find_by_url(&self, platform: Platform, url: &str) -> Result<Option<ProblemRecord>, StoreError> {
        let row: Option<ProblemRow> = sqlx::query_as(&format!(
            "{SELECT_PROBLEM} WHERE platform = ? AND url = ? ORDER BY id LIMIT 1"
        ))
        .bind(platform.as_str())
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProblemRow::into_record).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_problems: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM problem")
            .fetch_one(&self.pool)
            .await?;

        let mut problems_by_platform = Platform::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), 0i64))
            .collect::<BTreeMap<_, _>>();
        let platform_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT platform, COUNT(*) FROM problem GROUP BY platform")
                .fetch_all(&self.pool)
                .await?;
        problems_by_platform.extend(platform_counts);

        let difficulty_counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT difficulty, COUNT(*) FROM problem \
             WHERE difficulty IS NOT NULL AND difficulty != '' \
             GROUP BY difficulty",
        )
        .fetch_all(&self.pool)
        .await?;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        let problem_table_columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('problem') ORDER BY cid")
                .fetch_all(&self.pool)
                .await?;

        Ok(StoreStats {
            total_problems,
            problems_by_platform,
            problems_by_difficulty: difficulty_counts.into_iter().collect(),
            tables,
            problem_table_columns,
        })
    }

    fn database_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

struct SqliteBatch {
    tx: Option<Transaction<'static, Sqlite>>,
    baseline_id: i64,
}

impl SqliteBatch {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::BatchClosed)
    }
}

#[async_trait]
impl ProblemBatch for SqliteBatch {
    async fn find_by_natural_key(&mut self, platform: Platform, title: &str) -> Result<Option<i64>, StoreError> {
        let baseline_id = self.baseline_id;
        let tx = self.tx()?;
        let id = sqlx::query_scalar(
            "SELECT id FROM problem WHERE platform = ? AND title = ? AND id <= ? ORDER BY id LIMIT 1",
        )
        .bind(platform.as_str())
        .bind(title)
        .bind(baseline_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn insert(&mut self, problem: &NewProblem) -> Result<i64, StoreError> {
        let tx = self.tx()?;
        let result = sqlx::query(
            "INSERT INTO problem (title, platform, difficulty, url, points, tags) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&problem.title)
        .bind(problem.platform.as_str())
        .bind(&problem.difficulty)
        .bind(&problem.url)
        .bind(&problem.points)
        .bind(encode_tags(&problem.tags))
        .execute(&mut **tx)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update(&mut self, id: i64, problem: &NewProblem) -> Result<(), StoreError> {
        let tx = self.tx()?;
        sqlx::query("UPDATE problem SET difficulty = ?, url = ?, points = ?, tags = ? WHERE id = ?")
            .bind(&problem.difficulty)
            .bind(&problem.url)
            .bind(&problem.points)
            .bind(encode_tags(&problem.tags))
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::BatchClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        // A transaction consumed by a failed commit has already been rolled back.
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn problem(platform: Platform, title: &str, url: &str, tags: &[&str]) -> NewProblem {
        NewProblem {
            title: title.to_string(),
            platform,
            difficulty: "Easy".to_string(),
            url: url.to_string(),
            points: "0".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn committed_rows_are_listed_with_tags_split_back() {
        let store = SqliteProblemStore::in_memory().await.unwrap();
        let mut batch = store.begin_batch().await.unwrap();
        batch
            .insert(&problem(Platform::LeetCode, "Two Sum", "https://leetcode.com/problems/two-sum/", &["Array", "DP"]))
            .await
            .unwrap();
        batch
            .insert(&problem(Platform::Codeforces, "4A - Watermelon", "https://codeforces.com/problemset/problem/4/A", &[]))
            .await
            .unwrap();
        batch.commit().await.unwrap();

        let all = store.list_problems(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tags, vec!["Array".to_string(), "DP".to_string()]);
        assert!(all[1].tags.is_empty());

        let leetcode = store.list_problems(Some(Platform::LeetCode)).await.unwrap();
        assert_eq!(leetcode.len(), 1);
        assert_eq!(leetcode[0].title, "Two Sum");
    }

    #[tokio::test]
    async fn rollback_discards_the_batch() {
        let store = SqliteProblemStore::in_memory().await.unwrap();
        let mut batch = store.begin_batch().await.unwrap();
        batch
            .insert(&problem(Platform::LeetCode, "Two Sum", "u", &[]))
            .await
            .unwrap();
        batch.rollback().await.unwrap();
        assert!(store.list_problems(None).await.unwrap().is_empty());
        assert!(matches!(batch.commit().await, Err(StoreError::BatchClosed)));
    }

    #[tokio::test]
    async fn natural_key_lookup_only_sees_rows_from_before_the_batch() {
        let store = SqliteProblemStore::in_memory().await.unwrap();
        let mut batch = store.begin_batch().await.unwrap();
        let first = batch.upsert(&problem(Platform::LeetCode, "Two Sum", "u", &[])).await.unwrap();
        let second = batch.upsert(&problem(Platform::LeetCode, "Two Sum", "u", &[])).await.unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));
        assert!(matches!(second, UpsertOutcome::Inserted(_)));
        batch.commit().await.unwrap();

        let mut batch = store.begin_batch().await.unwrap();
        let found = batch
            .find_by_natural_key(Platform::LeetCode, "Two Sum")
            .await
            .unwrap();
        assert_eq!(found, Some(1));
        assert_eq!(
            batch.find_by_natural_key(Platform::Codeforces, "Two Sum").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn update_overwrites_mutable_fields_only() {
        let store = SqliteProblemStore::in_memory().await.unwrap();
        let mut batch = store.begin_batch().await.unwrap();
        let id = batch
            .insert(&problem(Platform::GeeksforGeeks, "Kadane", "old", &["Array"]))
            .await
            .unwrap();
        batch.commit().await.unwrap();

        let mut changed = problem(Platform::GeeksforGeeks, "Kadane", "new", &["DP"]);
        changed.difficulty = "Medium".to_string();
        changed.points = "42".to_string();
        let mut batch = store.begin_batch().await.unwrap();
        assert_eq!(batch.upsert(&changed).await.unwrap(), UpsertOutcome::Updated(id));
        batch.commit().await.unwrap();

        let rows = store.list_problems(Some(Platform::GeeksforGeeks)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].title, "Kadane");
        assert_eq!(rows[0].difficulty, "Medium");
        assert_eq!(rows[0].url, "new");
        assert_eq!(rows[0].points, "42");
        assert_eq!(rows[0].tags, vec!["DP".to_string()]);
    }

    #[tokio::test]
    async fn find_by_url_requires_exact_match_on_platform_and_url() {
        let store = SqliteProblemStore::in_memory().await.unwrap();
        let url = "https://leetcode.com/problems/two-sum/";
        let mut batch = store.begin_batch().await.unwrap();
        batch.insert(&problem(Platform::LeetCode, "Two Sum", url, &[])).await.unwrap();
        batch.commit().await.unwrap();

        assert!(store.find_by_url(Platform::LeetCode, url).await.unwrap().is_some());
        assert!(store
            .find_by_url(Platform::LeetCode, "https://leetcode.com/problems/two-sum")
            .await
            .unwrap()
            .is_none());
        assert!(store.find_by_url(Platform::Codeforces, url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_report_counts_and_schema() {
        let store = SqliteProblemStore::in_memory().await.unwrap();
        store.ping().await.unwrap();
        let mut batch = store.begin_batch().await.unwrap();
        batch.insert(&problem(Platform::LeetCode, "A", "a", &[])).await.unwrap();
        batch.insert(&problem(Platform::LeetCode, "B", "b", &[])).await.unwrap();
        let mut hard = problem(Platform::Codeforces, "C", "c", &[]);
        hard.difficulty = "800".to_string();
        batch.insert(&hard).await.unwrap();
        batch.commit().await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_problems, 3);
        assert_eq!(stats.problems_by_platform["leetcode"], 2);
        assert_eq!(stats.problems_by_platform["codeforces"], 1);
        assert_eq!(stats.problems_by_platform["interviewbit"], 0);
        assert_eq!(stats.problems_by_difficulty["Easy"], 2);
        assert_eq!(stats.problems_by_difficulty["800"], 1);
        assert!(stats.tables.contains(&"problem".to_string()));
        assert_eq!(
            stats.problem_table_columns,
            vec!["id", "title", "platform", "difficulty", "url", "points", "tags"]
        );
    }

    #[tokio::test]
    async fn file_backed_store_creates_missing_directories() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("instance").join("dsa_problems.db");
        let url = format!("sqlite://{}", db_path.display());
        let store = SqliteProblemStore::connect(&url).await.unwrap();
        assert_eq!(store.database_path(), Some(db_path.as_path()));
        assert!(db_path.exists());
    }

    #[test]
    fn sqlite_paths_are_derived_from_urls() {
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(
            sqlite_file_path("sqlite://instance/dsa.db?mode=rwc"),
            Some(PathBuf::from("instance/dsa.db"))
        );
        assert_eq!(sqlite_file_path("postgres://x"), None);
    }

    #[tokio::test]
    async fn fetch_failures_are_returned_not_raised() {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let err = http.fetch_text("not a url", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }
}
