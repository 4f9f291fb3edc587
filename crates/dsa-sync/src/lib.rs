//! Ingestion orchestration: each enabled platform's listing is written to
//! the store as one batch, and every platform's outcome is reported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use dsa_adapters::{
    adapter_for_platform, default_adapters, AdapterContext, AdapterSettings, PlatformAdapter,
};
use dsa_core::{IngestReport, Platform, PlatformOutcome, ProblemDraft};
use dsa_storage::{
    HttpClientConfig, HttpFetcher, ProblemStore, SqliteProblemStore, UpsertOutcome,
    BROWSER_USER_AGENT,
};
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "dsa-sync";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://instance/dsa_problems.db";

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformRegistry {
    pub platforms: Vec<PlatformEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformEntry {
    pub platform: Platform,
    pub display_name: String,
    pub enabled: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlatformRegistry {
    pub fn all_enabled() -> Self {
        Self {
            platforms: Platform::ALL
                .into_iter()
                .map(|platform| PlatformEntry {
                    platform,
                    display_name: platform.to_string(),
                    enabled: true,
                    notes: None,
                })
                .collect(),
        }
    }

    /// Reads the YAML registry. A missing file enables every platform.
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(text) => serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no platform registry; enabling every platform");
                Ok(Self::all_enabled())
            }
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Enabled platforms in registration order. Platforms the file does not
    /// list stay off.
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|platform| {
                self.platforms
                    .iter()
                    .any(|entry| entry.platform == *platform && entry.enabled)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: String,
    pub internal_api_key: Option<String>,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub platforms_file: PathBuf,
    pub adapter_settings: AdapterSettings,
    pub web_port: u16,
    pub cache_ttl_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            internal_api_key: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
            http_timeout_secs: 20,
            platforms_file: PathBuf::from("platforms.yaml"),
            adapter_settings: AdapterSettings::default(),
            web_port: 5000,
            cache_ttl_secs: 300,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let adapter_defaults = defaults.adapter_settings.clone();
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            internal_api_key: std::env::var("INTERNAL_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            user_agent: std::env::var("DSA_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: env_parse("DSA_HTTP_TIMEOUT_SECS").unwrap_or(defaults.http_timeout_secs),
            platforms_file: std::env::var("DSA_PLATFORMS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.platforms_file),
            adapter_settings: AdapterSettings {
                gfg_max_pages: env_parse("DSA_GFG_MAX_PAGES").unwrap_or(adapter_defaults.gfg_max_pages),
                gfg_problem_delay: env_millis("DSA_GFG_PROBLEM_DELAY_MS")
                    .unwrap_or(adapter_defaults.gfg_problem_delay),
                gfg_page_delay: env_millis("DSA_GFG_PAGE_DELAY_MS")
                    .unwrap_or(adapter_defaults.gfg_page_delay),
                interviewbit_problem_delay: env_millis("DSA_INTERVIEWBIT_DELAY_MS")
                    .unwrap_or(adapter_defaults.interviewbit_problem_delay),
            },
            web_port: env_parse("DSA_WEB_PORT").unwrap_or(defaults.web_port),
            cache_ttl_secs: env_parse("DSA_CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

pub struct IngestPipeline {
    store: Arc<dyn ProblemStore>,
    http: HttpFetcher,
    adapters: Vec<Box<dyn PlatformAdapter>>,
}

impl IngestPipeline {
    /// Pipeline over every platform with default pacing.
    pub fn new(store: Arc<dyn ProblemStore>, http: HttpFetcher) -> Self {
        Self {
            store,
            http,
            adapters: default_adapters(&AdapterSettings::default()),
        }
    }

    pub fn with_adapters(mut self, adapters: Vec<Box<dyn PlatformAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    pub async fn from_config(config: &IngestConfig, store: Arc<dyn ProblemStore>) -> Result<Self> {
        let registry = PlatformRegistry::load(&config.platforms_file).await?;
        let http = HttpFetcher::new(config.http_client_config())?;
        let adapters = registry
            .enabled_platforms()
            .into_iter()
            .map(|platform| adapter_for_platform(platform, &config.adapter_settings))
            .collect();
        Ok(Self {
            store,
            http,
            adapters,
        })
    }

    pub fn store(&self) -> &Arc<dyn ProblemStore> {
        &self.store
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.iter().map(|a| a.platform()).collect()
    }

    /// Run every adapter in order. A failing platform never stops the run;
    /// its failure is recorded in its own outcome.
    pub async fn ingest_all(&self) -> IngestReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let ctx = AdapterContext::new(run_id);
        info!(%run_id, platforms = self.adapters.len(), "ingestion run started");

        let mut platforms = BTreeMap::new();
        for adapter in &self.adapters {
            let platform = adapter.platform();
            debug!(%run_id, %platform, crawlability = ?adapter.crawlability(), "fetching listing");
            let outcome = match adapter.list_problems(&self.http, &ctx).await {
                Ok(drafts) => write_batch(self.store.as_ref(), platform, drafts).await,
                Err(err) => {
                    error!(%run_id, %platform, error = %err, "platform listing failed");
                    PlatformOutcome::failed(err.to_string())
                }
            };
            info!(
                %run_id,
                %platform,
                total = outcome.total,
                new = outcome.new,
                updated = outcome.updated,
                errors = outcome.errors.len(),
                "platform ingested"
            );
            platforms.insert(platform, outcome);
        }

        let finished_at = Utc::now();
        info!(%run_id, elapsed_ms = (finished_at - started_at).num_milliseconds(), "ingestion run finished");
        IngestReport {
            run_id,
            started_at,
            finished_at,
            platforms,
        }
    }
}

/// Reconcile one platform's drafts against the store inside a single batch.
///
/// `new` and `updated` only count work that was committed.
pub async fn write_batch(
    store: &dyn ProblemStore,
    platform: Platform,
    drafts: Vec<ProblemDraft>,
) -> PlatformOutcome {
    let mut outcome = PlatformOutcome {
        total: drafts.len(),
        ..PlatformOutcome::default()
    };

    let mut batch = match store.begin_batch().await {
        Ok(batch) => batch,
        Err(err) => {
            error!(%platform, error = %err, "could not open batch");
            outcome.errors.push(format!("Database commit error: {err}"));
            return outcome;
        }
    };

    let (mut new, mut updated) = (0, 0);
    for draft in drafts {
        let title = draft.title.clone();
        let result = match draft.normalize(platform) {
            Ok(problem) => batch.upsert(&problem).await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match result {
            Ok(UpsertOutcome::Inserted(id)) => {
                debug!(%platform, id, title = %title, "inserted");
                new += 1;
            }
            Ok(UpsertOutcome::Updated(id)) => {
                debug!(%platform, id, title = %title, "updated");
                updated += 1;
            }
            Err(cause) => {
                warn!(%platform, title = %title, cause = %cause, "record rejected");
                outcome
                    .errors
                    .push(format!("Error processing problem {title}: {cause}"));
            }
        }
    }

    match batch.commit().await {
        Ok(()) => {
            outcome.new = new;
            outcome.updated = updated;
        }
        Err(err) => {
            error!(%platform, error = %err, "commit failed; rolling back");
            if let Err(rollback_err) = batch.rollback().await {
                warn!(%platform, error = %rollback_err, "rollback failed");
            }
            outcome.errors.push(format!("Database commit error: {err}"));
        }
    }
    outcome
}

pub async fn run_ingest_once(config: &IngestConfig) -> Result<IngestReport> {
    let store = SqliteProblemStore::connect(&config.database_url)
        .await
        .with_context(|| format!("opening store at {}", config.database_url))?;
    let pipeline = IngestPipeline::from_config(config, Arc::new(store)).await?;
    Ok(pipeline.ingest_all().await)
}

pub async fn run_ingest_once_from_env() -> Result<IngestReport> {
    run_ingest_once(&IngestConfig::from_env()).await
}
