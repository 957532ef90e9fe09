//! Git-hosted JSON corpus adapter (paints and loaners).
//!
//! The file list comes from one recursive tree call; matching blobs are then fetched from
//! the raw host with a bounded fan-out. All requests share the engine's rate limiter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::fetch::{FetchClient, FetchError};
use crate::sync::Category;

use super::SourceAdapter;
use super::error::{Result, SourceError};
use super::types::{CategoryRecords, FetchedCategory, LoanerRecord, PaintRecord, warn_skipped};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_CORPUS_CONCURRENCY: usize = 10;

const CATEGORIES: &[Category] = &[Category::Paints, Category::Loaners];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub api_base: String,
    pub raw_base: String,
    pub paints_prefix: String,
    pub loaners_prefix: String,
    /// Maximum concurrent raw file fetches.
    pub concurrency: usize,
    /// Optional access token, sent as a bearer token for a higher upstream quota.
    pub token: Option<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            paints_prefix: "paints/".to_string(),
            loaners_prefix: "loaners/".to_string(),
            concurrency: DEFAULT_CORPUS_CONCURRENCY,
            token: None,
        }
    }
}

impl CorpusConfig {
    pub fn tree_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch
        )
    }

    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch,
            path.trim_start_matches('/')
        )
    }

    fn prefix(&self, category: Category) -> Option<&str> {
        match category {
            Category::Paints => Some(&self.paints_prefix),
            Category::Loaners => Some(&self.loaners_prefix),
            _ => None,
        }
    }
}

/// Adapter for the git-hosted corpus.
pub struct CorpusSource {
    client: FetchClient,
    config: Arc<CorpusConfig>,
}

impl CorpusSource {
    pub fn new(client: FetchClient, config: CorpusConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Accept".to_string(),
            "application/vnd.github+json".to_string(),
        )];
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    /// Paths of the JSON blobs under `prefix`, sorted.
    async fn list_files(&self, prefix: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        let url = self.config.tree_url();
        let body = self
            .client
            .fetch_with_headers(&url, &self.headers(), cancel)
            .await?;
        let tree: Tree = serde_json::from_slice(&body)
            .map_err(|source| FetchError::Decode { url: url.clone(), source })?;
        if tree.truncated {
            tracing::warn!(url = %url, "Corpus tree listing is truncated");
        }

        let mut paths: Vec<String> = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .filter(|path| path.starts_with(prefix) && path.ends_with(".json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Fetch and parse every file with at most `concurrency` requests in flight.
    ///
    /// Returns the parsed files in path order plus the number of files skipped.
    async fn fetch_files<T>(
        &self,
        paths: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<(String, Vec<T>)>, usize)>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set: JoinSet<(String, std::result::Result<Vec<T>, FetchError>)> =
            JoinSet::new();

        for path in paths {
            let client = self.client.clone();
            let config = Arc::clone(&self.config);
            let semaphore = Arc::clone(&semaphore);
            let headers = self.headers();
            let cancel = cancel.clone();
            join_set.spawn(async move {
                let result = fetch_file_with_permit::<T>(
                    &client, &config, &semaphore, &path, &headers, &cancel,
                )
                .await;
                (path, result)
            });
        }

        let mut files = Vec::new();
        let mut skipped = 0;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((path, Ok(entries))) => files.push((path, entries)),
                Ok((_, Err(FetchError::Cancelled))) => {
                    join_set.abort_all();
                    return Err(FetchError::Cancelled.into());
                }
                Ok((path, Err(error))) => {
                    tracing::warn!(path = %path, error = %error, "Skipping corpus file");
                    skipped += 1;
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Corpus fetch task failed");
                    skipped += 1;
                }
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok((files, skipped))
    }
}

async fn fetch_file_with_permit<T: DeserializeOwned>(
    client: &FetchClient,
    config: &CorpusConfig,
    semaphore: &Semaphore,
    path: &str,
    headers: &[(String, String)],
    cancel: &CancellationToken,
) -> std::result::Result<Vec<T>, FetchError> {
    let _permit = semaphore.acquire().await.map_err(|_| FetchError::Cancelled)?;
    let url = config.raw_url(path);
    let body = client.fetch_with_headers(&url, headers, cancel).await?;
    let parsed: OneOrMany<T> =
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode { url, source })?;
    Ok(parsed.into_vec())
}

#[async_trait]
impl SourceAdapter for CorpusSource {
    fn name(&self) -> &'static str {
        "corpus"
    }

    fn categories(&self) -> &'static [Category] {
        CATEGORIES
    }

    async fn fetch_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<FetchedCategory> {
        let prefix = self
            .config
            .prefix(category)
            .ok_or(SourceError::UnsupportedCategory {
                source_name: self.name(),
                category,
            })?
            .to_string();

        let paths = self.list_files(&prefix, cancel).await?;
        tracing::debug!(category = %category, files = paths.len(), "Listed corpus files");

        match category {
            Category::Paints => {
                let (files, skipped_files) =
                    self.fetch_files::<CorpusPaint>(paths, cancel).await?;
                let mut records = Vec::new();
                let mut skipped = skipped_files;
                for (path, paints) in files {
                    for paint in paints {
                        match paint.into_record() {
                            Some(record) => records.push(record),
                            None => {
                                let context = serde_json::json!({ "path": path });
                                warn_skipped("paint", &context, &"missing class_name");
                                skipped += 1;
                            }
                        }
                    }
                }
                Ok(FetchedCategory {
                    records: CategoryRecords::Paints(records),
                    skipped,
                })
            }
            Category::Loaners => {
                let (files, skipped_files) =
                    self.fetch_files::<CorpusLoaner>(paths, cancel).await?;
                let mut records = Vec::new();
                let mut skipped = skipped_files;
                for (path, loaners) in files {
                    for loaner in loaners {
                        match loaner.into_record() {
                            Some(record) => records.push(record),
                            None => {
                                let context = serde_json::json!({ "path": path });
                                warn_skipped("loaner", &context, &"missing vehicle");
                                skipped += 1;
                            }
                        }
                    }
                }
                Ok(FetchedCategory {
                    records: CategoryRecords::Loaners(records),
                    skipped,
                })
            }
            _ => Err(SourceError::UnsupportedCategory {
                source_name: self.name(),
                category,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Tree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// A corpus file holds either one entry or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct CorpusPaint {
    #[serde(default, alias = "className")]
    class_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "vehicles", alias = "ships")]
    tags: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

impl CorpusPaint {
    fn into_record(self) -> Option<PaintRecord> {
        let class_name = self
            .class_name
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())?;
        Some(PaintRecord {
            name: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| class_name.clone()),
            class_name,
            tags: self.tags,
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CorpusLoaner {
    #[serde(default, alias = "ship", alias = "name")]
    vehicle: Option<String>,
    #[serde(default)]
    loaners: Vec<String>,
}

impl CorpusLoaner {
    fn into_record(self) -> Option<LoanerRecord> {
        let vehicle = self.vehicle.filter(|v| !v.trim().is_empty())?;
        Some(LoanerRecord {
            vehicle,
            loaners: self.loaners,
        })
    }
}
