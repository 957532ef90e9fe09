//! Sync orchestrator.
//!
//! A run walks its categories in dependency order on a single task. Each category is
//! fetched by the source registered for it, written in one transaction and closed in the
//! audit trail before the next one starts. A failed category never stops the run; its
//! dependents are recorded as skipped instead of being written against incomplete data.
//!
//! At most one run is active per engine. A second `run` or `trigger` while a run is in
//! progress is rejected with [`SyncError::AlreadyRunning`].
//!
//! # Example
//!
//! ```ignore
//! use hangar::sync::{SyncEngine, SyncScope};
//!
//! let engine = SyncEngine::builder()
//!     .database(db)
//!     .source(Arc::new(wiki))
//!     .source(Arc::new(corpus))
//!     .build()?;
//!
//! let accepted = engine.trigger(SyncScope::All)?;
//! let report = accepted.join().await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::sync_status::SyncStatus;
use crate::resolve::AliasTable;
use crate::source::SourceAdapter;
use crate::store::{ItemRouter, StoreWriter, history};

use super::error::{Result, SyncError};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{
    Category, CategoryCounts, CategoryOutcome, CategoryStatus, RunReport, SyncOptions, SyncScope,
};

/// Source name recorded for a category nobody serves.
const NO_SOURCE: &str = "none";

/// Runs sync passes against one reference store.
///
/// Cloning is cheap; clones share the same store, sources and run guard.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    db: DatabaseConnection,
    writer: StoreWriter,
    sources: BTreeMap<Category, Arc<dyn SourceAdapter>>,
    options: SyncOptions,
    progress: Option<ProgressCallback>,
    running: AtomicBool,
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard {
    inner: Arc<EngineInner>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
    }
}

/// A run accepted by [`SyncEngine::trigger`], executing in the background.
#[derive(Debug)]
pub struct TriggerAccepted {
    pub run_id: Uuid,
    pub categories: Vec<Category>,
    cancel: CancellationToken,
    handle: JoinHandle<RunReport>,
}

impl TriggerAccepted {
    /// Ask the run to stop. The category in flight is recorded as failed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> Result<RunReport> {
        Ok(self.handle.await?)
    }
}

impl SyncEngine {
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::default()
    }

    /// Whether a run is currently in progress.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Name of the source serving `category`, if any.
    pub fn source_for(&self, category: Category) -> Option<&'static str> {
        self.inner.sources.get(&category).map(|s| s.name())
    }

    fn acquire(&self) -> Result<RunGuard> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                tracing::warn!("Rejected sync trigger, a run is already in progress");
                SyncError::AlreadyRunning
            })?;
        Ok(RunGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Run `scope` to completion on the current task.
    pub async fn run(&self, scope: SyncScope, cancel: &CancellationToken) -> Result<RunReport> {
        let _guard = self.acquire()?;
        Ok(self.inner.execute(Uuid::new_v4(), scope, cancel).await)
    }

    /// Start `scope` on the Tokio runtime and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self, scope: SyncScope) -> Result<TriggerAccepted> {
        let guard = self.acquire()?;
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let _guard = guard;
            inner.execute(run_id, scope, &token).await
        });

        Ok(TriggerAccepted {
            run_id,
            categories: scope.categories(),
            cancel,
            handle,
        })
    }

    /// Latest audit row per category.
    pub async fn status(&self) -> Result<Vec<CategoryStatus>> {
        Ok(history::latest_per_category(&self.inner.db).await?)
    }
}

impl EngineInner {
    fn source_name(&self, category: Category) -> &'static str {
        self.sources
            .get(&category)
            .map(|s| s.name())
            .unwrap_or(NO_SOURCE)
    }

    async fn execute(&self, run_id: Uuid, scope: SyncScope, cancel: &CancellationToken) -> RunReport {
        let categories = scope.categories();
        tracing::info!(%run_id, %scope, categories = categories.len(), "Starting sync run");
        emit(
            self.progress.as_ref(),
            SyncProgress::RunStarted {
                run_id,
                scope,
                categories: categories.clone(),
            },
        );

        let mut outcomes: Vec<CategoryOutcome> = Vec::with_capacity(categories.len());
        let mut cancelled = false;

        for category in categories {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = match failed_dependency(category, &outcomes) {
                Some(dependency) => self.skip(run_id, category, dependency).await,
                None => self.run_category(run_id, category, cancel).await,
            };
            outcomes.push(outcome);

            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
        }

        let report = RunReport {
            run_id,
            outcomes,
            cancelled,
        };
        let succeeded = report.count(SyncStatus::Success);
        let failed = report.count(SyncStatus::Error);
        let skipped = report.count(SyncStatus::Skipped);
        tracing::info!(%run_id, succeeded, failed, skipped, cancelled, "Sync run finished");
        emit(
            self.progress.as_ref(),
            SyncProgress::RunFinished {
                run_id,
                succeeded,
                failed,
                skipped,
                cancelled,
            },
        );
        report
    }

    async fn skip(&self, run_id: Uuid, category: Category, dependency: Category) -> CategoryOutcome {
        let source = self.source_name(category);
        let message = SyncError::DependencyFailed { dependency }.to_string();
        tracing::warn!(
            category = %category,
            dependency = %dependency,
            "Skipping category, dependency did not succeed"
        );

        if let Err(e) = history::record_skipped(&self.db, run_id, source, category, &message).await
        {
            tracing::error!(category = %category, error = %e, "Failed to record skipped category");
        }
        emit(
            self.progress.as_ref(),
            SyncProgress::CategorySkipped {
                category,
                dependency,
            },
        );

        CategoryOutcome {
            category,
            source: source.to_string(),
            status: SyncStatus::Skipped,
            counts: CategoryCounts::default(),
            error: Some(message),
        }
    }

    async fn run_category(
        &self,
        run_id: Uuid,
        category: Category,
        cancel: &CancellationToken,
    ) -> CategoryOutcome {
        let adapter = self.sources.get(&category).cloned();
        let source = adapter.as_ref().map(|a| a.name()).unwrap_or(NO_SOURCE);

        let result = match history::start(&self.db, run_id, source, category).await {
            Ok(row) => {
                let result = match adapter {
                    Some(adapter) => self.sync_category(adapter.as_ref(), category, cancel).await,
                    None => Err(SyncError::NoSource { category }),
                };
                let (status, counts, error) = match &result {
                    Ok(counts) => (SyncStatus::Success, *counts, None),
                    Err(e) => (SyncStatus::Error, CategoryCounts::default(), Some(e.to_string())),
                };
                if let Err(e) = history::finish(&self.db, row, status, counts, error).await {
                    tracing::error!(category = %category, error = %e, "Failed to close audit row");
                }
                result
            }
            Err(e) => Err(SyncError::Store(e)),
        };

        match result {
            Ok(counts) => {
                tracing::info!(
                    category = %category,
                    source,
                    records = counts.records,
                    unmatched = counts.unmatched,
                    skipped = counts.skipped,
                    "Category synced"
                );
                emit(
                    self.progress.as_ref(),
                    SyncProgress::CategoryFinished { category, counts },
                );
                CategoryOutcome {
                    category,
                    source: source.to_string(),
                    status: SyncStatus::Success,
                    counts,
                    error: None,
                }
            }
            Err(e) => {
                let best_effort = category.is_best_effort();
                if best_effort {
                    tracing::warn!(category = %category, source, error = %e, "Best-effort category failed");
                } else {
                    tracing::error!(category = %category, source, error = %e, "Category failed");
                }
                emit(
                    self.progress.as_ref(),
                    SyncProgress::CategoryFailed {
                        category,
                        error: e.to_string(),
                        best_effort,
                    },
                );
                CategoryOutcome {
                    category,
                    source: source.to_string(),
                    status: SyncStatus::Error,
                    counts: CategoryCounts::default(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Fetch and write one category within its time budget.
    async fn sync_category(
        &self,
        adapter: &dyn SourceAdapter,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<CategoryCounts> {
        let token = cancel.child_token();
        let budget = self.options.category_timeout;

        match tokio::time::timeout(budget, self.fetch_and_write(adapter, category, &token)).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                Err(SyncError::Timeout {
                    category,
                    seconds: budget.as_secs(),
                })
            }
        }
    }

    async fn fetch_and_write(
        &self,
        adapter: &dyn SourceAdapter,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<CategoryCounts> {
        emit(
            self.progress.as_ref(),
            SyncProgress::CategoryStarted {
                category,
                source: adapter.name(),
            },
        );
        tracing::info!(category = %category, source = adapter.name(), "Syncing category");

        let fetched = adapter
            .fetch_category(category, cancel)
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    SyncError::Cancelled
                } else {
                    SyncError::Source(e)
                }
            })?;
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        emit(
            self.progress.as_ref(),
            SyncProgress::CategoryFetched {
                category,
                records: fetched.records.len(),
                skipped: fetched.skipped,
            },
        );

        let mut counts = self.writer.write(&fetched.records).await?;
        counts.skipped += fetched.skipped;
        Ok(counts)
    }
}

/// First hard dependency of `category` that ran earlier in this run and did not succeed.
///
/// Dependencies outside the run are assumed satisfied by earlier runs.
fn failed_dependency(category: Category, outcomes: &[CategoryOutcome]) -> Option<Category> {
    category.dependencies().iter().copied().find(|dep| {
        outcomes
            .iter()
            .any(|o| o.category == *dep && o.status != SyncStatus::Success)
    })
}

/// Builder for [`SyncEngine`].
#[derive(Default)]
pub struct SyncEngineBuilder {
    database: Option<DatabaseConnection>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    options: Option<SyncOptions>,
    aliases: Option<AliasTable>,
    item_router: Option<ItemRouter>,
    progress: Option<ProgressCallback>,
}

impl SyncEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reference store connection.
    pub fn database(mut self, db: DatabaseConnection) -> Self {
        self.database = Some(db);
        self
    }

    /// Register a source. The first source registered for a category serves it.
    pub fn source(mut self, source: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Replace the built-in tag aliases.
    pub fn aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn item_router(mut self, router: ItemRouter) -> Self {
        self.item_router = Some(router);
        self
    }

    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingField` if no database or no source was set.
    pub fn build(self) -> Result<SyncEngine> {
        let db = self
            .database
            .ok_or(SyncError::MissingField { field: "database" })?;
        if self.sources.is_empty() {
            return Err(SyncError::MissingField { field: "sources" });
        }
        let options = self.options.unwrap_or_default();

        let mut sources: BTreeMap<Category, Arc<dyn SourceAdapter>> = BTreeMap::new();
        for source in self.sources {
            for category in source.categories() {
                sources
                    .entry(*category)
                    .or_insert_with(|| Arc::clone(&source));
            }
        }

        let writer = StoreWriter::new(
            db.clone(),
            options.batch_size,
            options.retry.clone(),
            self.aliases.unwrap_or_default(),
        )
        .with_item_router(self.item_router.unwrap_or_default());

        Ok(SyncEngine {
            inner: Arc::new(EngineInner {
                db,
                writer,
                sources,
                options,
                progress: self.progress,
                running: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::FetchError;
    use crate::source::{
        CategoryRecords, FetchedCategory, GameVersionRecord, ManufacturerRecord, SourceAdapter,
    };

    struct FixtureSource {
        name: &'static str,
        categories: &'static [Category],
        records: HashMap<Category, CategoryRecords>,
        delay: Option<Duration>,
    }

    impl FixtureSource {
        fn new(name: &'static str, categories: &'static [Category]) -> Self {
            Self {
                name,
                categories,
                records: HashMap::new(),
                delay: None,
            }
        }

        fn with(mut self, category: Category, records: CategoryRecords) -> Self {
            self.records.insert(category, records);
            self
        }
    }

    #[async_trait]
    impl SourceAdapter for FixtureSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn categories(&self) -> &'static [Category] {
            self.categories
        }

        async fn fetch_category(
            &self,
            category: Category,
            cancel: &CancellationToken,
        ) -> crate::source::Result<FetchedCategory> {
            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled.into()),
                }
            }
            match self.records.get(&category) {
                Some(records) => Ok(FetchedCategory {
                    records: records.clone(),
                    skipped: 0,
                }),
                None => Err(FetchError::status(500, format!("https://fixture/{category}"), b"boom").into()),
            }
        }
    }

    fn anvil() -> CategoryRecords {
        CategoryRecords::Manufacturers(vec![ManufacturerRecord {
            uuid: Some("m1".to_string()),
            slug: "anvil".to_string(),
            name: "Anvil Aerospace".to_string(),
            code: Some("ANVL".to_string()),
        }])
    }

    fn status_of(report: &RunReport, category: Category) -> SyncStatus {
        report
            .outcome(category)
            .map(|o| o.status)
            .unwrap_or(SyncStatus::Pending)
    }

    #[test]
    fn builder_requires_database() {
        let err = SyncEngine::builder()
            .source(Arc::new(FixtureSource::new("wiki", &Category::ALL)))
            .build()
            .err()
            .expect("missing database");
        assert!(matches!(err, SyncError::MissingField { field: "database" }));
    }

    #[cfg(all(feature = "sqlite", feature = "migrate"))]
    #[tokio::test]
    async fn failed_dependency_skips_dependents_only() {
        let db = crate::db::memory_db().await;
        // No manufacturers fixture: that category fails with a 500.
        let wiki = FixtureSource::new("wiki", &Category::ALL).with(
            Category::GameVersions,
            CategoryRecords::GameVersions(vec![GameVersionRecord {
                uuid: None,
                code: "4.0.1-LIVE".to_string(),
                channel: Some("LIVE".to_string()),
                is_default: true,
            }]),
        );
        let engine = SyncEngine::builder()
            .database(db)
            .source(Arc::new(wiki))
            .build()
            .expect("engine");

        let scope = SyncScope::All;
        let report = engine
            .run(scope, &CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(status_of(&report, Category::Manufacturers), SyncStatus::Error);
        assert_eq!(status_of(&report, Category::GameVersions), SyncStatus::Success);
        assert_eq!(status_of(&report, Category::Vehicles), SyncStatus::Skipped);
        assert_eq!(status_of(&report, Category::Items), SyncStatus::Skipped);
        // Depends on vehicles, which was skipped.
        assert_eq!(status_of(&report, Category::Paints), SyncStatus::Skipped);
        assert!(!report.is_success());

        let rows = history::rows_for_run(&engine.inner.db, report.run_id)
            .await
            .expect("rows");
        assert_eq!(rows.len(), Category::ALL.len());
        assert!(rows.iter().all(|r| r.status.is_terminal()));
        let vehicles = rows
            .iter()
            .find(|r| r.category == "vehicles")
            .expect("vehicles row");
        assert!(
            vehicles
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("manufacturers"))
        );
    }

    #[cfg(all(feature = "sqlite", feature = "migrate"))]
    #[tokio::test]
    async fn best_effort_failure_does_not_block_vehicles() {
        let db = crate::db::memory_db().await;
        let wiki = FixtureSource::new("wiki", &Category::ALL)
            .with(Category::Manufacturers, anvil())
            .with(Category::Vehicles, CategoryRecords::Vehicles(Vec::new()));
        let engine = SyncEngine::builder()
            .database(db)
            .source(Arc::new(wiki))
            .build()
            .expect("engine");

        let report = engine
            .run(SyncScope::All, &CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(status_of(&report, Category::GameVersions), SyncStatus::Error);
        assert_eq!(status_of(&report, Category::Vehicles), SyncStatus::Success);
    }

    #[cfg(all(feature = "sqlite", feature = "migrate"))]
    #[tokio::test]
    async fn single_category_ignores_dependencies_outside_the_run() {
        let db = crate::db::memory_db().await;
        let corpus = FixtureSource::new("corpus", &[Category::Paints])
            .with(Category::Paints, CategoryRecords::Paints(Vec::new()));
        let engine = SyncEngine::builder()
            .database(db)
            .source(Arc::new(corpus))
            .build()
            .expect("engine");

        let report = engine
            .run(SyncScope::Only(Category::Paints), &CancellationToken::new())
            .await
            .expect("run");
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(status_of(&report, Category::Paints), SyncStatus::Success);
    }

    #[cfg(all(feature = "sqlite", feature = "migrate"))]
    #[tokio::test]
    async fn slow_category_times_out_and_is_recorded() {
        let db = crate::db::memory_db().await;
        let mut slow = FixtureSource::new("wiki", &[Category::Manufacturers])
            .with(Category::Manufacturers, anvil());
        slow.delay = Some(Duration::from_secs(30));
        let engine = SyncEngine::builder()
            .database(db)
            .source(Arc::new(slow))
            .options(SyncOptions {
                category_timeout: Duration::from_millis(50),
                ..SyncOptions::default()
            })
            .build()
            .expect("engine");

        let report = engine
            .run(SyncScope::Only(Category::Manufacturers), &CancellationToken::new())
            .await
            .expect("run");
        let outcome = report.outcome(Category::Manufacturers).expect("outcome");
        assert_eq!(outcome.status, SyncStatus::Error);
        assert!(outcome.error.as_deref().is_some_and(|e| e.contains("timed out")));
        assert!(!engine.is_running());
    }

    #[cfg(all(feature = "sqlite", feature = "migrate"))]
    #[tokio::test]
    async fn category_without_a_source_gets_an_error_row() {
        let db = crate::db::memory_db().await;
        let corpus = FixtureSource::new("corpus", &[Category::Paints]);
        let engine = SyncEngine::builder()
            .database(db)
            .source(Arc::new(corpus))
            .build()
            .expect("engine");
        assert_eq!(engine.source_for(Category::Images), None);

        let report = engine
            .run(SyncScope::Only(Category::Images), &CancellationToken::new())
            .await
            .expect("run");
        let outcome = report.outcome(Category::Images).expect("outcome");
        assert_eq!(outcome.status, SyncStatus::Error);
        assert_eq!(outcome.source, "none");

        let status = engine.status().await.expect("status");
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].endpoint, "images");
        assert_eq!(status[0].status, SyncStatus::Error);
    }
}
