use hangar::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::RunStarted {
                run_id,
                scope,
                categories,
            } => {
                tracing::info!(
                    run_id = %run_id,
                    scope = %scope,
                    categories = categories.len(),
                    "Sync started"
                );
            }

            SyncProgress::CategoryStarted { category, source } => {
                tracing::info!(category = %category, source, "Syncing category");
            }

            SyncProgress::CategoryFetched {
                category,
                records,
                skipped,
            } => {
                tracing::debug!(category = %category, records, skipped, "Fetched records");
            }

            SyncProgress::CategoryFinished { category, counts } => {
                tracing::info!(
                    category = %category,
                    records = counts.records,
                    unmatched = counts.unmatched,
                    skipped = counts.skipped,
                    "Category complete"
                );
            }

            SyncProgress::CategorySkipped {
                category,
                dependency,
            } => {
                tracing::warn!(category = %category, dependency = %dependency, "Category skipped");
            }

            SyncProgress::CategoryFailed {
                category,
                error,
                best_effort,
            } => {
                if best_effort {
                    tracing::warn!(category = %category, error = %error, "Best-effort category failed");
                } else {
                    tracing::error!(category = %category, error = %error, "Category failed");
                }
            }

            SyncProgress::RunFinished {
                run_id,
                succeeded,
                failed,
                skipped,
                cancelled,
            } => {
                tracing::info!(
                    run_id = %run_id,
                    succeeded,
                    failed,
                    skipped,
                    cancelled,
                    "Sync finished"
                );
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
