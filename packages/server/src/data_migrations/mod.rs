//! Data migration framework for surgical document transformations
//!
//! This module provides the infrastructure for running resumable, batch-oriented
//! data migrations with progress tracking, error budgets, and verification.
//!
//! # Architecture
//!
//! Data migrations are different from schema migrations (sqlx):
//! - Schema migrations change the `documents` table itself
//! - Data migrations transform the documents stored in it
//!
//! # Usage
//!
//! 1. Implement the `DataMigration` trait for your migration
//! 2. Register it in `all_migrations`
//! 3. Run via `migrate_cli run <name>`

pub mod normalize_owner_principal;
mod workflow;

pub use workflow::{MigrationWorkflow, WorkflowPhase, WORKFLOW_COLLECTION};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::kernel::BaseDocumentStore;

/// Result of executing a single item migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationResult {
    /// Item was successfully migrated
    Migrated,
    /// Item was skipped (already migrated or not applicable)
    Skipped,
    /// Dry-run: item would have been migrated
    WouldMigrate,
    /// Dry-run: item would have been skipped
    WouldSkip,
}

/// Result of verification check
#[derive(Debug, PartialEq)]
pub enum VerifyResult {
    /// All items have been migrated
    Passed,
    /// Some items remain to be migrated
    Incomplete { remaining: usize },
    /// Verification failed with issues
    Failed { issues: Vec<String> },
}

/// Context passed to migration execution
pub struct MigrationContext {
    pub store: Arc<dyn BaseDocumentStore>,
    /// Whether this is a dry-run (no mutations)
    pub dry_run: bool,
}

/// Trait for implementing data migrations
///
/// Each migration must be:
/// - Idempotent: running multiple times produces the same result
/// - Resumable: can continue from where it left off via cursor
/// - Verifiable: can check that migration completed correctly
#[async_trait]
pub trait DataMigration: Send + Sync + 'static {
    /// Unique name for this migration (used as the workflow document id)
    fn name(&self) -> &'static str;

    /// Optional description shown in migration list
    fn description(&self) -> &'static str {
        ""
    }

    /// Estimate total items to migrate
    async fn estimate(&self, store: &dyn BaseDocumentStore) -> Result<usize>;

    /// Find the next batch of document ids to migrate
    ///
    /// Must return ids in ascending order for stable cursoring.
    /// The cursor is the last processed id (exclusive).
    async fn find_work(
        &self,
        cursor: Option<&str>,
        limit: usize,
        store: &dyn BaseDocumentStore,
    ) -> Result<Vec<String>>;

    /// Execute migration for a single item
    async fn execute_one(&self, id: &str, ctx: &MigrationContext) -> Result<MigrationResult>;

    /// Verify that the migration is complete
    async fn verify(&self, store: &dyn BaseDocumentStore) -> Result<VerifyResult>;

    /// Batch size for processing items (default: 100)
    fn batch_size(&self) -> usize {
        100
    }

    /// Maximum acceptable error rate before stopping (default: 1%)
    fn error_budget(&self) -> f64 {
        0.01
    }
}

/// Registry entry for a migration
pub struct MigrationEntry {
    pub migration: Box<dyn DataMigration>,
}

impl MigrationEntry {
    pub fn new<M: DataMigration>(m: M) -> Self {
        Self {
            migration: Box::new(m),
        }
    }
}

/// Get all registered migrations
pub fn all_migrations() -> Vec<MigrationEntry> {
    vec![MigrationEntry::new(
        normalize_owner_principal::NormalizeOwnerPrincipalMigration,
    )]
}

/// Find a migration by name
pub fn find_migration(name: &str) -> Option<MigrationEntry> {
    all_migrations().into_iter().find(|e| e.migration.name() == name)
}

/// Run a migration to the end, batch by batch.
///
/// Progress is persisted after every batch and reported through
/// `on_batch`. The run stops as `Failed` once the error budget is exceeded.
pub async fn run_migration(
    migration: &dyn DataMigration,
    ctx: &MigrationContext,
    mut on_batch: impl FnMut(&MigrationWorkflow),
) -> Result<MigrationWorkflow> {
    let store = ctx.store.as_ref();
    let total = migration.estimate(store).await?;
    let mut workflow = MigrationWorkflow::create(
        migration.name(),
        total,
        ctx.dry_run,
        migration.error_budget(),
        store,
    )
    .await?;

    info!(
        migration = migration.name(),
        total = total,
        dry_run = ctx.dry_run,
        "Starting data migration"
    );

    loop {
        let work = migration
            .find_work(
                workflow.last_processed_id.as_deref(),
                migration.batch_size(),
                store,
            )
            .await?;
        let Some(last_id) = work.last().cloned() else {
            break;
        };

        let (mut completed, mut failed, mut skipped) = (0, 0, 0);
        for id in &work {
            match migration.execute_one(id, ctx).await {
                Ok(MigrationResult::Migrated | MigrationResult::WouldMigrate) => completed += 1,
                Ok(MigrationResult::Skipped | MigrationResult::WouldSkip) => skipped += 1,
                Err(e) => {
                    warn!(migration = migration.name(), id = %id, error = %e, "Item failed");
                    failed += 1;
                }
            }
        }

        workflow
            .update_progress(completed, failed, skipped, last_id, store)
            .await?;
        on_batch(&workflow);

        if workflow.error_budget_exceeded() {
            warn!(
                migration = migration.name(),
                error_rate = workflow.error_rate(),
                "Error budget exceeded"
            );
            workflow.fail(store).await?;
            return Ok(workflow);
        }
    }

    workflow.complete(store).await?;
    info!(
        migration = migration.name(),
        completed = workflow.completed_items,
        skipped = workflow.skipped_items,
        failed = workflow.failed_items,
        "Data migration finished"
    );
    Ok(workflow)
}
