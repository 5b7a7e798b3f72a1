//! Migration workflow state management
//!
//! Tracks the progress and state of data migrations as documents in the
//! `DataMigrations` collection, keyed by migration name.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kernel::{to_fields, BaseDocumentStore};

pub const WORKFLOW_COLLECTION: &str = "DataMigrations";

/// Phase of a migration workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Running,
    Completed,
    Failed,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationWorkflow {
    pub name: String,
    pub phase: WorkflowPhase,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub skipped_items: usize,
    pub last_processed_id: Option<String>,
    pub dry_run: bool,
    pub error_budget: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationWorkflow {
    /// Calculate current error rate
    pub fn error_rate(&self) -> f64 {
        let total = self.completed_items + self.failed_items;
        if total == 0 {
            0.0
        } else {
            self.failed_items as f64 / total as f64
        }
    }

    /// Check if error budget is exceeded
    pub fn error_budget_exceeded(&self) -> bool {
        self.error_rate() > self.error_budget
    }

    /// Find workflow by name
    pub async fn find_by_name(name: &str, store: &dyn BaseDocumentStore) -> Result<Option<Self>> {
        match store.get(WORKFLOW_COLLECTION, name).await? {
            Some(document) => Ok(Some(
                document
                    .decode()
                    .with_context(|| format!("Malformed workflow record for {}", name))?,
            )),
            None => Ok(None),
        }
    }

    /// Create a new workflow, resetting any previous run of the same name
    pub async fn create(
        name: &str,
        total_items: usize,
        dry_run: bool,
        error_budget: f64,
        store: &dyn BaseDocumentStore,
    ) -> Result<Self> {
        let workflow = Self {
            name: name.to_string(),
            phase: WorkflowPhase::Running,
            total_items,
            completed_items: 0,
            failed_items: 0,
            skipped_items: 0,
            last_processed_id: None,
            dry_run,
            error_budget,
            started_at: Utc::now(),
            completed_at: None,
        };
        workflow.save(store).await?;
        Ok(workflow)
    }

    /// Record a processed batch
    pub async fn update_progress(
        &mut self,
        completed_delta: usize,
        failed_delta: usize,
        skipped_delta: usize,
        last_processed_id: String,
        store: &dyn BaseDocumentStore,
    ) -> Result<()> {
        self.completed_items += completed_delta;
        self.failed_items += failed_delta;
        self.skipped_items += skipped_delta;
        self.last_processed_id = Some(last_processed_id);
        self.save(store).await
    }

    /// Mark as completed
    pub async fn complete(&mut self, store: &dyn BaseDocumentStore) -> Result<()> {
        self.finish(WorkflowPhase::Completed, store).await
    }

    /// Mark as failed
    pub async fn fail(&mut self, store: &dyn BaseDocumentStore) -> Result<()> {
        self.finish(WorkflowPhase::Failed, store).await
    }

    async fn finish(&mut self, phase: WorkflowPhase, store: &dyn BaseDocumentStore) -> Result<()> {
        self.phase = phase;
        self.completed_at = Some(Utc::now());
        self.save(store).await
    }

    async fn save(&self, store: &dyn BaseDocumentStore) -> Result<()> {
        store
            .set(WORKFLOW_COLLECTION, &self.name, to_fields(self)?)
            .await
            .with_context(|| format!("Failed to save workflow {}", self.name))
    }
}
