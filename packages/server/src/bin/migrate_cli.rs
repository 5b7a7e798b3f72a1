//! CLI for executing data migrations
//!
//! Outputs JSON, one object per line, so it can be driven by scripts.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use device_auth_core::data_migrations::{
    all_migrations, find_migration, run_migration, MigrationContext, MigrationEntry,
    MigrationWorkflow, VerifyResult,
};
use device_auth_core::kernel::{BaseDocumentStore, PostgresDocumentStore};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "migrate_cli")]
#[command(about = "Data migration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all registered migrations
    List,

    /// Estimate items to migrate
    Estimate { name: String },

    /// Run a migration to completion
    Run {
        name: String,
        #[arg(long)]
        dry_run: bool,
    },

    /// Get workflow status
    Status { name: String },

    /// Verify migration completion
    Verify { name: String },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize, Default)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    migrations: Option<Vec<MigrationInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<WorkflowStatusResponse>,
}

#[derive(Serialize)]
struct MigrationInfo {
    name: String,
    description: Option<String>,
}

#[derive(Serialize)]
struct WorkflowStatusResponse {
    phase: String,
    total_items: usize,
    completed_items: usize,
    failed_items: usize,
    skipped_items: usize,
    error_rate: f64,
    dry_run: bool,
}

impl From<&MigrationWorkflow> for WorkflowStatusResponse {
    fn from(workflow: &MigrationWorkflow) -> Self {
        Self {
            phase: workflow.phase.as_str().to_string(),
            total_items: workflow.total_items,
            completed_items: workflow.completed_items,
            failed_items: workflow.failed_items,
            skipped_items: workflow.skipped_items,
            error_rate: workflow.error_rate(),
            dry_run: workflow.dry_run,
        }
    }
}

#[derive(Serialize)]
struct ProgressUpdate {
    #[serde(rename = "type")]
    update_type: &'static str,
    completed: usize,
    total: usize,
}

fn output<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

fn not_found(name: &str) -> Result<()> {
    output(&Response {
        success: false,
        message: Some(format!("Migration '{}' not found", name)),
        ..Default::default()
    });
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Estimate { name } => cmd_estimate(&name).await,
        Commands::Run { name, dry_run } => cmd_run(&name, dry_run).await,
        Commands::Status { name } => cmd_status(&name).await,
        Commands::Verify { name } => cmd_verify(&name).await,
    }
}

async fn get_store() -> Result<Arc<dyn BaseDocumentStore>> {
    // Only the database is needed here, not the full server configuration
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let store = PostgresDocumentStore::new(pool);
    store.migrate().await?;
    Ok(Arc::new(store))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_list() -> Result<()> {
    let migrations: Vec<MigrationInfo> = all_migrations()
        .into_iter()
        .map(|e| MigrationInfo {
            name: e.migration.name().to_string(),
            description: Some(e.migration.description())
                .filter(|desc| !desc.is_empty())
                .map(str::to_string),
        })
        .collect();

    output(&Response {
        success: true,
        migrations: Some(migrations),
        ..Default::default()
    });

    Ok(())
}

async fn cmd_estimate(name: &str) -> Result<()> {
    let Some(MigrationEntry { migration }) = find_migration(name) else {
        return not_found(name);
    };
    let store = get_store().await?;

    let count = migration.estimate(store.as_ref()).await?;

    output(&Response {
        success: true,
        count: Some(count),
        ..Default::default()
    });

    Ok(())
}

async fn cmd_run(name: &str, dry_run: bool) -> Result<()> {
    let Some(MigrationEntry { migration }) = find_migration(name) else {
        return not_found(name);
    };
    let ctx = MigrationContext {
        store: get_store().await?,
        dry_run,
    };

    let workflow = run_migration(migration.as_ref(), &ctx, |workflow| {
        output(&ProgressUpdate {
            update_type: "progress",
            completed: workflow.completed_items + workflow.skipped_items + workflow.failed_items,
            total: workflow.total_items,
        })
    })
    .await?;

    output(&Response {
        success: !workflow.error_budget_exceeded(),
        message: Some(format!(
            "Completed: {}, Skipped: {}, Failed: {}",
            workflow.completed_items, workflow.skipped_items, workflow.failed_items
        )),
        status: Some((&workflow).into()),
        ..Default::default()
    });

    Ok(())
}

async fn cmd_status(name: &str) -> Result<()> {
    let store = get_store().await?;

    match MigrationWorkflow::find_by_name(name, store.as_ref()).await? {
        Some(workflow) => output(&Response {
            success: true,
            status: Some((&workflow).into()),
            ..Default::default()
        }),
        None => output(&Response {
            success: true,
            message: Some(format!("No workflow found for '{}'", name)),
            ..Default::default()
        }),
    }

    Ok(())
}

async fn cmd_verify(name: &str) -> Result<()> {
    let Some(MigrationEntry { migration }) = find_migration(name) else {
        return not_found(name);
    };
    let store = get_store().await?;

    let response = match migration.verify(store.as_ref()).await? {
        VerifyResult::Passed => Response {
            success: true,
            message: Some("Verification passed".to_string()),
            ..Default::default()
        },
        VerifyResult::Incomplete { remaining } => Response {
            success: false,
            message: Some(format!("{} items remaining", remaining)),
            count: Some(remaining),
            ..Default::default()
        },
        VerifyResult::Failed { issues } => Response {
            success: false,
            message: Some(issues.join("; ")),
            ..Default::default()
        },
    };
    output(&response);

    Ok(())
}
