//! Device-side login client
//!
//! Runs an authorization attempt for the machine this binary runs on, using
//! its locally persisted fingerprint. Outputs JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use device_auth_core::common::Role;
use device_auth_core::domains::auth::{AuthorizationEngine, AuthorizationResult, LoginRequest};
use device_auth_core::domains::device::{
    DeviceIdentity, FingerprintOrigin, LocalDeviceIdentity, MachineIdSource,
};
use device_auth_core::kernel::{PostgresDocumentStore, RestIdentityProvider, ServerDeps};
use device_auth_core::Config;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "device_login")]
#[command(about = "Authorize this device for a restaurant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show this device's fingerprint
    Whoami,

    /// Sign in and bind this device
    Login {
        #[arg(long)]
        email: String,
        /// Falls back to DEVICE_LOGIN_PASSWORD
        #[arg(long, env = "DEVICE_LOGIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        tenant: String,
        /// owner, staff or table (session flow only)
        #[arg(long)]
        role: Option<Role>,
    },

    /// Close this device's session and sign out
    Logout {
        #[arg(long)]
        tenant: String,
        /// Session token printed by `login`; falls back to DEVICE_SESSION_TOKEN
        #[arg(long, env = "DEVICE_SESSION_TOKEN", hide_env_values = true)]
        session_token: String,
    },
}

#[derive(Serialize)]
struct WhoamiResponse {
    fingerprint: String,
    origin: &'static str,
    stable: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,device_auth_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let device = LocalDeviceIdentity::resolve(&config.device_id_path, &MachineIdSource::default());

    match cli.command {
        Commands::Whoami => output(&WhoamiResponse {
            fingerprint: device.current_fingerprint().to_string(),
            origin: match device.origin() {
                FingerprintOrigin::Persisted => "persisted",
                FingerprintOrigin::Platform => "platform",
                FingerprintOrigin::Ephemeral => "ephemeral",
            },
            stable: device.is_stable(),
        }),
        Commands::Login {
            email,
            password,
            tenant,
            role,
        } => {
            let engine = connect(&config).await?;
            let request = LoginRequest {
                email,
                password,
                tenant_id: tenant,
                role,
            };
            let result: AuthorizationResult = engine.login(&request, &device).await;
            output(&result)?;
            if !result.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Logout {
            tenant,
            session_token,
        } => {
            let engine = connect(&config).await?;
            match engine
                .logout(&tenant, &device.current_fingerprint(), &session_token)
                .await
            {
                Ok(()) => output(&LogoutResponse {
                    success: true,
                    error_message: None,
                }),
                Err(e) => {
                    output(&LogoutResponse {
                        success: false,
                        error_message: Some(e.user_message()),
                    })?;
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn connect(config: &Config) -> Result<AuthorizationEngine> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let deps = ServerDeps::new(
        Arc::new(PostgresDocumentStore::new(pool)),
        Arc::new(RestIdentityProvider::new(
            &config.identity_base_url,
            &config.identity_api_key,
        )),
        config.device_scan_timeout,
    );
    Ok(AuthorizationEngine::new(deps, config.auth_flow))
}
