use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use snafu::ResultExt;
use switchboard_http::ReqwestClient;
use tokio::io::BufReader;

use crate::error::{AppResult, HttpClientSnafu, SettingsSnafu};
use crate::settings::SettingsStore;
use crate::shell::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "switchboard",
    version,
    about = "Chat with the timesheet and HR policy assistants from a terminal"
)]
pub struct Cli {
    /// Settings file to read instead of the per-user one.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Identity sent with timesheet requests.
    #[arg(long)]
    pub email: Option<String>,

    /// Service to select on startup.
    #[arg(long, value_name = "ID")]
    pub service: Option<String>,

    /// Write the effective settings to the settings file and exit.
    #[arg(long)]
    pub init_config: bool,
}

pub async fn run(cli: Cli) -> AppResult<()> {
    let store = match cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::load(),
    };

    if cli.init_config {
        store.save().context(SettingsSnafu {
            stage: "init-config",
        })?;
        println!("wrote {}", store.config_path().display());
        return Ok(());
    }

    let settings = store.settings();
    let registry = Arc::new(settings.to_registry());
    let client = ReqwestClient::new(settings.request_timeout()).context(HttpClientSnafu {
        stage: "build-http-client",
    })?;

    tracing::info!(
        config = %store.config_path().display(),
        services = registry.len(),
        timeout_secs = settings.request_timeout_secs,
        "switchboard ready"
    );

    let email = cli.email.or_else(|| settings.email.clone());
    let mut shell = Shell::new(registry, Arc::new(client), std::io::stdout(), email);

    shell.greet();
    if let Some(service_id) = cli.service {
        shell.select(service_id, None).await;
    }

    shell.run(BufReader::new(tokio::io::stdin())).await
}
