//! `taalsync sync` and `taalsync status`.

use miette::{IntoDiagnostic, Result};
use tabled::{Table, Tabled, settings::Style};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SyncConfig;
use crate::db::{LocalStore, SqliteStore};
use crate::remote::{FileKind, HttpRemoteStore, RemoteStore, StaticToken};
use crate::sync::SyncEngine;

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Error")]
    error: String,
}

async fn open_store(config: &SyncConfig) -> Result<SqliteStore> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .into_diagnostic()?;
    let store = SqliteStore::open(config.data_dir.join("taalsync.db")).await?;
    store.migrate().await?;
    Ok(store)
}

fn remote_client(config: &SyncConfig) -> HttpRemoteStore {
    let token = config.token.clone().unwrap_or_default();
    let client = HttpRemoteStore::new(&config.api_url, StaticToken(token));
    match &config.root_folder {
        Some(name) => client.with_root_folder(name),
        None => client,
    }
}

/// Run one full pass and render the report.
pub async fn run_sync(config: &SyncConfig) -> Result<String> {
    let store = open_store(config).await?;
    let remote = remote_client(config);
    let engine = SyncEngine::new(
        remote,
        store,
        config.data_dir.join("audio"),
        config.data_dir.join("downloads"),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let report = engine
        .run(cancel, |status, fraction| {
            info!(status, progress = %format!("{:.0}%", fraction * 100.0), "syncing");
        })
        .await?;

    let mut output = format!("Sync finished: {}\n", report.summary());
    if !report.failures.is_empty() {
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                project: f.project_id.clone(),
                error: f.message.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        output.push_str(&format!("\n{table}\n"));
    }
    Ok(output)
}

/// Local and remote project counts plus auth state.
pub async fn status(config: &SyncConfig) -> Result<String> {
    let store = open_store(config).await?;
    let local_count = store.list_project_ids().await?.len();

    let remote = remote_client(config);
    let remote_line = match remote.get_or_create_root_folder().await {
        Ok(root) => {
            let folders = remote.list(&root, Some(FileKind::Folder)).await?;
            format!("Remote projects: {}", folders.len())
        }
        Err(e) => format!("Remote unreachable: {e}"),
    };

    let auth = if config.token.is_some() {
        "token configured"
    } else {
        "no token"
    };
    Ok(format!(
        "Local projects: {local_count}\n{remote_line}\nAuth: {auth}"
    ))
}
