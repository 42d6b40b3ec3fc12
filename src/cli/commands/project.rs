//! `taalsync projects`: table of local projects.

use chrono::{DateTime, Utc};
use miette::Result;
use tabled::{Table, Tabled, settings::Style};

use crate::db::SqliteStore;
use crate::sync::paths;

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Sentences")]
    sentences: i64,
    #[tabled(rename = "Audio")]
    audio: &'static str,
    #[tabled(rename = "Imported")]
    imported: String,
    #[tabled(rename = "Last played")]
    last_played: String,
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn list_projects() -> Result<String> {
    let store = SqliteStore::open(paths::db_path()).await?;
    store.migrate().await?;

    let projects = store.list_projects().await?;
    if projects.is_empty() {
        return Ok("No local projects yet. Run `taalsync sync` first.".to_string());
    }

    let rows: Vec<ProjectRow> = projects
        .into_iter()
        .map(|p| ProjectRow {
            id: p.id,
            name: p.name,
            sentences: p.sentence_count,
            audio: if p.audio_path.is_some() { "yes" } else { "no" },
            imported: format_time(Some(p.imported_at)),
            last_played: format_time(p.last_played_at),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    Ok(table.to_string())
}
