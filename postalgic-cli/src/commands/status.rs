//! `postalgic status` — offline publish status of every site and target.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use postalgic_core::{registry, ChangeSet, ClientId, SiteConfig};
use postalgic_sync::{
    hash_store,
    status::{check, format_datetime_age},
    PublishStatus,
};

/// Arguments for `postalgic status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let sites = registry::list_sites_at(&home)
            .context("failed to load site registry — run `postalgic init` first")?;

        let rows = build_rows(&home, &sites)?;
        if self.json {
            print_json(&sites, rows)?;
            return Ok(());
        }

        print_table(&sites, rows);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct TargetStatus {
    site: String,
    target: String,
    kind: String,
    status: PublishStatus,
    last_publish_age: String,
    last_published_at: Option<String>,
    published_by: Option<String>,
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummaryJson,
    targets: Vec<TargetStatusJson>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    sites: usize,
    targets: usize,
    pending: usize,
}

#[derive(Serialize)]
struct TargetStatusJson {
    site: String,
    target: String,
    kind: String,
    status: PublishStatus,
    last_publish_age: String,
    last_published_at: Option<String>,
    published_by: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "type")]
    kind: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "last publish")]
    last_publish: String,
}

fn build_rows(home: &Path, sites: &[SiteConfig]) -> Result<Vec<TargetStatus>> {
    let mut rows = Vec::new();
    for site in sites {
        for entry in &site.targets {
            let status = check(home, site, &entry.name).with_context(|| {
                format!("status check failed for '{}/{}'", site.name, entry.name)
            })?;
            let record = hash_store::load_at(home, &site.name, &entry.name).with_context(|| {
                format!("failed to load hash store for '{}/{}'", site.name, entry.name)
            })?;
            let (last_published_at, last_publish_age, published_by) = match record {
                Some(record) => (
                    Some(record.last_published_date.to_rfc3339()),
                    format_datetime_age(record.last_published_date),
                    Some(record.published_by.0),
                ),
                None => (None, "never".to_string(), None),
            };

            rows.push(TargetStatus {
                site: site.name.0.clone(),
                target: entry.name.0.clone(),
                kind: entry.config.kind().to_string(),
                status,
                last_publish_age,
                last_published_at,
                published_by,
            });
        }
    }
    Ok(rows)
}

fn pending_count(rows: &[TargetStatus]) -> usize {
    rows.iter()
        .filter(|r| {
            matches!(
                r.status,
                PublishStatus::Pending { .. } | PublishStatus::NeverPublished
            )
        })
        .count()
}

fn print_json(sites: &[SiteConfig], rows: Vec<TargetStatus>) -> Result<()> {
    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            sites: sites.len(),
            targets: rows.len(),
            pending: pending_count(&rows),
        },
        targets: rows
            .into_iter()
            .map(|row| TargetStatusJson {
                site: row.site,
                target: row.target,
                kind: row.kind,
                status: row.status,
                last_publish_age: row.last_publish_age,
                last_published_at: row.last_published_at,
                published_by: row.published_by,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(sites: &[SiteConfig], rows: Vec<TargetStatus>) {
    let pending = pending_count(&rows);
    println!(
        "Postalgic v{} | {} sites | {} targets | {} pending",
        env!("CARGO_PKG_VERSION"),
        sites.len(),
        rows.len(),
        pending,
    );

    if sites.is_empty() {
        println!("No sites registered.");
        return;
    }

    let separator = "■".repeat(67).bright_black().to_string();
    println!("{separator}");
    println!(
        "Indicators: {} CURRENT  {} FEED ONLY  {} PENDING  {} NEVER PUBLISHED",
        status_indicator(&PublishStatus::Current {
            last_published: chrono::Utc::now(),
            published_by: ClientId::from(""),
        }),
        status_indicator(&PublishStatus::Suppressed { files: Vec::new() }),
        status_indicator(&PublishStatus::Pending {
            changes: ChangeSet::default(),
        }),
        status_indicator(&PublishStatus::NeverPublished),
    );
    println!("{separator}");
    for site in sites {
        println!("{}", site.name.0.to_uppercase().bold());
        let table_rows: Vec<StatusTableRow> = rows
            .iter()
            .filter(|row| row.site == site.name.0)
            .map(|row| StatusTableRow {
                target: row.target.clone(),
                kind: row.kind.clone(),
                status: format!(
                    "{} {}",
                    status_indicator(&row.status),
                    row.status.label().to_uppercase()
                ),
                detail: status_detail(row),
                last_publish: row.last_publish_age.clone(),
            })
            .collect();
        if table_rows.is_empty() {
            println!("  no targets");
        } else {
            let mut table = Table::new(table_rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        println!("{separator}");
    }

    if pending > 0 {
        println!("Run 'postalgic publish <site>' to publish pending changes.");
    }
}

fn status_indicator(status: &PublishStatus) -> String {
    match status {
        PublishStatus::NeverPublished => "■".bright_black().bold().to_string(),
        PublishStatus::Current { .. } => "■".green().bold().to_string(),
        PublishStatus::Suppressed { .. } => "■".cyan().bold().to_string(),
        PublishStatus::Pending { .. } => "■".yellow().bold().to_string(),
    }
}

fn status_detail(row: &TargetStatus) -> String {
    match &row.status {
        PublishStatus::NeverPublished => "no publish from this machine".to_string(),
        PublishStatus::Current { .. } => match &row.published_by {
            Some(client) => format!("up to date (by {client})"),
            None => "up to date".to_string(),
        },
        PublishStatus::Suppressed { files } => format!("{} regenerated", summarize_files(files)),
        PublishStatus::Pending { changes } => format!(
            "{} to upload, {} to delete",
            changes.modified.len(),
            changes.deleted.len()
        ),
    }
}

fn summarize_files(files: &[String]) -> String {
    if files.is_empty() {
        return "unknown file".to_string();
    }

    let mut names: Vec<String> = files.iter().take(2).cloned().collect();
    if files.len() > names.len() {
        names.push(format!("+{} more", files.len() - names.len()));
    }
    names.join(", ")
}
