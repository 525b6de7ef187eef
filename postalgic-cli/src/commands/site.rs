//! `postalgic site list`

use anyhow::{Context, Result};
use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};

use postalgic_core::registry;

#[derive(Subcommand, Debug)]
pub enum SiteCommand {
    /// List registered sites and their targets.
    List,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "site")]
    site: String,
    #[tabled(rename = "output")]
    output: String,
    #[tabled(rename = "targets")]
    targets: String,
}

pub fn run(command: SiteCommand) -> Result<()> {
    match command {
        SiteCommand::List => list(),
    }
}

fn list() -> Result<()> {
    let sites = registry::list_sites().context("failed to load site registry")?;
    if sites.is_empty() {
        println!("No sites registered. Run 'postalgic init <site> <output-dir>'.");
        return Ok(());
    }

    let rows: Vec<SiteRow> = sites
        .into_iter()
        .map(|site| SiteRow {
            site: site.name.0,
            output: site.output_dir.display().to_string(),
            targets: if site.targets.is_empty() {
                "-".to_string()
            } else {
                site.targets
                    .iter()
                    .map(|t| format!("{} ({})", t.name, t.config.kind()))
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
