//! `postalgic init <site> <output-dir>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use postalgic_core::{registry, SiteName};

/// Register a site in the Postalgic registry.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Site name (e.g. "blog"). Creates ~/.postalgic/sites/<site>.yaml
    pub site: String,

    /// Directory the site generator writes into.
    pub output_dir: PathBuf,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let output_dir = self
            .output_dir
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.output_dir.display()))?;

        let site = registry::init_site(SiteName::from(self.site.clone()), output_dir.clone())
            .with_context(|| {
                format!(
                    "failed to register '{}' for '{}'",
                    self.site,
                    output_dir.display()
                )
            })?;

        println!(
            "✓ Registered site '{}' publishing from {}",
            site.name,
            site.output_dir.display()
        );
        println!("  Saved to: ~/.postalgic/sites/{}.yaml", site.name);
        if site.targets.is_empty() {
            println!("  Next: postalgic target add {} <name> s3|git|sftp|archive", site.name);
        }
        Ok(())
    }
}
