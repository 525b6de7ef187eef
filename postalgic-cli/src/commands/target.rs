//! `postalgic target add <site> <name> <kind> ...` and `postalgic target remove <site> <name>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use postalgic_core::{
    registry, GitConfig, LocalArchiveConfig, ObjectStoreConfig, SftpConfig, SiteName, TargetConfig,
    TargetEntry, TargetName,
};
use postalgic_sync::hash_store;

/// Configure where a site is published.
#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Add a target, replacing any existing target with the same name.
    Add(AddArgs),

    /// Remove a target and its cached publish state.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Site to add the target to.
    pub site: String,

    /// Target name (e.g. "prod", "pages").
    pub name: String,

    #[command(subcommand)]
    pub kind: TargetKindArgs,
}

#[derive(Subcommand, Debug)]
pub enum TargetKindArgs {
    /// S3-compatible bucket, optionally behind a CloudFront distribution.
    S3 {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        region: String,
        /// CloudFront distribution to invalidate after each publish.
        #[arg(long)]
        distribution_id: Option<String>,
        /// Custom endpoint for S3-compatible providers.
        #[arg(long)]
        endpoint: Option<String>,
        /// Omit both keys to use the default AWS credential chain.
        #[arg(long, requires = "secret_access_key")]
        access_key_id: Option<String>,
        #[arg(long, requires = "access_key_id")]
        secret_access_key: Option<String>,
    },

    /// Git repository that serves the site (e.g. GitHub Pages).
    Git {
        #[arg(long = "repo")]
        repository_url: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        author_name: String,
        #[arg(long)]
        author_email: String,
    },

    /// SFTP server with a document root.
    Sftp {
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 22)]
        port: u16,
        #[arg(long = "user")]
        username: String,
        #[arg(long)]
        password: Option<String>,
        /// Private key file; tried before the password and the SSH agent.
        #[arg(long = "key")]
        private_key_path: Option<PathBuf>,
        #[arg(long = "passphrase", requires = "private_key_path")]
        private_key_passphrase: Option<String>,
        #[arg(long)]
        remote_path: String,
    },

    /// Zip bundle written locally for manual upload.
    Archive {
        #[arg(long = "output")]
        output_path: PathBuf,
    },
}

impl From<TargetKindArgs> for TargetConfig {
    fn from(args: TargetKindArgs) -> Self {
        match args {
            TargetKindArgs::S3 {
                bucket,
                region,
                distribution_id,
                endpoint,
                access_key_id,
                secret_access_key,
            } => TargetConfig::ObjectStore(ObjectStoreConfig {
                bucket,
                region,
                distribution_id,
                access_key_id,
                secret_access_key,
                endpoint,
            }),
            TargetKindArgs::Git {
                repository_url,
                branch,
                author_name,
                author_email,
            } => TargetConfig::Git(GitConfig {
                repository_url,
                branch,
                author_name,
                author_email,
            }),
            TargetKindArgs::Sftp {
                host,
                port,
                username,
                password,
                private_key_path,
                private_key_passphrase,
                remote_path,
            } => TargetConfig::Sftp(SftpConfig {
                host,
                port,
                username,
                password,
                private_key_path,
                private_key_passphrase,
                remote_path,
            }),
            TargetKindArgs::Archive { output_path } => {
                TargetConfig::LocalArchive(LocalArchiveConfig { output_path })
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub site: String,
    pub name: String,
}

pub fn run(cmd: TargetCommand) -> Result<()> {
    match cmd {
        TargetCommand::Add(args) => add(args),
        TargetCommand::Remove(args) => remove(args),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let site = SiteName::from(args.site);
    let mut config = TargetConfig::from(args.kind);
    if let TargetConfig::LocalArchive(archive) = &mut config {
        if archive.output_path.is_relative() {
            let cwd = std::env::current_dir().context("cannot resolve current directory")?;
            archive.output_path = cwd.join(&archive.output_path);
        }
    }
    let kind = config.kind();
    let entry = TargetEntry {
        name: TargetName::from(args.name),
        config,
    };
    let name = entry.name.clone();

    registry::add_target(&site, entry)
        .with_context(|| format!("failed to add target '{name}' to site '{site}'"))?;

    println!("✓ Added {kind} target '{name}' to site '{site}'");
    Ok(())
}

fn remove(args: RemoveArgs) -> Result<()> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    let site = SiteName::from(args.site);
    let name = TargetName::from(args.name);

    registry::remove_target_at(&home, &site, &name)
        .with_context(|| format!("failed to remove target '{name}' from site '{site}'"))?;
    hash_store::remove_at(&home, &site, &name)
        .with_context(|| format!("failed to clear publish state of '{name}'"))?;

    println!("✓ Removed target '{name}' from site '{site}'");
    Ok(())
}
