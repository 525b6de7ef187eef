//! [`GitBackend`] that shells out to the `git` executable.

use std::path::Path;
use std::process::Output;

use postalgic_core::GitConfig;
use tokio::process::Command;

use super::GitBackend;
use crate::error::{Operation, PublishError};

#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCli {
    async fn run(&self, workdir: &Path, args: &[&str]) -> std::io::Result<Output> {
        tracing::debug!(?args, "git");
        Command::new(&self.program)
            .args(args)
            .current_dir(workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
    }

    /// Run and require a zero exit status; the error carries stderr.
    async fn checked(&self, workdir: &Path, args: &[&str]) -> Result<String, String> {
        let output = self
            .run(workdir, args)
            .await
            .map_err(|e| format!("cannot run {}: {e}", self.program))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(format!(
                "git {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

impl GitCli {
    /// Point HEAD at an unborn `branch` with an empty index and worktree,
    /// dropping any local commit left by an earlier unpushed run.
    async fn reset_to_empty(&self, workdir: &Path, branch: &str) -> Result<(), String> {
        let head = format!("refs/heads/{branch}");
        self.checked(workdir, &["symbolic-ref", "HEAD", &head]).await?;
        let existing = self
            .run(workdir, &["rev-parse", "--verify", "--quiet", &head])
            .await
            .map_err(|e| format!("cannot run {}: {e}", self.program))?;
        if existing.status.success() {
            self.checked(workdir, &["update-ref", "-d", &head]).await?;
        }
        self.checked(workdir, &["read-tree", "--empty"]).await?;
        self.checked(workdir, &["clean", "--quiet", "-fdx"]).await?;
        Ok(())
    }
}

impl GitBackend for GitCli {
    async fn checkout(&mut self, workdir: &Path, config: &GitConfig) -> Result<(), PublishError> {
        let connection = |message: String| PublishError::Connection {
            target: config.repository_url.clone(),
            message,
        };

        if workdir.join(".git").is_dir() {
            self.checked(workdir, &["remote", "set-url", "origin", &config.repository_url])
                .await
                .map_err(connection)?;
        } else {
            self.checked(workdir, &["init", "--quiet"]).await.map_err(connection)?;
            self.checked(workdir, &["remote", "add", "origin", &config.repository_url])
                .await
                .map_err(connection)?;
        }

        let heads = self
            .checked(workdir, &["ls-remote", "--heads", "origin", &config.branch])
            .await
            .map_err(connection)?;

        if heads.trim().is_empty() {
            tracing::info!(branch = %config.branch, "remote branch missing, starting orphan branch");
            return self.reset_to_empty(workdir, &config.branch).await.map_err(connection);
        }

        self.checked(workdir, &["fetch", "--quiet", "--depth", "1", "origin", &config.branch])
            .await
            .map_err(connection)?;
        self.checked(workdir, &["checkout", "--quiet", "-B", &config.branch, "FETCH_HEAD"])
            .await
            .map_err(connection)?;
        self.checked(workdir, &["reset", "--quiet", "--hard", "FETCH_HEAD"])
            .await
            .map_err(connection)?;
        self.checked(workdir, &["clean", "--quiet", "-fdx"])
            .await
            .map_err(connection)?;
        Ok(())
    }

    async fn commit_all(
        &mut self,
        workdir: &Path,
        config: &GitConfig,
        message: &str,
    ) -> Result<bool, PublishError> {
        let commit_err =
            |m: String| PublishError::transfer(Operation::Commit, workdir.display().to_string(), m);

        self.checked(workdir, &["add", "--all"]).await.map_err(commit_err)?;
        let status = self
            .checked(workdir, &["status", "--porcelain"])
            .await
            .map_err(commit_err)?;
        if status.trim().is_empty() {
            return Ok(false);
        }

        let name = format!("user.name={}", config.author_name);
        let email = format!("user.email={}", config.author_email);
        self.checked(
            workdir,
            &["-c", &name, "-c", &email, "commit", "--quiet", "-m", message],
        )
        .await
        .map_err(commit_err)?;
        Ok(true)
    }

    async fn push(&mut self, workdir: &Path, config: &GitConfig) -> Result<(), PublishError> {
        let refspec = format!("HEAD:refs/heads/{}", config.branch);
        self.checked(workdir, &["push", "--quiet", "origin", &refspec])
            .await
            .map_err(|m| PublishError::transfer(Operation::Push, &config.repository_url, m))?;
        Ok(())
    }
}
