//! Local zip bundle for manual upload.
//!
//! There is no remote state to diff against, so every publish writes the
//! complete site plus the control file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use postalgic_core::{FileManifest, RemoteHashRecord, CONTROL_FILE_PATH};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{io_err, Operation, PublishError, PublishFailure};
use crate::phase::PublishPhase;
use crate::progress::{ProgressReporter, StepCounter};
use crate::publisher::{site_path, Capabilities, Publisher, TransferPlan};
use crate::result::PublishResult;

pub struct ArchivePublisher {
    output_path: PathBuf,
}

impl ArchivePublisher {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write_bundle(
        &self,
        staging: &Path,
        plan: &TransferPlan<'_>,
        steps: &mut StepCounter<'_>,
        result: &mut PublishResult,
    ) -> Result<(), PublishError> {
        let file = File::create(staging).map_err(|e| io_err(staging, e))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let zip_err = |name: &str, e: zip::result::ZipError| {
            PublishError::transfer(Operation::Archive, name, e)
        };

        for key in plan.manifest.paths() {
            let source = site_path(plan.site_dir, key);
            let contents = std::fs::read(&source).map_err(|e| io_err(&source, e))?;
            zip.start_file(key, options).map_err(|e| zip_err(key, e))?;
            zip.write_all(&contents)
                .map_err(|e| PublishError::transfer(Operation::Archive, key, e))?;
            result.uploaded += 1;
            steps.advance(&format!("added {key}"));
        }

        if let Some(record) = plan.record {
            let bytes = record.to_json_bytes()?;
            zip.start_file(CONTROL_FILE_PATH, options)
                .map_err(|e| zip_err(CONTROL_FILE_PATH, e))?;
            zip.write_all(&bytes)
                .map_err(|e| PublishError::transfer(Operation::Archive, CONTROL_FILE_PATH, e))?;
            steps.advance("added control file");
        }

        zip.finish()
            .map_err(|e| zip_err(&self.output_path.display().to_string(), e))?;
        Ok(())
    }
}

impl Publisher for ArchivePublisher {
    fn describe(&self) -> String {
        self.output_path.display().to_string()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            remote_hashes: false,
            remote_listing: false,
            transactional: true,
        }
    }

    async fn connect(&mut self) -> Result<(), PublishError> {
        match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e)),
            _ => Ok(()),
        }
    }

    async fn fetch_remote_hashes(&mut self) -> Result<Option<RemoteHashRecord>, PublishError> {
        Ok(None)
    }

    async fn list_remote(&mut self) -> Result<FileManifest, PublishError> {
        Ok(FileManifest::new())
    }

    async fn apply(
        &mut self,
        plan: TransferPlan<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishResult, PublishFailure> {
        let mut steps = StepCounter::new(
            progress,
            plan.manifest.len() + usize::from(plan.record.is_some()),
        );
        let mut result = PublishResult {
            total: plan.manifest.len(),
            changed: true,
            ..PublishResult::default()
        };

        let staging = self.staging_path();
        if let Err(error) = self.write_bundle(&staging, &plan, &mut steps, &mut result) {
            let _ = std::fs::remove_file(&staging);
            let remaining = plan.manifest.len() - result.uploaded;
            return Err(PublishFailure::new(
                PublishPhase::Transferring,
                result,
                remaining,
                error,
            ));
        }
        if let Err(e) = std::fs::rename(&staging, &self.output_path) {
            let error = io_err(&self.output_path, e);
            return Err(PublishFailure::new(PublishPhase::Finalizing, result, 0, error));
        }

        tracing::info!(path = %self.output_path.display(), files = result.uploaded, "archive written");
        result.artifact = Some(self.output_path.clone());
        Ok(result)
    }
}
