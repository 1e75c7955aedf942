//! Staged pipeline use case
//!
//! Drives one file from the input folder through staging to output:
//!
//! 1. Validate: the file's live parents must include the input folder
//! 2. Move to staging
//! 3. Process
//! 4. Deliver to output, by moving (default) or by download-and-create
//!
//! The first failing step aborts the run. Completed steps are not undone,
//! so the returned error reports where the file was left.

use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::OutputMode;
use crate::domain::{
    FileId, FileRecord, FolderId, PipelineRun, PipelineStage, PipelineStep, StageFolders,
};
use crate::ports::{IFileProcessor, IStorageProvider};

use super::move_file::MoveFileUseCase;

/// Errors raised by [`RunPipelineUseCase`]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file is not in the input folder; nothing was changed
    #[error("File {file_id} is not in the input folder {input}")]
    NotInInputFolder {
        file_id: FileId,
        input: FolderId,
        parents: Vec<FolderId>,
    },

    /// A step failed after validation
    #[error("Pipeline for {file_id} failed at {step} (file left {left_at}): {source:#}")]
    StepFailed {
        file_id: FileId,
        step: PipelineStep,
        left_at: PipelineStage,
        run: Box<PipelineRun>,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// Returns true for the non-retriable not-in-input rejection
    pub fn is_rejection(&self) -> bool {
        matches!(self, PipelineError::NotInInputFolder { .. })
    }

    /// The step that failed, if any
    pub fn step(&self) -> Option<PipelineStep> {
        match self {
            PipelineError::StepFailed { step, .. } => Some(*step),
            PipelineError::NotInInputFolder { .. } => None,
        }
    }

    /// Where the file was left
    pub fn left_at(&self) -> PipelineStage {
        match self {
            PipelineError::StepFailed { left_at, .. } => *left_at,
            PipelineError::NotInInputFolder { .. } => PipelineStage::AtInput,
        }
    }
}

/// Use case for running the staged pipeline on one file
pub struct RunPipelineUseCase {
    storage: Arc<dyn IStorageProvider + Send + Sync>,
    processor: Arc<dyn IFileProcessor + Send + Sync>,
    mover: MoveFileUseCase,
    folders: StageFolders,
    output_mode: OutputMode,
}

impl RunPipelineUseCase {
    /// Creates the use case
    ///
    /// # Arguments
    ///
    /// * `storage` - Remote storage holding the three folders
    /// * `processor` - Step run while the file sits in staging
    /// * `folders` - Input, staging and output folder ids
    /// * `output_mode` - Delivery strategy for the last step
    pub fn new(
        storage: Arc<dyn IStorageProvider + Send + Sync>,
        processor: Arc<dyn IFileProcessor + Send + Sync>,
        folders: StageFolders,
        output_mode: OutputMode,
    ) -> Self {
        for (a, b) in folders.overlapping_roles() {
            warn!(
                folder = %folders.folder(a),
                "The {a} and {b} roles share the same folder"
            );
        }
        Self {
            mover: MoveFileUseCase::new(storage.clone()),
            storage,
            processor,
            folders,
            output_mode,
        }
    }

    pub fn folders(&self) -> &StageFolders {
        &self.folders
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Runs the pipeline for `file_id`
    ///
    /// # Returns
    ///
    /// The completed run; its `output_file_id` is the original id after a
    /// move delivery and the new object's id after a copy delivery.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotInInputFolder`] when validation rejects the
    /// file, [`PipelineError::StepFailed`] for any later failure.
    pub async fn execute(&self, file_id: &FileId) -> Result<PipelineRun, PipelineError> {
        let mut run = PipelineRun::start(file_id.clone());
        info!(run_id = %run.run_id(), file_id = %file_id, "Pipeline started");

        // Step 1: validate location
        let record = match self.storage.get_file(file_id).await {
            Ok(record) => record,
            Err(e) => {
                return Err(self.abort(
                    run,
                    PipelineStep::Validate,
                    e.context("Failed to fetch file metadata"),
                ))
            }
        };

        if !record.is_in(&self.folders.input) {
            warn!(
                run_id = %run.run_id(),
                file_id = %file_id,
                parents = ?record.parents(),
                "File is not in the input folder; skipping"
            );
            return Err(PipelineError::NotInInputFolder {
                file_id: file_id.clone(),
                input: self.folders.input.clone(),
                parents: record.parents().to_vec(),
            });
        }

        // Step 2: input -> staging
        let staged = match self.mover.execute(file_id, &self.folders.staging).await {
            Ok(outcome) => outcome.into_record(),
            Err(e) => return Err(self.abort(run, PipelineStep::MoveToStaging, e.into())),
        };
        self.advance(&mut run, PipelineStage::AtStaging);

        // Step 3: process
        if let Err(e) = self.processor.process(&staged).await {
            return Err(self.abort(run, PipelineStep::Process, e));
        }
        self.advance(&mut run, PipelineStage::Processed);

        // Step 4: deliver
        let output_id = match self.output_mode {
            OutputMode::Move => {
                match self.mover.execute(file_id, &self.folders.output).await {
                    Ok(_) => file_id.clone(),
                    Err(e) => return Err(self.abort(run, PipelineStep::MoveToOutput, e.into())),
                }
            }
            OutputMode::Copy => match self.copy_to_output(&run, &staged).await {
                Ok(id) => id,
                Err((step, e)) => return Err(self.abort(run, step, e)),
            },
        };

        if let Err(e) = run.complete(output_id.clone()) {
            return Err(self.abort(run, PipelineStep::MoveToOutput, e.into()));
        }

        info!(
            run_id = %run.run_id(),
            file_id = %file_id,
            output_file_id = %output_id,
            mode = %self.output_mode,
            "Pipeline completed"
        );
        Ok(run)
    }

    /// Downloads the staged content and creates a copy in output.
    ///
    /// The original stays in staging.
    async fn copy_to_output(
        &self,
        run: &PipelineRun,
        staged: &FileRecord,
    ) -> Result<FileId, (PipelineStep, anyhow::Error)> {
        let data = self
            .storage
            .download_file(staged.id())
            .await
            .context("Failed to download staged file")
            .map_err(|e| (PipelineStep::Download, e))?;

        let created = self
            .storage
            .create_file(staged.name(), &self.folders.output, staged.mime_type(), &data)
            .await
            .context("Failed to create file in output folder")
            .map_err(|e| (PipelineStep::CreateOutput, e))?;

        info!(
            run_id = %run.run_id(),
            file_id = %staged.id(),
            output_file_id = %created.id(),
            bytes = data.len(),
            "Copied staged file to output"
        );
        Ok(created.id().clone())
    }

    fn advance(&self, run: &mut PipelineRun, stage: PipelineStage) {
        // Stages are only ever advanced in order here.
        if let Err(e) = run.transition_to(stage) {
            warn!(run_id = %run.run_id(), error = %e, "Unexpected stage transition");
        }
    }

    fn abort(&self, mut run: PipelineRun, step: PipelineStep, source: anyhow::Error) -> PipelineError {
        if let Err(e) = run.fail(step) {
            warn!(run_id = %run.run_id(), error = %e, "Could not record failure");
        }
        let left_at = run.left_at();
        error!(
            run_id = %run.run_id(),
            file_id = %run.file_id(),
            step = %step,
            left_at = %left_at,
            error = ?source,
            "Pipeline aborted"
        );
        PipelineError::StepFailed {
            file_id: run.file_id().clone(),
            step,
            left_at,
            run: Box::new(run),
            source,
        }
    }
}
