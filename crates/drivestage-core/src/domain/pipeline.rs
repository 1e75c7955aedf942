//! PipelineRun domain entity
//!
//! Tracks one file's progress through the staged folder pipeline. The run
//! is never persisted; it exists so callers and tests can assert exactly
//! where a file was left when a step fails.
//!
//! ## State Machine
//!
//! ```text
//!  ┌─────────┐  move   ┌───────────┐ process ┌───────────┐ deliver ┌──────────┐
//!  │ AtInput │ ──────► │ AtStaging │ ──────► │ Processed │ ──────► │ AtOutput │
//!  └─────────┘         └───────────┘         └───────────┘         └──────────┘
//!       │                    │                     │
//!       └────────────────────┴─────────────────────┴──► Failed(step)
//! ```
//!
//! `AtOutput` and `Failed` are terminal. Nothing is rolled back: after a
//! failure, [`PipelineRun::left_at`] reports the last stage the file
//! actually reached.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{FileId, RunId};

// ============================================================================
// PipelineStep
// ============================================================================

/// Individual step of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    /// Metadata fetch and input-folder check
    Validate,
    /// Move from input to staging
    MoveToStaging,
    /// Processing of the staged file
    Process,
    /// Content download (copy delivery)
    Download,
    /// New object creation in output (copy delivery)
    CreateOutput,
    /// Move from staging to output (move delivery)
    MoveToOutput,
}

impl PipelineStep {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Validate => "validate",
            PipelineStep::MoveToStaging => "move_to_staging",
            PipelineStep::Process => "process",
            PipelineStep::Download => "download",
            PipelineStep::CreateOutput => "create_output",
            PipelineStep::MoveToOutput => "move_to_output",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PipelineStage
// ============================================================================

/// Where a file is in the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    AtInput,
    AtStaging,
    Processed,
    AtOutput,
    Failed(PipelineStep),
}

impl PipelineStage {
    /// Returns true for `AtOutput` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::AtOutput | PipelineStage::Failed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineStage::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::AtInput => "at_input",
            PipelineStage::AtStaging => "at_staging",
            PipelineStage::Processed => "processed",
            PipelineStage::AtOutput => "at_output",
            PipelineStage::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Failed(step) => write!(f, "failed at {}", step),
            other => f.write_str(other.name()),
        }
    }
}

// ============================================================================
// PipelineRun
// ============================================================================

/// A recorded stage change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub stage: PipelineStage,
    pub at: DateTime<Utc>,
}

/// Progress of one file through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    run_id: RunId,
    file_id: FileId,
    stage: PipelineStage,
    history: Vec<StageTransition>,
    output_file_id: Option<FileId>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Starts a run for a file assumed to sit in the input folder
    pub fn start(file_id: FileId) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            file_id,
            stage: PipelineStage::AtInput,
            history: vec![StageTransition {
                stage: PipelineStage::AtInput,
                at: now,
            }],
            output_file_id: None,
            started_at: now,
            finished_at: None,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn history(&self) -> &[StageTransition] {
        &self.history
    }

    /// Identifier of the object in the output folder.
    ///
    /// Equals the original id for move delivery; a new id for copy delivery.
    pub fn output_file_id(&self) -> Option<&FileId> {
        self.output_file_id.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// The last non-failed stage reached.
    ///
    /// For a failed run this is where the file was stranded.
    pub fn left_at(&self) -> PipelineStage {
        self.history
            .iter()
            .rev()
            .map(|t| t.stage)
            .find(|s| !s.is_failed())
            .unwrap_or_default()
    }

    /// The failed step, if the run failed
    pub fn failed_step(&self) -> Option<PipelineStep> {
        match self.stage {
            PipelineStage::Failed(step) => Some(step),
            _ => None,
        }
    }

    /// Checks if the stage transition is valid
    pub fn can_transition_to(&self, target: &PipelineStage) -> bool {
        if self.stage.is_terminal() {
            return false;
        }

        match (&self.stage, target) {
            (_, PipelineStage::Failed(_)) => true,
            (PipelineStage::AtInput, PipelineStage::AtStaging) => true,
            (PipelineStage::AtStaging, PipelineStage::Processed) => true,
            (PipelineStage::Processed, PipelineStage::AtOutput) => true,
            _ => false,
        }
    }

    /// Attempts to transition to a new stage
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: PipelineStage) -> Result<(), DomainError> {
        if !self.can_transition_to(&target) {
            return Err(DomainError::InvalidState {
                from: self.stage.name().to_string(),
                to: target.name().to_string(),
            });
        }

        let now = Utc::now();
        self.stage = target;
        self.history.push(StageTransition { stage: target, at: now });
        if target.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    pub fn mark_staged(&mut self) -> Result<(), DomainError> {
        self.transition_to(PipelineStage::AtStaging)
    }

    pub fn mark_processed(&mut self) -> Result<(), DomainError> {
        self.transition_to(PipelineStage::Processed)
    }

    /// Completes the run, recording the id of the object now in output
    pub fn complete(&mut self, output_file_id: FileId) -> Result<(), DomainError> {
        self.transition_to(PipelineStage::AtOutput)?;
        self.output_file_id = Some(output_file_id);
        Ok(())
    }

    pub fn fail(&mut self, step: PipelineStep) -> Result<(), DomainError> {
        self.transition_to(PipelineStage::Failed(step))
    }
}
