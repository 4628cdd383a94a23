//! End-to-end pipeline: analysis, repair loop, output.

use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::analyst::{RequirementsAnalyst, UserRequest};
use crate::error::Result;
use crate::intent::StructuredIntent;
use crate::session::RepairLoop;

/// Outcome of one successful workflow run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub intent: StructuredIntent,
    pub model: String,
    pub saved_to: Option<PathBuf>,
}

/// Runs description → intent → validated model → file
pub struct Workflow {
    analyst: RequirementsAnalyst,
    repair_loop: RepairLoop,
    output_dir: PathBuf,
}

impl Workflow {
    pub fn new(analyst: RequirementsAnalyst, repair_loop: RepairLoop, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            analyst,
            repair_loop,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run the full pipeline, writing the model when `save` is set
    pub async fn run(&self, request: &UserRequest, save: bool) -> Result<WorkflowReport> {
        let intent = self.analyst.analyze(request).await?;
        let model = self.repair_loop.run(&intent).await?;

        let saved_to = if save { Some(self.save(&intent, &model).await?) } else { None };

        Ok(WorkflowReport {
            intent,
            model,
            saved_to,
        })
    }

    /// Extract intent and render it without validating
    pub async fn preview(&self, request: &UserRequest) -> Result<(StructuredIntent, String)> {
        let intent = self.analyst.analyze(request).await?;
        let rendered = intent.to_cto();
        Ok((intent, rendered))
    }

    /// Write `model` to `<output_dir>/<namespace_with_underscores>.cto`
    pub async fn save(&self, intent: &StructuredIntent, model: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(intent.file_name());
        tokio::fs::write(&path, model).await?;
        info!("Saved model to {}", path.display());
        Ok(path)
    }
}
