//! Indices command handler.
//!
//! Lists the indices loaded at startup.

use clap::Args;
use qabase_core::AppResult;
use qabase_knowledge::SyncOrchestrator;

/// Show the loaded indices
#[derive(Args, Debug)]
pub struct IndicesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndicesCommand {
    pub async fn execute(&self, orchestrator: &SyncOrchestrator) -> AppResult<()> {
        tracing::info!("Executing indices command");

        let stats = orchestrator.registry().stats();

        super::report(Ok(stats), self.json, |stats| {
            if stats.is_empty() {
                return "No indices loaded".to_string();
            }

            stats
                .iter()
                .map(|s| {
                    format!(
                        "{}: {} documents (dimension {}){}",
                        s.name,
                        s.documents,
                        s.dimension,
                        if s.dirty { ", unsaved changes" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}
