//! Reindex command handler.
//!
//! Rebuilds every vector index from the backing store.

use clap::Args;
use qabase_core::AppResult;
use qabase_knowledge::SyncOrchestrator;

/// Rebuild all indices from the stored records
#[derive(Args, Debug)]
pub struct ReindexCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReindexCommand {
    pub async fn execute(&self, orchestrator: &SyncOrchestrator) -> AppResult<()> {
        tracing::info!("Executing reindex command");

        let result = orchestrator.reindex_all().await;

        super::report(result, self.json, |stats| {
            format!(
                "Reindexed {} indices ({} documents): {}",
                stats.indices.len(),
                stats.documents,
                stats.indices.join(", ")
            )
        })
    }
}
