//! Delete command handler.

use clap::Args;
use qabase_core::AppResult;
use qabase_knowledge::SyncOrchestrator;

/// Delete a record and its index entry
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Record id
    pub id: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, orchestrator: &SyncOrchestrator) -> AppResult<()> {
        tracing::info!("Executing delete command for record {}", self.id);

        let result = orchestrator.delete_qa(self.id).await;

        super::report(result, self.json, |record| {
            format!(
                "Deleted record {} from index '{}'",
                record.id, record.index_name
            )
        })
    }
}
