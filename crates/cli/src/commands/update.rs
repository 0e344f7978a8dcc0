//! Update command handler.

use clap::Args;
use qabase_core::AppResult;
use qabase_knowledge::SyncOrchestrator;

/// Change the question and/or answer of a record
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Record id
    pub id: i64,

    /// New question text (keeps the current one when omitted)
    #[arg(short, long)]
    pub question: Option<String>,

    /// New answer text (keeps the current one when omitted)
    #[arg(short, long)]
    pub answer: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl UpdateCommand {
    pub async fn execute(&self, orchestrator: &SyncOrchestrator) -> AppResult<()> {
        tracing::info!("Executing update command for record {}", self.id);

        let result = orchestrator
            .update_qa(self.id, self.question.as_deref(), self.answer.as_deref())
            .await;

        super::report(result, self.json, |record| {
            format!("Updated record {} in index '{}'", record.id, record.index_name)
        })
    }
}
