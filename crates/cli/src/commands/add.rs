//! Add command handler.

use clap::Args;
use qabase_core::AppResult;
use qabase_knowledge::SyncOrchestrator;

/// Add a question/answer pair to a knowledge base
#[derive(Args, Debug)]
pub struct AddCommand {
    /// Question text
    #[arg(short, long)]
    pub question: String,

    /// Answer text
    #[arg(short, long)]
    pub answer: String,

    /// Knowledge base (index) name
    #[arg(short, long)]
    pub index: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AddCommand {
    pub async fn execute(&self, orchestrator: &SyncOrchestrator) -> AppResult<()> {
        tracing::info!("Executing add command for index '{}'", self.index);

        let result = orchestrator
            .add_qa(&self.question, &self.answer, &self.index)
            .await;

        super::report(result, self.json, |id| {
            format!("Added record {} to index '{}'", id, self.index)
        })
    }
}
