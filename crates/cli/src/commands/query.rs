//! Query command handler.
//!
//! Ranks the stored questions of one knowledge base against a query.

use clap::Args;
use qabase_core::AppResult;
use qabase_knowledge::SyncOrchestrator;

/// Query a knowledge base
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Knowledge base (index) name
    pub index: String,

    /// Query text
    pub text: String,

    /// Number of results (default: index.topK from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, orchestrator: &SyncOrchestrator) -> AppResult<()> {
        tracing::info!("Executing query command for index '{}'", self.index);

        let result = orchestrator
            .query(&self.text, &self.index, self.top_k)
            .await;

        super::report(result, self.json, |hits| {
            if hits.is_empty() {
                return format!("No matches in index '{}'", self.index);
            }

            hits.iter()
                .enumerate()
                .map(|(i, hit)| {
                    format!(
                        "{}. [{:.3}] {}\n   {}",
                        i + 1,
                        hit.score,
                        hit.question,
                        hit.answer
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}
