//! Command handlers for the QA Base CLI.
//!
//! Each command maps onto one request-level operation of the knowledge base.

pub mod add;
pub mod delete;
pub mod indices;
pub mod query;
pub mod reindex;
pub mod update;

// Re-export command types for convenience
pub use add::AddCommand;
pub use delete::DeleteCommand;
pub use indices::IndicesCommand;
pub use query::QueryCommand;
pub use reindex::ReindexCommand;
pub use update::UpdateCommand;

use qabase_core::AppResult;
use qabase_knowledge::Outcome;
use serde::Serialize;

/// Print the result of an operation and pass its error on.
///
/// With `json`, the result is printed as an [`Outcome`] on success and on
/// failure; otherwise only the success message is printed.
pub(crate) fn report<T, F>(result: AppResult<T>, json: bool, describe: F) -> AppResult<()>
where
    T: Serialize + Clone,
    F: FnOnce(&T) -> String,
{
    if json {
        let message = result.as_ref().map(describe).unwrap_or_default();
        let outcome = Outcome::from_result(&result, message);
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Ok(data) = &result {
        println!("{}", describe(data));
    }

    result.map(|_| ())
}
