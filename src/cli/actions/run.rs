use crate::cli::actions::{init, license, server, Action};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::Init(args) => init::execute(&args),
        Action::License => {
            license::execute();
            Ok(())
        }
    }
}
