//! Show command - print one todo

use super::todo_line;
use crate::client::DetailMode;
use crate::config::Config;
use crate::error::TallyResult;
use crate::service::Backend;

/// Execute the show command
pub async fn execute(id: &str, config: &Config, backend: Backend) -> TallyResult<()> {
    let client = super::todo_client(config, backend);
    let todo = client.detail(id, DetailMode::FetchIfMissing).await?;
    println!("{}", todo_line(&todo));
    Ok(())
}
