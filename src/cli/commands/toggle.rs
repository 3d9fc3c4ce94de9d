//! Toggle command - flip the done flag

use super::{todo_client, todo_line};
use crate::client::DetailMode;
use crate::config::Config;
use crate::error::TallyResult;
use crate::service::Backend;
use crate::todo::TodoPatch;
use crate::ui::{self, UiContext};

/// Execute the toggle command
pub async fn execute(id: &str, config: &Config, backend: Backend) -> TallyResult<()> {
    let client = todo_client(config, backend);

    let current = client.detail(id, DetailMode::FetchIfMissing).await?;
    let todo = client.update(id, TodoPatch::done(!current.is_done)).await?;

    ui::step_ok(&UiContext::detect(), &todo_line(&todo));
    Ok(())
}
