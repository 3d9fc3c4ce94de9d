//! Remove command - delete a todo

use super::todo_client;
use crate::config::Config;
use crate::error::TallyResult;
use crate::service::Backend;
use crate::ui::{self, UiContext};

/// Execute the remove command
pub async fn execute(id: &str, config: &Config, backend: Backend) -> TallyResult<()> {
    let client = todo_client(config, backend);
    let removed = client.delete(id).await?;

    ui::step_ok_detail(
        &UiContext::detect(),
        &format!("Removed todo {}", removed.id),
        &removed.content,
    );
    Ok(())
}
