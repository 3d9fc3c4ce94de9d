//! Edit command - partial update of a todo

use super::{todo_client, todo_line};
use crate::cli::args::EditArgs;
use crate::config::Config;
use crate::error::{TallyError, TallyResult};
use crate::service::Backend;
use crate::todo::TodoPatch;
use crate::ui::{self, UiContext};

/// Execute the edit command
pub async fn execute(args: EditArgs, config: &Config, backend: Backend) -> TallyResult<()> {
    let patch = build_patch(&args)?;
    let client = todo_client(config, backend);

    let todo = client.update(&args.id, patch).await?;
    ui::step_ok(&UiContext::detect(), &format!("Updated {}", todo_line(&todo)));
    Ok(())
}

fn build_patch(args: &EditArgs) -> TallyResult<TodoPatch> {
    let content = match args.content.as_deref().map(str::trim) {
        Some("") => {
            return Err(TallyError::Precondition(
                "Todo content must not be empty".to_string(),
            ))
        }
        other => other.map(str::to_string),
    };

    let patch = TodoPatch {
        content,
        is_done: args.done,
    };
    if patch.is_empty() {
        return Err(TallyError::Precondition(
            "Nothing to change. Pass --content and/or --done".to_string(),
        ));
    }
    Ok(patch)
}
