//! Add command - create a todo

use super::{todo_client, todo_line};
use crate::config::Config;
use crate::error::{TallyError, TallyResult};
use crate::service::Backend;
use crate::ui::{self, UiContext};

/// Execute the add command
pub async fn execute(words: Vec<String>, config: &Config, backend: Backend) -> TallyResult<()> {
    let content = validate_content(&words)?;
    let client = todo_client(config, backend);

    let todo = client.create(&content).await?;
    ui::step_ok(&UiContext::detect(), &format!("Added {}", todo_line(&todo)));
    Ok(())
}

/// Join the words and reject text that is empty once trimmed
fn validate_content(words: &[String]) -> TallyResult<String> {
    let content = words.join(" ");
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(TallyError::Precondition(
            "Todo content must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
