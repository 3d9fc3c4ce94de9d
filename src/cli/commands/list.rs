//! List command - show every todo

use super::todo_client;
use crate::cli::args::{ListArgs, OutputFormat};
use crate::client::DetailMode;
use crate::config::Config;
use crate::error::TallyResult;
use crate::service::Backend;
use crate::todo::Todo;
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;

/// Execute the list command
///
/// Runs the list query once and then reads each record back from the
/// cache, so the backend sees a single request.
pub async fn execute(args: ListArgs, config: &Config, backend: Backend) -> TallyResult<()> {
    let ctx = UiContext::detect();
    let client = todo_client(config, backend);

    let mut spinner = TaskSpinner::new(&ctx);
    if matches!(args.format, OutputFormat::Table) {
        spinner.start("Fetching todos...");
    }
    let result = client.list().await;
    spinner.clear();
    let ids = result?;

    let mut todos = Vec::with_capacity(ids.len());
    for id in &ids {
        todos.push(client.detail(id, DetailMode::CacheOnly).await?);
    }

    if todos.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(&ctx, "No todos yet"),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&ctx, &todos),
        OutputFormat::Json => print_json(&todos)?,
        OutputFormat::Plain => print_plain(&todos),
    }

    Ok(())
}

fn print_table(ctx: &UiContext, todos: &[Todo]) {
    ui::intro(ctx, "Todos");

    let width = todos.iter().map(|t| t.id.len()).max().unwrap_or(2).max(2);
    println!(
        "{:<6} {:<width$} {}",
        style("DONE").bold(),
        style("ID").bold(),
        style("CONTENT").bold(),
    );
    println!("{}", "-".repeat(width + 30));

    for todo in todos {
        let done = if todo.is_done {
            style("yes").green()
        } else {
            style("no").dim()
        };
        println!("{:<6} {:<width$} {}", done, todo.id, todo.content);
    }

    let open = todos.iter().filter(|t| !t.is_done).count();
    println!();
    println!("{} todo(s), {} open", todos.len(), open);
}

fn print_json(todos: &[Todo]) -> TallyResult<()> {
    let json = serde_json::to_string_pretty(todos)?;
    println!("{}", json);
    Ok(())
}

fn print_plain(todos: &[Todo]) {
    for todo in todos {
        let mark = if todo.is_done { "x" } else { " " };
        println!("{}\t[{}]\t{}", todo.id, mark, todo.content);
    }
}
