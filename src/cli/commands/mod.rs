//! CLI command implementations

pub mod add;
pub mod config;
pub mod counter;
pub mod edit;
pub mod list;
pub mod remove;
pub mod show;
pub mod status;
pub mod toggle;

pub use add::execute as add;
pub use config::execute as config;
pub use counter::execute as counter;
pub use edit::execute as edit;
pub use list::execute as list;
pub use remove::execute as remove;
pub use show::execute as show;
pub use status::execute as status;
pub use toggle::execute as toggle;

use crate::client::{QueryOptions, TodoClient};
use crate::config::Config;
use crate::service::{create_service, Backend};
use crate::todo::Todo;
use console::style;

/// Build a client with an empty cache for one command invocation
pub(crate) fn todo_client(config: &Config, backend: Backend) -> TodoClient {
    let service = create_service(config, backend);
    TodoClient::new(service, QueryOptions::from(&config.cache))
}

/// One-line rendering shared by list, show and the mutation commands
pub(crate) fn todo_line(todo: &Todo) -> String {
    let mark = if todo.is_done {
        style("[x]").green()
    } else {
        style("[ ]").dim()
    };
    format!("{} {} {}", mark, style(&todo.id).bold(), todo.content)
}
