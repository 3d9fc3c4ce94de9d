//! Terminal output for the CLI
//!
//! Interactive terminals get `cliclack` log lines and spinners; pipes and
//! CI get plain `[OK]`-style lines so output stays greppable.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, remark, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
