mod args;
mod repl;
mod usage;

pub use args::{CliArgs, Command};
pub use repl::{EXIT_WORDS, LineAction, classify_line, run_repl};
pub use usage::usage_report;
