//! vobgraph binary entry point.

use std::process::ExitCode;

use vobgraph::ui::output;

fn main() -> ExitCode {
    match vobgraph::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
