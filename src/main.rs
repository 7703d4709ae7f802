use std::process::ExitCode;

use usr_merge::errors::UsrMergeError;
use usr_merge::output as out;

mod app;

fn main() -> ExitCode {
    let args = usr_merge::cli::parse();
    match app::run(args) {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<UsrMergeError>() {
                Some(known) => out::print_error(&format!("{known} [code {}]", known.code())),
                None => out::print_error(&format!("{e:#}")),
            }
            ExitCode::from(app::EXIT_SETUP_FAILURE)
        }
    }
}
