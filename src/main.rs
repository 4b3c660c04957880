use std::process::ExitCode;

fn main() -> ExitCode {
    match kenjo_autofill::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            kenjo_autofill::cli::report_error(err.as_ref());
            ExitCode::FAILURE
        }
    }
}
