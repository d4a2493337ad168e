use std::process::ExitCode;

fn main() -> ExitCode {
    accountpulse_cli::run()
}
