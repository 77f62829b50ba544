use std::process::ExitCode;

fn main() -> ExitCode {
    parkbot_cli::run()
}
