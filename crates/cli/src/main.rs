use std::process::ExitCode;

fn main() -> ExitCode {
    homecord_cli::run()
}
