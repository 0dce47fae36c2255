use std::process::ExitCode;

fn main() -> ExitCode {
    celebra_cli::run()
}
