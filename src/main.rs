use std::process::ExitCode;

fn main() -> ExitCode {
    point2point_lib::run()
}
