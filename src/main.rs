use clap::Parser;
use snaptrack::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();
    run(Cli::parse())
}
