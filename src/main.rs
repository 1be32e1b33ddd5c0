use std::process::ExitCode;

use clap::Parser;

use gb7studio::cli::{self, CliArgs};
use gb7studio::logger;

fn main() -> ExitCode {
    logger::init();
    let args = CliArgs::parse();
    cli::run(args)
}
