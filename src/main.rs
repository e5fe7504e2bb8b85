#![allow(clippy::too_many_arguments)]

mod cli;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    strata::logger::init();
    let args = cli::CliArgs::parse();
    cli::run(args)
}
