//! Stub worker launched by the end-to-end tests.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use drover_e2e::stub::{self, StubArgs};

fn main() -> ExitCode {
    let args = StubArgs::parse();
    match stub::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(io::stderr(), "drover-stub-worker: {error}");
            ExitCode::FAILURE
        }
    }
}
