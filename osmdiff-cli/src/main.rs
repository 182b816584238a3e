//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::io;

use structured_logger::{Builder, json::new_writer};

#[expect(
    clippy::print_stderr,
    reason = "the binary reports fatal errors on stderr before exiting"
)]
fn main() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stderr()))
        .init();
    if let Err(err) = osmdiff_cli::run() {
        eprintln!("osmdiff: {err}");
        std::process::exit(1);
    }
}
