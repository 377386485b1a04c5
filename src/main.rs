//! Shork command line

use shork::{BuildError, ShorkCli};
use std::process;

fn main() {
    let mut cli = ShorkCli::new();

    match cli.run() {
        Ok(()) => {}
        Err(BuildError::Io(e)) => {
            eprintln!("IO Error: {}", e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Build failed: {}", e);
            process::exit(1);
        }
    }
}
