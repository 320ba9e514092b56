//! Vista CLI entry point.

use vista_lib::cli::{self, Cli};
use vista_lib::core::Result;

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli)
}
