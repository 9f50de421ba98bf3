//! Jazel - incremental build-and-test engine for Java projects
//!
//! Runs one of:
//! 1. `build`: compile changed sources and their dependents
//! 2. `test`: build, then run stale test classes with cached results
//! 3. `clean`: remove the output directory

use clap::Parser;
use jazel::{Cli, Commands, commands, logging};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }

    if !matches!(cli.command, Commands::Clean) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║                 JAZEL BUILD & TEST                     ║");
        println!("║        Incremental javac with cached test runs         ║");
        println!("╚════════════════════════════════════════════════════════╝\n");
    }

    let code = match commands::execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
