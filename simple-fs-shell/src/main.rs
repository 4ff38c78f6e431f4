//! Interactive shell over the simulated filesystem. Opens (or formats) the
//! disk image named on the command line and hands control to the REPL.

mod sched;
mod shell;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;
use simple_fs::SimFileSystem;

use crate::shell::Shell;

#[derive(Parser)]
#[command(version, about = "Interactive shell over a simulated filesystem", long_about = None)]
struct Cli {
    /// Disk image path; a missing image is created and formatted
    #[arg(short, long, default_value = "disk.img")]
    disk: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let fs = match SimFileSystem::new(&cli.disk) {
        Ok(fs) => fs,
        Err(e) => {
            error!("cannot open disk image {}: {e}", cli.disk.display());
            eprintln!("cannot open disk image {}: {e}", cli.disk.display());
            return ExitCode::FAILURE;
        }
    };

    match Shell::new(fs).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shell terminated: {e}");
            ExitCode::FAILURE
        }
    }
}
