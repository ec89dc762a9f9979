#![warn(clippy::all, clippy::pedantic)]

mod dump;
mod info;

use std::process::ExitCode;

use dump::{dump, Dump};
use info::{info, Info};

use pico_core::host::{PrintLevel, StdFileLoader};

use clap::Parser;

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    /// Print every diagnostic, not only warnings and errors
    #[clap(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// List the supported model formats
    Formats,
    Info(Info),
    Dump(Dump),
}

fn formats() {
    for module in pico_core::modules() {
        let info = module.info();
        println!(
            "{:<4} {:<30} .{}",
            info.id,
            info.display_name,
            info.extensions.join(", .")
        );
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    pico_core::set_file_loader(StdFileLoader);
    pico_core::set_print_level(if opts.verbose {
        PrintLevel::Verbose
    } else {
        PrintLevel::Warning
    });
    pico_core::set_print_sink(|level: PrintLevel, message: &str| {
        eprintln!("{}: {}", level, message);
    });

    let result = match opts.subcommand {
        SubCommand::Formats => {
            formats();
            Ok(())
        }
        SubCommand::Info(opts) => info(&opts),
        SubCommand::Dump(opts) => dump(&opts),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // the print sink already reported the error
        Err(_) => ExitCode::FAILURE,
    }
}
