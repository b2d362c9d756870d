mod commands;
mod server;

use clap::Parser;
use colored::{ColoredString, Colorize};
use commands::{Args, Commands};
use log::{error, Level, LevelFilter, Metadata, Record};

/// Console logger: info lines print bare (packager progress, request log),
/// other levels carry a colored label, and debug filtering adds the target
/// module for box-level traces.
struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if log::max_level() >= LevelFilter::Debug {
            println!(
                "{} {} {}",
                label(record.level()),
                record.target().dimmed(),
                record.args()
            );
        } else if record.level() == Level::Info {
            println!("{}", record.args());
        } else {
            println!("{} {}", label(record.level()), record.args());
        }
    }

    fn flush(&self) {}
}

fn label(level: Level) -> ColoredString {
    match level {
        Level::Debug => "[DEBUG]".bold().blue(),
        Level::Error => "[ERROR]".bold().red(),
        Level::Info => "[INFO]".bold().green(),
        Level::Trace => "[TRACE]".bold().purple(),
        Level::Warn => "[WARN]".bold().yellow(),
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Pack(args) => args.execute()?,
        Commands::Serve(args) => args.execute().await?,
    }

    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    log::set_logger(&Logger)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .expect("Failed to initialize logger.");

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
