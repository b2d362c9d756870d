mod pack;
mod serve;

pub use pack::Pack;
pub use serve::Serve;

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(about, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Pack(Pack),
    Serve(Serve),
}
