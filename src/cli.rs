use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tap-dynamics")]
#[command(about = "Extract Microsoft Dynamics 365 entities as a stream of JSON messages")]
pub struct Cli {
    /// Config file with credentials, organization URI and the entity to extract
    #[arg(short, long)]
    pub config: PathBuf,

    /// State file from a previous run
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Catalog with stream and column selection
    #[arg(long, alias = "properties")]
    pub catalog: Option<PathBuf>,

    /// Print the discovered catalog and exit
    #[arg(short, long)]
    pub discover: bool,
}
