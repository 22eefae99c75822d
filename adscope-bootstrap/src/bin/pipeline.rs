use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "adscope-pipeline")]
#[command(
    about = "Score campaign days, decompose daily revenue and write evaluation metrics",
    long_about = None
)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    adscope_bootstrap::run_pipeline(args.config.as_deref())
}
