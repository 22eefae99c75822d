use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "adscope-generate")]
#[command(about = "Generate the synthetic ad events table", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    adscope_bootstrap::run_generate(args.config.as_deref())
}
