use clap::Parser;
use color_eyre::Result;
use load_metrics::{
    init_errors,
    init_logging,
    run,
    Args,
    Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let args = Args::parse();
    init_logging(args.verbose)?;
    run(Config::new(args)?).await
}
