use clap::Parser;
use knn_ws::cli::SubCommandExtend;
use knn_ws::config::{Opts, SubCommand};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Load(config) => config.run(&opts).await,
        SubCommand::Clear(config) => config.run(&opts).await,
        SubCommand::Label(config) => config.run(&opts).await,
    }
}
