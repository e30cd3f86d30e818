use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, RepositoryOptions};

#[derive(Parser, Debug, Clone)]
pub struct ClearCommand {
    #[command(flatten)]
    pub repo: RepositoryOptions,
}

impl SubCommandExtend for ClearCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let repo = self.repo.builder(&opts.data_dir).wal(false).open().await?;
        info!("清理数据中……");
        let message = repo.clear().await;
        repo.close().await;
        println!("{}", message?);
        Ok(())
    }
}
