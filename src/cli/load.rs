use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::cli::SubCommandExtend;
use crate::codec::FeatureData;
use crate::config::{Opts, RepositoryOptions};
use crate::error::ErrorKind;
use crate::mnist::{self, LabeledFeature};
use crate::repository::FeatureRepository;

#[derive(Parser, Debug, Clone)]
pub struct LoadCommand {
    #[command(flatten)]
    pub repo: RepositoryOptions,
    /// MNIST 训练集所在目录
    pub path: PathBuf,
}

impl SubCommandExtend for LoadCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let data = mnist::load_dir(&self.path)?;
        let repo = self.repo.builder(&opts.data_dir).open().await?;
        let pb = ProgressBar::new(data.len() as u64).with_style(pb_style());
        let count = load_corpus(&repo, data, &pb).await?;
        pb.finish_with_message("训练集导入完成");
        info!("共导入 {} 个训练样本", count);
        repo.close().await;
        Ok(())
    }
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap()
        .progress_chars("#>-")
}

/// 清空仓库并逐条写入训练集
pub async fn load_corpus(
    repo: &FeatureRepository,
    data: Vec<LabeledFeature>,
    pb: &ProgressBar,
) -> crate::Result<usize> {
    match repo.clear().await {
        Ok(_) => {}
        // 空数据库，没有需要清理的数据
        Err(e) if e.kind == ErrorKind::InvalidCollection => {}
        Err(e) => return Err(e),
    }

    let count = data.len();
    for item in data {
        repo.add(FeatureData::Raw(item.features), Some(item.label)).await?;
        pb.inc(1);
    }
    Ok(count)
}
